use bincode::{Decode, Encode};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{account::AccountId, deposit::DepositId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum WithdrawStatus {
    #[display("PENDING")]
    Pending,
    #[display("COMPLETED")]
    Completed,
}

/// An account's in-flight intent to withdraw funds to an external address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct WithdrawRequest {
    pub id: String,
    pub account_id: AccountId,
    pub destination_address: String,
    pub withdraw_amount: u64,
    pub fee_amount: u64,
    pub created_at: u64,
    pub txid: Option<String>,
    /// Set while the spending transaction is being broadcast. Such a request
    /// keeps its reservation and is never expired.
    pub broadcasting: bool,
    /// Deposits backing the request; spent in full on completion.
    pub reserved_inputs: Vec<DepositId>,
    /// Sum of the account's shares across `reserved_inputs` at creation.
    pub reserved_amount: u64,
    pub version: u64,
}

impl WithdrawRequest {
    #[must_use]
    pub const fn total_cost(&self) -> u64 {
        self.withdraw_amount + self.fee_amount
    }

    #[must_use]
    pub const fn status(&self) -> WithdrawStatus {
        if self.txid.is_some() {
            WithdrawStatus::Completed
        } else {
            WithdrawStatus::Pending
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.txid.is_none()
    }

    /// Pending, not being broadcast and strictly older than `ttl_secs` at
    /// `now`.
    #[must_use]
    pub const fn is_expired(&self, now: u64, ttl_secs: u64) -> bool {
        self.is_pending() && !self.broadcasting && now.saturating_sub(self.created_at) > ttl_secs
    }
}

/// What `request_withdrawal` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawQuote {
    pub request_id: String,
    #[serde(with = "crate::amount::serde_str")]
    pub withdraw_amount: u64,
    #[serde(with = "crate::amount::serde_str")]
    pub fee_amount: u64,
    #[serde(with = "crate::amount::serde_str")]
    pub total_cost: u64,
}
