use std::{collections::BTreeMap, str::FromStr};

use bincode::{Decode, Encode};
use bitcoin::OutPoint;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{account::AccountId, errors::LedgerError};

/// Locator of the on-chain output backing a deposit, `"<txid>:<vout>"`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
    Encode,
    Decode,
)]
#[serde(transparent)]
pub struct DepositId(String);

impl DepositId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn outpoint(&self) -> Result<OutPoint, LedgerError> {
        OutPoint::from_str(&self.0)
            .map_err(|e| LedgerError::InvariantViolation(format!("bad deposit id {}: {e}", self.0)))
    }
}

impl From<OutPoint> for DepositId {
    fn from(outpoint: OutPoint) -> Self {
        Self(outpoint.to_string())
    }
}

impl FromStr for DepositId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let outpoint = OutPoint::from_str(s)
            .map_err(|e| LedgerError::Encoding(format!("bad outpoint '{s}': {e}")))?;
        Ok(Self::from(outpoint))
    }
}

/// One wallet output and how its value is split between accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Deposit {
    pub id: DepositId,
    pub total_value: u64,
    pub confirmed: bool,
    pub address: Option<String>,
    shares: BTreeMap<AccountId, u64>,
    pub version: u64,
}

impl Deposit {
    #[must_use]
    pub const fn new(
        id: DepositId,
        total_value: u64,
        confirmed: bool,
        address: Option<String>,
    ) -> Self {
        Self {
            id,
            total_value,
            confirmed,
            address,
            shares: BTreeMap::new(),
            version: 0,
        }
    }

    #[must_use]
    pub fn share_of(&self, account: &AccountId) -> u64 {
        self.shares.get(account).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn attributed(&self) -> u64 {
        self.shares.values().sum()
    }

    /// Value not claimed by any account (change or fee headroom).
    #[must_use]
    pub fn unattributed(&self) -> u64 {
        self.total_value.saturating_sub(self.attributed())
    }

    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, u64)> {
        self.shares.iter().map(|(account, share)| (account, *share))
    }

    /// Sets `account`'s share to `amount`. Zero removes the entry.
    ///
    /// Fails without mutating when the share sum would exceed `total_value`.
    pub fn set_share(&mut self, account: &AccountId, amount: u64) -> Result<(), LedgerError> {
        let others = self.attributed() - self.share_of(account);
        let new_sum = others.checked_add(amount).ok_or_else(|| {
            LedgerError::InvariantViolation(format!("share sum overflow on deposit {}", self.id))
        })?;

        if new_sum > self.total_value {
            return Err(LedgerError::InvariantViolation(format!(
                "shares of deposit {} would total {new_sum} > {}",
                self.id, self.total_value
            )));
        }

        if amount == 0 {
            self.shares.remove(account);
        } else {
            self.shares.insert(account.clone(), amount);
        }
        Ok(())
    }
}
