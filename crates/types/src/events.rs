use serde::{Deserialize, Serialize};

use crate::account::AccountId;

/// Notifications published after a unit of work has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    DepositConfirmed {
        account_id: AccountId,
        #[serde(with = "crate::amount::serde_str")]
        amount: u64,
    },
    WithdrawRequestExpired {
        account_id: AccountId,
    },
    WithdrawalCompleted {
        account_id: AccountId,
        txid: String,
    },
}

impl LedgerEvent {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DepositConfirmed { .. } => "deposit_confirmed",
            Self::WithdrawRequestExpired { .. } => "withdraw_request_expired",
            Self::WithdrawalCompleted { .. } => "withdrawal_completed",
        }
    }

    #[must_use]
    pub const fn account_id(&self) -> &AccountId {
        match self {
            Self::DepositConfirmed { account_id, .. }
            | Self::WithdrawRequestExpired { account_id }
            | Self::WithdrawalCompleted { account_id, .. } => account_id,
        }
    }
}
