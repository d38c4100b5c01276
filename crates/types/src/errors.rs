use std::error::Error;

use derive_more::Display;

/// Every failure the ledger core reports to its callers.
///
/// The first block mirrors the user-facing taxonomy; the second block covers
/// collaborator failures (wallet, storage) which always abort the enclosing
/// unit of work without touching ledger state.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[display("Insufficient funds")]
    InsufficientFunds,

    #[display("Batch changes do not sum to zero")]
    UnaccountedFunds,

    #[display("Not enough withdrawable funds")]
    NotEnoughWithdrawableFunds,

    #[display("Selected inputs cannot cover the withdrawal fee")]
    CannotAffordFees,

    #[display("A pending withdraw request already exists for this account")]
    WithdrawRequestAlreadyExists,

    #[display("Withdraw request not found")]
    WithdrawRequestNotFound,

    #[display("Withdrawal is already being broadcast")]
    WithdrawalInFlight,

    #[display("Invalid destination address")]
    InvalidAddress,

    #[display("Fee estimation failed: {_0}")]
    FeeEstimationFailed(String),

    #[display("Ledger invariant violated: {_0}")]
    InvariantViolation(String),

    #[display("Invalid amount: {_0}")]
    InvalidAmount(String),

    #[display("Wallet error: {_0}")]
    Wallet(String),

    #[display("Storage error: {_0}")]
    Storage(String),

    #[display("Encoding error: {_0}")]
    Encoding(String),

    #[display("Concurrent modification detected")]
    Conflict,
}

impl LedgerError {
    /// Conflicts are the only errors a unit of work may be retried on.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(e: bincode::error::EncodeError) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(e: bincode::error::DecodeError) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl Error for LedgerError {}
