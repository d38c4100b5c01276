use bincode::{Decode, Encode};
use types::{
    account::{Account, AccountId},
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    withdraw::WithdrawRequest,
};

pub mod rocksdb;

pub const ACCOUNTS_CF: &str = "accounts";
pub const DEPOSITS_CF: &str = "deposits";
pub const WITHDRAW_REQUESTS_CF: &str = "withdraw_requests";
/// Withdrawal txid to request id.
pub const WITHDRAW_TXIDS_CF: &str = "withdraw_txids";
/// Deposit id to the txid of the withdrawal that spent it.
pub const SPENT_OUTPUTS_CF: &str = "spent_outputs";

/// A versioned row. Version 0 means the row has never been stored.
pub trait Row: Clone + Encode + Decode<()> {
    const TABLE: &'static str;

    fn key(&self) -> String;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Row for Account {
    const TABLE: &'static str = ACCOUNTS_CF;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Row for Deposit {
    const TABLE: &'static str = DEPOSITS_CF;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Row for WithdrawRequest {
    const TABLE: &'static str = WITHDRAW_REQUESTS_CF;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Everything one unit of work wants to write.
///
/// Rows carry the version they were read at; removals carry it alongside the
/// key. Spent outputs are append-only and carry no version. A commit applies
/// all of it or none of it.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub accounts: Vec<Account>,
    pub deposits: Vec<Deposit>,
    pub withdraw_requests: Vec<WithdrawRequest>,
    pub removed_deposits: Vec<(DepositId, u64)>,
    pub removed_withdraw_requests: Vec<(String, u64)>,
    pub spent_outputs: Vec<(DepositId, String)>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.deposits.is_empty()
            && self.withdraw_requests.is_empty()
            && self.removed_deposits.is_empty()
            && self.removed_withdraw_requests.is_empty()
            && self.spent_outputs.is_empty()
    }
}

pub trait Db: Send + Sync {
    fn get_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError>;
    fn get_deposit(&self, id: &DepositId) -> Result<Option<Deposit>, LedgerError>;
    fn get_withdraw_request(&self, id: &str) -> Result<Option<WithdrawRequest>, LedgerError>;
    fn get_withdraw_request_by_txid(
        &self,
        txid: &str,
    ) -> Result<Option<WithdrawRequest>, LedgerError>;
    /// The txid of the withdrawal that spent `id`, if one did.
    fn get_spending_txid(&self, id: &DepositId) -> Result<Option<String>, LedgerError>;
    fn get_all_accounts(&self) -> Result<Vec<Account>, LedgerError>;
    fn get_all_deposits(&self) -> Result<Vec<Deposit>, LedgerError>;
    fn get_all_withdraw_requests(&self) -> Result<Vec<WithdrawRequest>, LedgerError>;

    /// Applies `changes` atomically, failing with `LedgerError::Conflict` if
    /// any touched row no longer has the version it was read at.
    fn commit(&self, changes: ChangeSet) -> Result<(), LedgerError>;
}
