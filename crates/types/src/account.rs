use std::collections::BTreeSet;

use bincode::{Decode, Encode};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::deposit::DepositId;

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    From,
    Serialize,
    Deserialize,
    Encode,
    Decode,
)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Account {
    pub id: AccountId,
    /// Deposits this account currently holds a nonzero share of.
    pub deposits: BTreeSet<DepositId>,
    pub deposit_addresses: Vec<String>,
    pub pending_withdrawal: Option<String>,
    pub version: u64,
}

impl Account {
    #[must_use]
    pub const fn new(id: AccountId) -> Self {
        Self {
            id,
            deposits: BTreeSet::new(),
            deposit_addresses: Vec::new(),
            pending_withdrawal: None,
            version: 0,
        }
    }

    #[must_use]
    pub fn holds(&self, deposit: &DepositId) -> bool {
        self.deposits.contains(deposit)
    }
}
