use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use types::{account::AccountId, deposit::Deposit};

use crate::selection::CoinEvaluator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionOrder {
    #[default]
    LargestFirst,
    SmallestFirst,
    /// Stable pseudo-random order keyed by `seed`, so spending patterns do
    /// not reveal deposit sizes.
    Shuffled { seed: u64 },
}

/// Values deposits from one account's point of view.
///
/// The face value of a deposit is the account's share of it; spending it
/// costs `input_cost` sats, which is zero for internal transfers.
#[derive(Debug, Clone)]
pub struct DepositEvaluator {
    account: AccountId,
    input_cost: u64,
    order: SelectionOrder,
}

impl DepositEvaluator {
    #[must_use]
    pub const fn new(account: AccountId, input_cost: u64, order: SelectionOrder) -> Self {
        Self {
            account,
            input_cost,
            order,
        }
    }

    #[must_use]
    pub const fn for_transfer(account: AccountId, order: SelectionOrder) -> Self {
        Self::new(account, 0, order)
    }

    fn shuffle_key(seed: u64, deposit: &Deposit) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(seed.to_le_bytes());
        hasher.update(deposit.id.as_str().as_bytes());
        hasher.finalize().into()
    }
}

impl CoinEvaluator<Deposit> for DepositEvaluator {
    fn value(&self, input: &Deposit) -> u64 {
        input.share_of(&self.account)
    }

    fn effective_value(&self, input: &Deposit) -> i64 {
        let value = i64::try_from(self.value(input)).unwrap_or(i64::MAX);
        let cost = i64::try_from(self.input_cost).unwrap_or(i64::MAX);
        value.saturating_sub(cost)
    }

    fn compare(&self, a: &Deposit, b: &Deposit) -> Ordering {
        let primary = match self.order {
            SelectionOrder::LargestFirst => self.value(b).cmp(&self.value(a)),
            SelectionOrder::SmallestFirst => self.value(a).cmp(&self.value(b)),
            SelectionOrder::Shuffled { seed } => {
                Self::shuffle_key(seed, a).cmp(&Self::shuffle_key(seed, b))
            }
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}
