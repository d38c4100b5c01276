use std::{cmp::Ordering, sync::Arc};

use serde::{Deserialize, Serialize};

pub mod branch_and_bound;
pub mod evaluator;
pub mod greedy;
pub mod preselector;

pub use branch_and_bound::BranchAndBoundSelector;
pub use evaluator::{DepositEvaluator, SelectionOrder};
pub use greedy::GreedySelector;
pub use preselector::InternalTransferPreselector;

/// How a selector values and orders candidate inputs.
pub trait CoinEvaluator<T>: Send + Sync {
    /// Face value of the input.
    fn value(&self, input: &T) -> u64;

    /// Face value minus the marginal cost of spending the input. May be
    /// negative for inputs that cost more to spend than they are worth.
    fn effective_value(&self, input: &T) -> i64;

    /// Deterministic total order used by order-sensitive strategies.
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Picks a subset of `inputs` whose effective values reach `target`.
///
/// Implementations are pure: they never mutate their inputs and may be called
/// speculatively. `None` means the full set cannot reach the target.
pub trait CoinSelector<T: Clone>: Send + Sync {
    fn select_inputs(
        &self,
        evaluator: &dyn CoinEvaluator<T>,
        inputs: &[T],
        target: u64,
    ) -> Option<Vec<T>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionStrategy {
    Greedy,
    BranchAndBound { max_tries: u32, cost_of_change: u64 },
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self::BranchAndBound {
            max_tries: 100_000,
            cost_of_change: 1_000,
        }
    }
}

impl SelectionStrategy {
    #[must_use]
    pub fn selector<T: Clone + 'static>(self) -> Arc<dyn CoinSelector<T>> {
        match self {
            Self::Greedy => Arc::new(GreedySelector),
            Self::BranchAndBound {
                max_tries,
                cost_of_change,
            } => Arc::new(BranchAndBoundSelector::new(max_tries, cost_of_change)),
        }
    }
}

/// Orders `inputs` by the evaluator's ordering without cloning them.
pub(crate) fn ordered<'a, T>(evaluator: &dyn CoinEvaluator<T>, inputs: &'a [T]) -> Vec<&'a T> {
    let mut ordered: Vec<&T> = inputs.iter().collect();
    ordered.sort_by(|a, b| evaluator.compare(a, b));
    ordered
}
