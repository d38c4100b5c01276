use tracing::debug;

use crate::selection::{CoinEvaluator, CoinSelector, GreedySelector};

/// Depth-first search for a changeless input set.
///
/// Looks for a subset whose effective value lands in
/// `[target, target + cost_of_change]`, preferring the least excess. Gives up
/// after `max_tries` steps and falls back to [`GreedySelector`].
#[derive(Debug, Clone, Copy)]
pub struct BranchAndBoundSelector {
    max_tries: u32,
    cost_of_change: u64,
}

impl BranchAndBoundSelector {
    #[must_use]
    pub const fn new(max_tries: u32, cost_of_change: u64) -> Self {
        Self {
            max_tries,
            cost_of_change,
        }
    }

    /// Returns indices into `values`, which must be positive and sorted
    /// descending.
    fn search(&self, values: &[i128], target: i128) -> Option<Vec<usize>> {
        let upper = target + i128::from(self.cost_of_change);
        let mut available: i128 = values.iter().sum();
        if available < target {
            return None;
        }

        let mut path: Vec<bool> = Vec::with_capacity(values.len());
        let mut current: i128 = 0;
        let mut best: Option<(i128, Vec<bool>)> = None;

        for _ in 0..self.max_tries {
            let mut backtrack = false;
            if current + available < target || current > upper {
                backtrack = true;
            } else if current >= target {
                let excess = current - target;
                if best.as_ref().is_none_or(|(best_excess, _)| excess < *best_excess) {
                    best = Some((excess, path.clone()));
                    if excess == 0 {
                        break;
                    }
                }
                backtrack = true;
            }

            if backtrack {
                // Unwind omitted inputs, then flip the last included one.
                while path.last() == Some(&false) {
                    path.pop();
                    available += values[path.len()];
                }
                let Some(last) = path.last_mut() else {
                    break;
                };
                *last = false;
                current -= values[path.len() - 1];
            } else {
                let next = path.len();
                available -= values[next];
                current += values[next];
                path.push(true);
            }
        }

        best.map(|(_, path)| {
            path.iter()
                .enumerate()
                .filter_map(|(index, included)| included.then_some(index))
                .collect()
        })
    }
}

impl<T: Clone> CoinSelector<T> for BranchAndBoundSelector {
    fn select_inputs(
        &self,
        evaluator: &dyn CoinEvaluator<T>,
        inputs: &[T],
        target: u64,
    ) -> Option<Vec<T>> {
        if target == 0 {
            return Some(Vec::new());
        }

        let mut candidates: Vec<(&T, i128)> = inputs
            .iter()
            .map(|input| (input, i128::from(evaluator.effective_value(input))))
            .filter(|(_, effective)| *effective > 0)
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| evaluator.compare(a.0, b.0)));

        let values: Vec<i128> = candidates.iter().map(|(_, effective)| *effective).collect();
        if let Some(indices) = self.search(&values, i128::from(target)) {
            let mut selected: Vec<&T> = indices.into_iter().map(|i| candidates[i].0).collect();
            selected.sort_by(|a, b| evaluator.compare(a, b));
            return Some(selected.into_iter().cloned().collect());
        }

        debug!("No changeless selection found for target {target}, falling back to greedy");
        GreedySelector.select_inputs(evaluator, inputs, target)
    }
}
