use crate::selection::{CoinEvaluator, CoinSelector, ordered};

/// Walks inputs in evaluator order until the target is covered.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySelector;

impl<T: Clone> CoinSelector<T> for GreedySelector {
    fn select_inputs(
        &self,
        evaluator: &dyn CoinEvaluator<T>,
        inputs: &[T],
        target: u64,
    ) -> Option<Vec<T>> {
        let target = i128::from(target);
        let mut selected = Vec::new();
        let mut total: i128 = 0;

        for input in ordered(evaluator, inputs) {
            if total >= target {
                break;
            }
            let effective = evaluator.effective_value(input);
            if effective <= 0 {
                continue;
            }
            total += i128::from(effective);
            selected.push(input.clone());
        }

        (total >= target).then_some(selected)
    }
}
