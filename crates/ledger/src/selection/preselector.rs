use crate::selection::{CoinEvaluator, CoinSelector, ordered};

/// Moves value through inputs the receiver already co-owns before asking the
/// primary selector for anything else.
///
/// Reassigning a share within a deposit both parties already hold creates no
/// new holder, so those inputs are consumed first, in evaluator order and by
/// face value. Whatever is still owed comes from `primary` over the remaining
/// inputs; if that fails the whole selection fails.
pub struct InternalTransferPreselector<'a, T> {
    primary: &'a dyn CoinSelector<T>,
    is_shared: Box<dyn Fn(&T) -> bool + Send + Sync + 'a>,
}

impl<'a, T: Clone> InternalTransferPreselector<'a, T> {
    pub fn new(
        primary: &'a dyn CoinSelector<T>,
        is_shared: impl Fn(&T) -> bool + Send + Sync + 'a,
    ) -> Self {
        Self {
            primary,
            is_shared: Box::new(is_shared),
        }
    }
}

impl<T: Clone> CoinSelector<T> for InternalTransferPreselector<'_, T> {
    fn select_inputs(
        &self,
        evaluator: &dyn CoinEvaluator<T>,
        inputs: &[T],
        target: u64,
    ) -> Option<Vec<T>> {
        let (shared, rest): (Vec<&T>, Vec<&T>) = ordered(evaluator, inputs)
            .into_iter()
            .partition(|input| (self.is_shared)(input));

        let mut selected = Vec::new();
        let mut covered: u64 = 0;
        for input in shared {
            if covered >= target {
                break;
            }
            let value = evaluator.value(input);
            if value == 0 {
                continue;
            }
            covered = covered.saturating_add(value);
            selected.push(input.clone());
        }

        if covered >= target {
            return Some(selected);
        }

        let rest: Vec<T> = rest.into_iter().cloned().collect();
        let remainder = self
            .primary
            .select_inputs(evaluator, &rest, target - covered)?;
        selected.extend(remainder);
        Some(selected)
    }
}
