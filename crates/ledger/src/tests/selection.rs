use std::cmp::Ordering;

use bitcoin::{OutPoint, Txid, hashes::Hash};
use types::{
    account::AccountId,
    deposit::{Deposit, DepositId},
};

use crate::selection::{
    BranchAndBoundSelector, CoinEvaluator, CoinSelector, DepositEvaluator, GreedySelector,
    InternalTransferPreselector, SelectionOrder, SelectionStrategy,
};

/// Plain integers valued at face value minus a flat cost, largest first.
struct FlatCost(i64);

impl CoinEvaluator<u64> for FlatCost {
    fn value(&self, input: &u64) -> u64 {
        *input
    }

    fn effective_value(&self, input: &u64) -> i64 {
        i64::try_from(*input).unwrap() - self.0
    }

    fn compare(&self, a: &u64, b: &u64) -> Ordering {
        b.cmp(a)
    }
}

fn greedy(cost: i64, inputs: &[u64], target: u64) -> Option<Vec<u64>> {
    let evaluator: &dyn CoinEvaluator<u64> = &FlatCost(cost);
    CoinSelector::<u64>::select_inputs(&GreedySelector, evaluator, inputs, target)
}

fn branch_and_bound(
    cost_of_change: u64,
    inputs: &[u64],
    target: u64,
) -> Option<Vec<u64>> {
    let evaluator: &dyn CoinEvaluator<u64> = &FlatCost(0);
    let selector = BranchAndBoundSelector::new(10_000, cost_of_change);
    CoinSelector::<u64>::select_inputs(&selector, evaluator, inputs, target)
}

fn owned_by(owner: &AccountId, tag: u8, share: u64) -> Deposit {
    let id = DepositId::from(OutPoint::new(Txid::from_byte_array([tag; 32]), 0));
    let mut deposit = Deposit::new(id, share, true, None);
    deposit.set_share(owner, share).unwrap();
    deposit
}

#[test]
fn test_greedy_takes_largest_first() {
    assert_eq!(greedy(0, &[5, 40, 10, 30], 60), Some(vec![40, 30]));
}

#[test]
fn test_greedy_skips_uneconomic_inputs() {
    assert_eq!(greedy(10, &[8, 50, 10], 35), Some(vec![50]));

    // 8 and 10 are worth nothing once the input cost is paid.
    assert!(greedy(10, &[8, 50, 10], 41).is_none());
}

#[test]
fn test_selectors_report_shortfall() {
    assert!(greedy(0, &[1, 2, 3], 7).is_none());
    assert!(branch_and_bound(0, &[1, 2, 3], 7).is_none());
    assert_eq!(greedy(0, &[1, 2, 3], 0), Some(vec![]));
}

#[test]
fn test_branch_and_bound_finds_changeless_set() {
    // Greedy would take 40 + 30 and overshoot; 40 + 10 + 5 is exact.
    assert_eq!(
        branch_and_bound(0, &[5, 40, 10, 30], 55),
        Some(vec![40, 10, 5])
    );
    // An overshoot within the change budget still counts as changeless.
    assert_eq!(branch_and_bound(20, &[5, 40, 10, 30], 60), Some(vec![40, 30]));
}

#[test]
fn test_branch_and_bound_falls_back_to_greedy() {
    assert_eq!(branch_and_bound(0, &[40, 30], 50), Some(vec![40, 30]));
}

#[test]
fn test_selection_leaves_inputs_untouched() {
    let inputs = vec![3, 9, 4];
    let before = inputs.clone();
    let _ = greedy(0, &inputs, 10);
    let _ = branch_and_bound(5, &inputs, 10);
    assert_eq!(inputs, before);
}

#[test]
fn test_deposit_evaluator_is_account_relative() {
    let alice = AccountId::from("alice");
    let bob = AccountId::from("bob");
    let mut deposit = owned_by(&alice, 1, 1_000);
    deposit.set_share(&alice, 700).unwrap();
    deposit.set_share(&bob, 300).unwrap();

    let evaluator = DepositEvaluator::new(alice, 68, SelectionOrder::LargestFirst);
    assert_eq!(evaluator.value(&deposit), 700);
    assert_eq!(evaluator.effective_value(&deposit), 632);

    let small = owned_by(&bob, 2, 50);
    let evaluator = DepositEvaluator::new(bob, 68, SelectionOrder::LargestFirst);
    assert_eq!(evaluator.effective_value(&small), -18);
}

#[test]
fn test_deposit_orderings_are_deterministic() {
    let alice = AccountId::from("alice");
    let deposits: Vec<Deposit> = (1..=6)
        .map(|tag| owned_by(&alice, tag, u64::from(tag) * 100))
        .collect();

    let sorted = |order: SelectionOrder| {
        let evaluator = DepositEvaluator::for_transfer(alice.clone(), order);
        let mut sorted = deposits.clone();
        sorted.sort_by(|a, b| evaluator.compare(a, b));
        sorted.iter().map(|d| d.total_value).collect::<Vec<_>>()
    };

    assert_eq!(sorted(SelectionOrder::LargestFirst), vec![600, 500, 400, 300, 200, 100]);
    assert_eq!(sorted(SelectionOrder::SmallestFirst), vec![100, 200, 300, 400, 500, 600]);

    let shuffled = sorted(SelectionOrder::Shuffled { seed: 7 });
    assert_eq!(shuffled, sorted(SelectionOrder::Shuffled { seed: 7 }));
    let mut values = shuffled.clone();
    values.sort_unstable();
    assert_eq!(values, vec![100, 200, 300, 400, 500, 600]);
}

#[test]
fn test_preselector_prefers_shared_deposits() {
    let alice = AccountId::from("alice");
    let shared = owned_by(&alice, 1, 10);
    let big = owned_by(&alice, 2, 500);
    let evaluator = DepositEvaluator::for_transfer(alice, SelectionOrder::LargestFirst);
    let primary = GreedySelector;

    let preselector =
        InternalTransferPreselector::new(&primary, |deposit: &Deposit| deposit.id == shared.id);
    let selected = preselector
        .select_inputs(&evaluator, &[big.clone(), shared.clone()], 10)
        .unwrap();
    assert_eq!(selected, vec![shared.clone()]);

    // The shortfall comes from the primary selector.
    let selected = preselector
        .select_inputs(&evaluator, &[big.clone(), shared.clone()], 60)
        .unwrap();
    assert_eq!(selected, vec![shared.clone(), big.clone()]);

    assert!(
        preselector
            .select_inputs(&evaluator, &[big, shared.clone()], 511)
            .is_none()
    );
}

#[test]
fn test_strategy_builds_selector() {
    let selector = SelectionStrategy::Greedy.selector::<u64>();
    assert_eq!(
        selector.select_inputs(&FlatCost(0), &[1, 2], 2),
        Some(vec![2])
    );
    let selector = SelectionStrategy::default().selector::<u64>();
    assert_eq!(
        selector.select_inputs(&FlatCost(0), &[1, 2], 3),
        Some(vec![2, 1])
    );
}
