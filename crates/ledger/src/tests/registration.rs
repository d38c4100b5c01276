use types::{deposit::DepositId, events::LedgerEvent};

use crate::tests::{account, test_ledger};

#[tokio::test]
async fn test_assign_deposit_address_creates_account() {
    let env = test_ledger();
    let first = env.ledger.assign_deposit_address(&account("alice")).await.unwrap();
    let second = env.ledger.assign_deposit_address(&account("alice")).await.unwrap();
    assert_ne!(first, second);

    let alice = env.ledger.account(&account("alice")).unwrap().unwrap();
    assert_eq!(alice.deposit_addresses, vec![first, second]);
    assert!(alice.deposits.is_empty());
}

#[tokio::test]
async fn test_deposit_is_credited_once_confirmed() {
    let env = test_ledger();
    let alice = account("alice");
    let address = env.ledger.assign_deposit_address(&alice).await.unwrap();
    let outpoint = env.oracle.fund_address(&address, 25_000, 0).unwrap();

    assert_eq!(env.ledger.register_deposits(&alice).await.unwrap(), 0);
    assert_eq!(env.ledger.balance(&alice, true).unwrap(), 25_000);
    assert_eq!(env.ledger.balance(&alice, false).unwrap(), 0);

    let mut events = env.ledger.subscribe();
    env.oracle.set_confirmations(outpoint, 1).unwrap();
    assert_eq!(env.ledger.register_deposits(&alice).await.unwrap(), 25_000);
    assert_eq!(env.balance("alice"), 25_000);
    assert_eq!(
        events.try_recv().unwrap(),
        LedgerEvent::DepositConfirmed {
            account_id: alice.clone(),
            amount: 25_000
        }
    );

    // Registering again credits nothing new.
    assert_eq!(env.ledger.register_deposits(&alice).await.unwrap(), 0);
    assert!(events.try_recv().is_err());

    let deposit = env.deposit(&DepositId::from(outpoint)).unwrap();
    assert!(deposit.confirmed);
    assert_eq!(deposit.address.as_deref(), Some(address.as_str()));
    assert_eq!(env.ledger.audit().unwrap().confirmed_value, 25_000);
}

#[tokio::test]
async fn test_vanished_unconfirmed_deposit_is_dropped() {
    let env = test_ledger();
    let alice = account("alice");
    let address = env.ledger.assign_deposit_address(&alice).await.unwrap();
    let outpoint = env.oracle.fund_address(&address, 9_000, 0).unwrap();
    env.ledger.register_deposits(&alice).await.unwrap();
    assert_eq!(env.ledger.balance(&alice, true).unwrap(), 9_000);

    env.oracle.drop_unspent(outpoint).unwrap();
    env.ledger.register_deposits(&alice).await.unwrap();

    assert!(env.deposit(&DepositId::from(outpoint)).is_none());
    assert!(env.ledger.account(&alice).unwrap().unwrap().deposits.is_empty());
    assert_eq!(env.ledger.balance(&alice, true).unwrap(), 0);
}

#[tokio::test]
async fn test_register_without_addresses_is_a_no_op() {
    let env = test_ledger();
    assert_eq!(env.ledger.register_deposits(&account("ghost")).await.unwrap(), 0);
    assert!(env.ledger.account(&account("ghost")).unwrap().is_none());
}

#[tokio::test]
async fn test_register_all_deposits() {
    let env = test_ledger();
    for (name, value) in [("alice", 1_000), ("bob", 2_000)] {
        let address = env.ledger.assign_deposit_address(&account(name)).await.unwrap();
        env.oracle.fund_address(&address, value, 3).unwrap();
    }

    assert_eq!(env.ledger.register_all_deposits().await.unwrap(), 3_000);
    assert_eq!(env.balance("alice"), 1_000);
    assert_eq!(env.balance("bob"), 2_000);

    let totals = env.ledger.audit().unwrap();
    assert_eq!(totals.total_value, 3_000);
    assert_eq!(totals.unattributed, 0);
}
