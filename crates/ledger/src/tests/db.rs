use assert_matches::assert_matches;
use bitcoin::{OutPoint, Txid, hashes::Hash};
use tempfile::TempDir;
use types::{
    account::{Account, AccountId},
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    withdraw::WithdrawRequest,
};

use crate::db::{ChangeSet, Db, rocksdb::RocksDb};
use crate::unit_of_work::UnitOfWork;

fn create_test_db() -> (RocksDb, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().to_str().unwrap();
    let db = RocksDb::new(db_path).unwrap();
    (db, temp_dir)
}

fn deposit_id(tag: u8) -> DepositId {
    DepositId::from(OutPoint::new(Txid::from_byte_array([tag; 32]), 0))
}

fn request(id: &str, txid: Option<&str>) -> WithdrawRequest {
    WithdrawRequest {
        id: id.to_string(),
        account_id: AccountId::from("alice"),
        destination_address: "bcrt1qdest".to_string(),
        withdraw_amount: 1_000,
        fee_amount: 100,
        created_at: 42,
        txid: txid.map(str::to_string),
        broadcasting: false,
        reserved_inputs: vec![deposit_id(1)],
        reserved_amount: 1_100,
        version: 0,
    }
}

#[test]
fn test_rocksdb_new() {
    let (db, _temp_dir) = create_test_db();
    assert!(db.db.live_files().is_ok());
    assert!(db.get_all_accounts().unwrap().is_empty());
}

#[test]
fn test_commit_creates_and_bumps_versions() {
    let (db, _temp_dir) = create_test_db();

    db.commit(ChangeSet {
        accounts: vec![Account::new(AccountId::from("alice"))],
        ..ChangeSet::default()
    })
    .unwrap();

    let stored = db.get_account(&AccountId::from("alice")).unwrap().unwrap();
    assert_eq!(stored.version, 1);

    let mut updated = stored.clone();
    updated.deposit_addresses.push("bcrt1qaddr".to_string());
    db.commit(ChangeSet {
        accounts: vec![updated],
        ..ChangeSet::default()
    })
    .unwrap();

    let stored = db.get_account(&AccountId::from("alice")).unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.deposit_addresses, vec!["bcrt1qaddr".to_string()]);
}

#[test]
fn test_stale_write_conflicts_and_writes_nothing() {
    let (db, _temp_dir) = create_test_db();
    db.commit(ChangeSet {
        accounts: vec![Account::new(AccountId::from("alice"))],
        ..ChangeSet::default()
    })
    .unwrap();
    let stale = db.get_account(&AccountId::from("alice")).unwrap().unwrap();

    db.commit(ChangeSet {
        accounts: vec![stale.clone()],
        ..ChangeSet::default()
    })
    .unwrap();

    // Same read version again, alongside a brand new deposit.
    let result = db.commit(ChangeSet {
        accounts: vec![stale],
        deposits: vec![Deposit::new(deposit_id(1), 500, true, None)],
        ..ChangeSet::default()
    });
    assert_matches!(result, Err(LedgerError::Conflict));
    assert!(db.get_deposit(&deposit_id(1)).unwrap().is_none());
}

#[test]
fn test_double_create_conflicts() {
    let (db, _temp_dir) = create_test_db();
    let create = || ChangeSet {
        accounts: vec![Account::new(AccountId::from("bob"))],
        ..ChangeSet::default()
    };

    db.commit(create()).unwrap();
    assert_matches!(db.commit(create()), Err(LedgerError::Conflict));
}

#[test]
fn test_remove_deposit_checks_version() {
    let (db, _temp_dir) = create_test_db();
    db.commit(ChangeSet {
        deposits: vec![Deposit::new(deposit_id(3), 700, false, None)],
        ..ChangeSet::default()
    })
    .unwrap();

    assert_matches!(
        db.commit(ChangeSet {
            removed_deposits: vec![(deposit_id(3), 5)],
            ..ChangeSet::default()
        }),
        Err(LedgerError::Conflict)
    );

    db.commit(ChangeSet {
        removed_deposits: vec![(deposit_id(3), 1)],
        ..ChangeSet::default()
    })
    .unwrap();
    assert!(db.get_deposit(&deposit_id(3)).unwrap().is_none());
}

#[test]
fn test_withdraw_request_txid_index() {
    let (db, _temp_dir) = create_test_db();
    let txid = "aa".repeat(32);

    db.commit(ChangeSet {
        withdraw_requests: vec![request("req-1", None), request("req-2", Some(&txid))],
        ..ChangeSet::default()
    })
    .unwrap();

    let found = db.get_withdraw_request_by_txid(&txid).unwrap().unwrap();
    assert_eq!(found.id, "req-2");
    assert!(db.get_withdraw_request_by_txid("missing").unwrap().is_none());

    assert_eq!(db.get_all_withdraw_requests().unwrap().len(), 2);

    db.commit(ChangeSet {
        removed_withdraw_requests: vec![("req-2".to_string(), found.version)],
        ..ChangeSet::default()
    })
    .unwrap();
    assert!(db.get_withdraw_request_by_txid(&txid).unwrap().is_none());
    assert_eq!(db.get_all_withdraw_requests().unwrap().len(), 1);
}

#[test]
fn test_index_shaped_ids_are_ordinary_rows() {
    let (db, _temp_dir) = create_test_db();
    let txid = "bb".repeat(32);

    db.commit(ChangeSet {
        accounts: vec![Account::new(AccountId::from("txid:foo"))],
        withdraw_requests: vec![request(&format!("txid:{txid}"), Some(&txid))],
        ..ChangeSet::default()
    })
    .unwrap();

    let accounts = db.get_all_accounts().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, AccountId::from("txid:foo"));

    let requests = db.get_all_withdraw_requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(db.get_withdraw_request(&format!("txid:{txid}")).unwrap().is_some());
    assert!(db.get_withdraw_request(&txid).unwrap().is_none());
}

#[test]
fn test_spent_outputs_are_remembered() {
    let (db, _temp_dir) = create_test_db();
    let txid = "cc".repeat(32);
    assert!(db.get_spending_txid(&deposit_id(5)).unwrap().is_none());

    db.commit(ChangeSet {
        spent_outputs: vec![(deposit_id(5), txid.clone())],
        ..ChangeSet::default()
    })
    .unwrap();

    assert_eq!(db.get_spending_txid(&deposit_id(5)).unwrap(), Some(txid));
    assert!(db.get_spending_txid(&deposit_id(6)).unwrap().is_none());
    assert!(db.get_all_deposits().unwrap().is_empty());
}

#[test]
fn test_dropped_unit_of_work_writes_nothing() {
    let (db, _temp_dir) = create_test_db();
    {
        let mut uow = UnitOfWork::new(&db);
        uow.find_or_create_account(&AccountId::from("carol"))
            .unwrap();
    }
    assert!(db.get_account(&AccountId::from("carol")).unwrap().is_none());
}

#[test]
fn test_persist_batch_tracks_membership() {
    let (db, _temp_dir) = create_test_db();
    let alice = AccountId::from("alice");
    let bob = AccountId::from("bob");

    let mut uow = UnitOfWork::new(&db);
    let mut deposit = Deposit::new(deposit_id(9), 1_000, true, None);
    deposit.set_share(&alice, 600).unwrap();
    deposit.set_share(&bob, 400).unwrap();
    let accounts = vec![
        uow.find_or_create_account(&alice).unwrap(),
        uow.find_or_create_account(&bob).unwrap(),
    ];
    uow.persist_batch(vec![deposit.clone()], accounts);
    uow.commit().unwrap();

    let mut uow = UnitOfWork::new(&db);
    let bob_account = uow.account(&bob).unwrap().unwrap();
    assert!(bob_account.holds(&deposit_id(9)));
    assert_eq!(uow.calculate_balance(&bob_account, false).unwrap(), 400);

    let mut deposit = uow.deposit(&deposit_id(9)).unwrap().unwrap();
    deposit.set_share(&bob, 0).unwrap();
    deposit.set_share(&alice, 1_000).unwrap();
    let alice_account = uow.account(&alice).unwrap().unwrap();
    uow.persist_batch(vec![deposit], vec![alice_account, bob_account]);
    uow.commit().unwrap();

    let bob_account = db.get_account(&bob).unwrap().unwrap();
    assert!(!bob_account.holds(&deposit_id(9)));
    assert_eq!(
        db.get_deposit(&deposit_id(9)).unwrap().unwrap().share_of(&alice),
        1_000
    );
}

#[test]
fn test_unit_of_work_reads_its_own_writes() {
    let (db, _temp_dir) = create_test_db();
    let mut uow = UnitOfWork::new(&db);

    uow.put_deposit(Deposit::new(deposit_id(4), 10, true, None));
    assert!(uow.deposit(&deposit_id(4)).unwrap().is_some());

    uow.remove_deposit(&deposit_id(4)).unwrap();
    assert!(uow.deposit(&deposit_id(4)).unwrap().is_none());

    let (changes, events) = uow.into_change_set();
    assert!(changes.is_empty());
    assert!(events.is_empty());
}
