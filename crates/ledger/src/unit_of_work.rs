use std::collections::BTreeMap;

use types::{
    account::{Account, AccountId},
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    events::LedgerEvent,
    withdraw::WithdrawRequest,
};

use crate::db::{ChangeSet, Db, Row};

enum Slot<T> {
    Loaded(Option<T>),
    Staged(T),
    Removed(u64),
}

impl<T: Clone> Slot<T> {
    fn current(&self) -> Option<T> {
        match self {
            Self::Loaded(row) => row.clone(),
            Self::Staged(row) => Some(row.clone()),
            Self::Removed(_) => None,
        }
    }
}

fn cached<K: Ord + Clone, T: Clone>(
    table: &mut BTreeMap<K, Slot<T>>,
    key: &K,
    load: impl FnOnce() -> Result<Option<T>, LedgerError>,
) -> Result<Option<T>, LedgerError> {
    if let Some(slot) = table.get(key) {
        return Ok(slot.current());
    }
    let row = load()?;
    table.insert(key.clone(), Slot::Loaded(row.clone()));
    Ok(row)
}

fn mark_removed<K: Ord + Clone, T: Row>(
    table: &mut BTreeMap<K, Slot<T>>,
    key: &K,
    load: impl FnOnce() -> Result<Option<T>, LedgerError>,
) -> Result<(), LedgerError> {
    match cached(table, key, load)? {
        Some(row) if row.version() > 0 => {
            table.insert(key.clone(), Slot::Removed(row.version()));
        }
        Some(_) => {
            table.insert(key.clone(), Slot::Loaded(None));
        }
        None => {}
    }
    Ok(())
}

fn drain<K, T>(table: BTreeMap<K, Slot<T>>) -> (Vec<T>, Vec<(K, u64)>) {
    let mut puts = Vec::new();
    let mut removals = Vec::new();
    for (key, slot) in table {
        match slot {
            Slot::Loaded(_) => {}
            Slot::Staged(row) => puts.push(row),
            Slot::Removed(version) => removals.push((key, version)),
        }
    }
    (puts, removals)
}

/// One logical ledger operation.
///
/// Reads go through a per-operation cache so later steps see earlier staged
/// writes. Nothing reaches storage until [`UnitOfWork::commit`]; dropping the
/// unit of work discards every staged mutation.
pub struct UnitOfWork<'a> {
    db: &'a dyn Db,
    accounts: BTreeMap<AccountId, Slot<Account>>,
    deposits: BTreeMap<DepositId, Slot<Deposit>>,
    withdraw_requests: BTreeMap<String, Slot<WithdrawRequest>>,
    spent_outputs: BTreeMap<DepositId, String>,
    events: Vec<LedgerEvent>,
}

impl<'a> UnitOfWork<'a> {
    #[must_use]
    pub fn new(db: &'a dyn Db) -> Self {
        Self {
            db,
            accounts: BTreeMap::new(),
            deposits: BTreeMap::new(),
            withdraw_requests: BTreeMap::new(),
            spent_outputs: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn account(&mut self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        let db = self.db;
        cached(&mut self.accounts, id, || db.get_account(id))
    }

    /// Returns the account, staging a fresh one if it does not exist yet.
    ///
    /// A staged creation only commits if the row is still absent, so two
    /// concurrent creations of the same id cannot both succeed.
    pub fn find_or_create_account(&mut self, id: &AccountId) -> Result<Account, LedgerError> {
        if let Some(account) = self.account(id)? {
            return Ok(account);
        }
        let account = Account::new(id.clone());
        self.put_account(account.clone());
        Ok(account)
    }

    pub fn put_account(&mut self, account: Account) {
        self.accounts
            .insert(account.id.clone(), Slot::Staged(account));
    }

    pub fn deposit(&mut self, id: &DepositId) -> Result<Option<Deposit>, LedgerError> {
        let db = self.db;
        cached(&mut self.deposits, id, || db.get_deposit(id))
    }

    pub fn put_deposit(&mut self, deposit: Deposit) {
        self.deposits
            .insert(deposit.id.clone(), Slot::Staged(deposit));
    }

    pub fn remove_deposit(&mut self, id: &DepositId) -> Result<(), LedgerError> {
        let db = self.db;
        mark_removed(&mut self.deposits, id, || db.get_deposit(id))
    }

    pub fn withdraw_request(&mut self, id: &str) -> Result<Option<WithdrawRequest>, LedgerError> {
        let db = self.db;
        cached(&mut self.withdraw_requests, &id.to_string(), || {
            db.get_withdraw_request(id)
        })
    }

    pub fn put_withdraw_request(&mut self, request: WithdrawRequest) {
        self.withdraw_requests
            .insert(request.id.clone(), Slot::Staged(request));
    }

    pub fn remove_withdraw_request(&mut self, id: &str) -> Result<(), LedgerError> {
        let db = self.db;
        mark_removed(&mut self.withdraw_requests, &id.to_string(), || {
            db.get_withdraw_request(id)
        })
    }

    /// Records that a withdrawal spent the deposit `id`, so the wallet
    /// output behind it is never registered again.
    pub fn mark_spent(&mut self, id: &DepositId, txid: &str) {
        self.spent_outputs.insert(id.clone(), txid.to_string());
    }

    pub fn spending_txid(&self, id: &DepositId) -> Result<Option<String>, LedgerError> {
        match self.spent_outputs.get(id) {
            Some(txid) => Ok(Some(txid.clone())),
            None => self.db.get_spending_txid(id),
        }
    }

    /// Deposits `account` holds a share of, confirmed only unless
    /// `include_unconfirmed`.
    pub fn get_deposits(
        &mut self,
        account: &Account,
        include_unconfirmed: bool,
    ) -> Result<Vec<Deposit>, LedgerError> {
        let mut deposits = Vec::with_capacity(account.deposits.len());
        for id in &account.deposits {
            let deposit = self.deposit(id)?.ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "account {} references missing deposit {id}",
                    account.id
                ))
            })?;
            if deposit.confirmed || include_unconfirmed {
                deposits.push(deposit);
            }
        }
        Ok(deposits)
    }

    pub fn calculate_balance(
        &mut self,
        account: &Account,
        include_unconfirmed: bool,
    ) -> Result<u64, LedgerError> {
        Ok(self
            .get_deposits(account, include_unconfirmed)?
            .iter()
            .map(|deposit| deposit.share_of(&account.id))
            .sum())
    }

    /// Stages mutated deposits and the accounts whose shares they touch,
    /// keeping each account's deposit set in step with the shares.
    pub fn persist_batch(&mut self, deposits: Vec<Deposit>, mut accounts: Vec<Account>) {
        for deposit in &deposits {
            for account in &mut accounts {
                if deposit.share_of(&account.id) > 0 {
                    account.deposits.insert(deposit.id.clone());
                } else {
                    account.deposits.remove(&deposit.id);
                }
            }
        }

        for deposit in deposits {
            self.put_deposit(deposit);
        }
        for account in accounts {
            self.put_account(account);
        }
    }

    /// Queues an event to publish once this unit of work has committed.
    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    #[must_use]
    pub fn into_change_set(self) -> (ChangeSet, Vec<LedgerEvent>) {
        let (accounts, _) = drain(self.accounts);
        let (deposits, removed_deposits) = drain(self.deposits);
        let (withdraw_requests, removed_withdraw_requests) = drain(self.withdraw_requests);

        (
            ChangeSet {
                accounts,
                deposits,
                withdraw_requests,
                removed_deposits,
                removed_withdraw_requests,
                spent_outputs: self.spent_outputs.into_iter().collect(),
            },
            self.events,
        )
    }

    /// Commits every staged write atomically and hands back the queued events.
    pub fn commit(self) -> Result<Vec<LedgerEvent>, LedgerError> {
        let db = self.db;
        let (changes, events) = self.into_change_set();
        db.commit(changes)?;
        Ok(events)
    }
}
