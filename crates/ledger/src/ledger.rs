use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use oracle::oracle::Oracle;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use types::{
    account::{Account, AccountId},
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    event_published_metrics,
    events::LedgerEvent,
};

use crate::{config::LedgerConfig, db::Db, selection::CoinSelector, unit_of_work::UnitOfWork};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Value held by the wallet and how much of it is claimed by accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    pub total_value: u64,
    pub confirmed_value: u64,
    pub attributed: u64,
    pub unattributed: u64,
}

/// Entry point for every ledger operation.
///
/// Holds no ledger state of its own: each operation runs in a fresh
/// [`UnitOfWork`] against the store, and cloning the ledger is cheap.
#[derive(Clone)]
pub struct Ledger {
    pub(crate) db: Arc<dyn Db>,
    pub(crate) oracle: Box<dyn Oracle>,
    pub(crate) config: LedgerConfig,
    pub(crate) selector: Arc<dyn CoinSelector<Deposit>>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    #[must_use]
    pub fn new(db: Arc<dyn Db>, oracle: Box<dyn Oracle>, config: LedgerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            oracle,
            selector: config.selection_strategy.selector(),
            config,
            events,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Runs `work` in a unit of work and commits it, retrying from scratch on
    /// version conflicts. Any other error discards every staged mutation.
    pub fn run<T>(
        &self,
        operation: &str,
        mut work: impl FnMut(&mut UnitOfWork<'_>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut attempt = 0;
        loop {
            let mut uow = UnitOfWork::new(self.db.as_ref());
            let result = work(&mut uow).and_then(|value| Ok((value, uow.commit()?)));

            match result {
                Ok((value, events)) => {
                    self.publish(events);
                    return Ok(value);
                }
                Err(e) if e.is_conflict() && attempt < self.config.max_commit_retries => {
                    attempt += 1;
                    debug!("{operation}: commit conflict, retrying (attempt {attempt})");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn publish(&self, events: Vec<LedgerEvent>) {
        for event in events {
            event_published_metrics!(event.kind());
            if self.events.send(event).is_err() {
                debug!("No subscribers for ledger events");
            }
        }
    }

    pub fn account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        self.db.get_account(id)
    }

    /// Sum of the account's shares. Unknown accounts have a zero balance.
    pub fn balance(&self, id: &AccountId, include_unconfirmed: bool) -> Result<u64, LedgerError> {
        let mut uow = UnitOfWork::new(self.db.as_ref());
        match uow.account(id)? {
            Some(account) => uow.calculate_balance(&account, include_unconfirmed),
            None => Ok(0),
        }
    }

    pub fn deposits(&self, id: &AccountId) -> Result<Vec<Deposit>, LedgerError> {
        let mut uow = UnitOfWork::new(self.db.as_ref());
        match uow.account(id)? {
            Some(account) => uow.get_deposits(&account, true),
            None => Ok(Vec::new()),
        }
    }

    /// Totals across every deposit, after checking that deposit shares and
    /// account memberships agree.
    pub fn audit(&self) -> Result<LedgerTotals, LedgerError> {
        let deposits = self.db.get_all_deposits()?;
        let accounts = self.db.get_all_accounts()?;
        let mut totals = LedgerTotals::default();

        for deposit in &deposits {
            if deposit.attributed() > deposit.total_value {
                return Err(LedgerError::InvariantViolation(format!(
                    "deposit {} is over-attributed",
                    deposit.id
                )));
            }
            for (holder, _) in deposit.holders() {
                let listed = accounts
                    .iter()
                    .any(|account| account.id == *holder && account.holds(&deposit.id));
                if !listed {
                    return Err(LedgerError::InvariantViolation(format!(
                        "{holder} holds a share of {} but does not list it",
                        deposit.id
                    )));
                }
            }

            totals.total_value += deposit.total_value;
            totals.attributed += deposit.attributed();
            totals.unattributed += deposit.unattributed();
            if deposit.confirmed {
                totals.confirmed_value += deposit.total_value;
            }
        }

        let known: BTreeSet<&DepositId> = deposits.iter().map(|d| &d.id).collect();
        for account in &accounts {
            if let Some(missing) = account.deposits.iter().find(|id| !known.contains(id)) {
                warn!("Account {} lists unknown deposit {missing}", account.id);
                return Err(LedgerError::InvariantViolation(format!(
                    "account {} lists unknown deposit {missing}",
                    account.id
                )));
            }
        }

        Ok(totals)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
