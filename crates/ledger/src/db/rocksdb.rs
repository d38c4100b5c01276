use rocksdb::{ColumnFamily, DB, IteratorMode, WriteBatch};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::db::{
    ACCOUNTS_CF, ChangeSet, DEPOSITS_CF, Db, Row, SPENT_OUTPUTS_CF, WITHDRAW_REQUESTS_CF,
    WITHDRAW_TXIDS_CF,
};
use types::{
    account::{Account, AccountId},
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    withdraw::WithdrawRequest,
};

#[derive(Clone)]
pub struct RocksDb {
    pub db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDb {
    pub fn new(path: &str) -> Result<Self, LedgerError> {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ACCOUNTS_CF,
            DEPOSITS_CF,
            WITHDRAW_REQUESTS_CF,
            WITHDRAW_TXIDS_CF,
            SPENT_OUTPUTS_CF,
        ];
        let db = Arc::new(DB::open_cf(&opts, path, cfs)?);

        Ok(Self {
            db,
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, LedgerError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("missing column family {name}")))
    }

    fn read<T: Row>(&self, key: &str) -> Result<Option<T>, LedgerError> {
        self.db
            .get_cf(self.cf(T::TABLE)?, key)?
            .map(|bytes| decode::<T>(&bytes))
            .transpose()
    }

    fn read_all<T: Row>(&self) -> Result<Vec<T>, LedgerError> {
        self.db
            .iterator_cf(self.cf(T::TABLE)?, IteratorMode::Start)
            .map(|item| decode::<T>(&item?.1))
            .collect()
    }

    fn read_str(&self, cf: &str, key: &str) -> Result<Option<String>, LedgerError> {
        self.db
            .get_cf(self.cf(cf)?, key)?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| LedgerError::Encoding(format!("bad {cf} entry for {key}: {e}")))
            })
            .transpose()
    }

    /// Checks the stored version and stages the row with its version bumped.
    fn stage_put<T: Row>(&self, batch: &mut WriteBatch, mut row: T) -> Result<T, LedgerError> {
        let key = row.key();
        let stored = self.read::<T>(&key)?;
        check_version(T::TABLE, &key, stored.as_ref().map(Row::version), row.version())?;

        row.set_version(row.version() + 1);
        batch.put_cf(self.cf(T::TABLE)?, &key, encode(&row)?);
        Ok(row)
    }

    fn stage_remove<T: Row>(
        &self,
        batch: &mut WriteBatch,
        key: &str,
        version: u64,
    ) -> Result<T, LedgerError> {
        let stored = self.read::<T>(key)?;
        check_version(T::TABLE, key, stored.as_ref().map(Row::version), version)?;

        batch.delete_cf(self.cf(T::TABLE)?, key);
        stored.ok_or(LedgerError::Conflict)
    }
}

fn check_version(table: &str, key: &str, stored: Option<u64>, expected: u64) -> Result<(), LedgerError> {
    match stored {
        None if expected == 0 => Ok(()),
        Some(version) if version == expected && expected != 0 => Ok(()),
        _ => {
            debug!("Version conflict on {table}/{key}: stored {stored:?}, expected {expected}");
            Err(LedgerError::Conflict)
        }
    }
}

fn encode<T: Row>(row: &T) -> Result<Vec<u8>, LedgerError> {
    Ok(bincode::encode_to_vec(row, bincode::config::standard())?)
}

fn decode<T: Row>(bytes: &[u8]) -> Result<T, LedgerError> {
    let (row, _): (T, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(row)
}

impl Db for RocksDb {
    fn get_account(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        self.read(id.as_str())
    }

    fn get_deposit(&self, id: &DepositId) -> Result<Option<Deposit>, LedgerError> {
        self.read(id.as_str())
    }

    fn get_withdraw_request(&self, id: &str) -> Result<Option<WithdrawRequest>, LedgerError> {
        self.read(id)
    }

    fn get_withdraw_request_by_txid(
        &self,
        txid: &str,
    ) -> Result<Option<WithdrawRequest>, LedgerError> {
        match self.read_str(WITHDRAW_TXIDS_CF, txid)? {
            Some(id) => self.read(&id),
            None => Ok(None),
        }
    }

    fn get_spending_txid(&self, id: &DepositId) -> Result<Option<String>, LedgerError> {
        self.read_str(SPENT_OUTPUTS_CF, id.as_str())
    }

    fn get_all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.read_all()
    }

    fn get_all_deposits(&self) -> Result<Vec<Deposit>, LedgerError> {
        self.read_all()
    }

    fn get_all_withdraw_requests(&self) -> Result<Vec<WithdrawRequest>, LedgerError> {
        self.read_all()
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), LedgerError> {
        if changes.is_empty() {
            return Ok(());
        }

        // Version checks and the write must not interleave with another commit.
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|e| LedgerError::Storage(format!("commit lock poisoned: {e}")))?;

        let mut batch = WriteBatch::default();

        for account in changes.accounts {
            self.stage_put(&mut batch, account)?;
        }

        for deposit in changes.deposits {
            self.stage_put(&mut batch, deposit)?;
        }

        for (id, version) in &changes.removed_deposits {
            self.stage_remove::<Deposit>(&mut batch, id.as_str(), *version)?;
        }

        let txids_cf = self.cf(WITHDRAW_TXIDS_CF)?;
        for request in changes.withdraw_requests {
            let request = self.stage_put(&mut batch, request)?;
            if let Some(txid) = &request.txid {
                batch.put_cf(txids_cf, txid, request.id.as_bytes());
            }
        }

        for (id, version) in &changes.removed_withdraw_requests {
            let removed = self.stage_remove::<WithdrawRequest>(&mut batch, id, *version)?;
            if let Some(txid) = &removed.txid {
                batch.delete_cf(txids_cf, txid);
            }
        }

        let spent_cf = self.cf(SPENT_OUTPUTS_CF)?;
        for (id, txid) in &changes.spent_outputs {
            batch.put_cf(spent_cf, id.as_str(), txid.as_bytes());
        }

        self.db.write(batch)?;
        Ok(())
    }
}
