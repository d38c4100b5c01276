use std::{sync::Arc, time::Duration};

use bitcoin::{
    Address, CompressedPublicKey, Network, OutPoint, PrivateKey, Txid,
    hashes::Hash,
    secp256k1::{Secp256k1, SecretKey},
};
use oracle::{mock::MockOracle, oracle::Oracle};
use tempfile::TempDir;
use tokio::time::sleep;
use types::{
    account::AccountId,
    deposit::{Deposit, DepositId},
    errors::LedgerError,
    utxo::{TxOutput, UnspentFilter, UnspentOutput},
};

use crate::{Ledger, LedgerConfig, db::rocksdb::RocksDb};

mod db;
mod registration;
mod selection;

pub struct TestLedger {
    pub ledger: Ledger,
    pub oracle: MockOracle,
    pub db: Arc<RocksDb>,
    _dir: TempDir,
}

pub fn test_ledger() -> TestLedger {
    test_ledger_with(LedgerConfig::default())
}

pub fn test_ledger_with(config: LedgerConfig) -> TestLedger {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let db = Arc::new(RocksDb::new(dir.path().to_str().unwrap()).unwrap());
    let oracle = MockOracle::new(Network::Regtest, Some(1.0));
    let ledger = Ledger::new(db.clone(), Box::new(oracle.clone()), config);
    TestLedger {
        ledger,
        oracle,
        db,
        _dir: dir,
    }
}

pub fn account(id: &str) -> AccountId {
    AccountId::from(id)
}

/// The mock wallet with a pause after listing outputs and before
/// broadcasting, so a test can run other operations inside that window.
#[derive(Clone)]
pub struct SlowOracle {
    pub inner: MockOracle,
    pub list_delay: Duration,
    pub broadcast_delay: Duration,
}

#[async_trait::async_trait]
impl Oracle for SlowOracle {
    async fn validate_address(&self, address: &str) -> Result<bool, LedgerError> {
        self.inner.validate_address(address).await
    }

    async fn estimate_fee_rate(&self) -> Result<f64, LedgerError> {
        self.inner.estimate_fee_rate().await
    }

    async fn list_unspent(&self, filter: &UnspentFilter) -> Result<Vec<UnspentOutput>, LedgerError> {
        let listed = self.inner.list_unspent(filter).await?;
        sleep(self.list_delay).await;
        Ok(listed)
    }

    async fn create_and_broadcast_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[TxOutput],
    ) -> Result<Txid, LedgerError> {
        sleep(self.broadcast_delay).await;
        self.inner.create_and_broadcast_transaction(inputs, outputs).await
    }

    async fn get_new_address(&self) -> Result<String, LedgerError> {
        self.inner.get_new_address().await
    }
}

/// A regtest address the mock wallet never issues.
pub fn external_address() -> String {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[7u8; 32]).unwrap();
    let public_key =
        CompressedPublicKey::from_private_key(&secp, &PrivateKey::new(secret, Network::Regtest))
            .unwrap();
    Address::p2wpkh(&public_key, Network::Regtest).to_string()
}

impl TestLedger {
    /// A second ledger over the same store whose wallet stalls as given.
    pub fn slow_ledger(&self, list_delay: Duration, broadcast_delay: Duration) -> Ledger {
        let oracle = SlowOracle {
            inner: self.oracle.clone(),
            list_delay,
            broadcast_delay,
        };
        Ledger::new(self.db.clone(), Box::new(oracle), self.ledger.config().clone())
    }

    /// Ledger totals agree with what the wallet can actually spend.
    pub fn assert_matches_wallet(&self) {
        let totals = self.ledger.audit().unwrap();
        assert_eq!(totals.total_value, self.oracle.unspent_value().unwrap());
        assert_eq!(totals.attributed, totals.total_value);
    }

    /// Pays `value` into a fresh address of `owner` and registers it as a
    /// confirmed deposit.
    pub async fn fund(&self, owner: &str, value: u64) -> DepositId {
        let id = account(owner);
        let address = self.ledger.assign_deposit_address(&id).await.unwrap();
        let outpoint = self.oracle.fund_address(&address, value, 6).unwrap();
        self.ledger.register_deposits(&id).await.unwrap();
        DepositId::from(outpoint)
    }

    /// Writes a confirmed deposit with arbitrary holders, bypassing the wallet.
    pub fn seed(&self, tag: u8, total: u64, holders: &[(&str, u64)]) -> DepositId {
        let id = DepositId::from(OutPoint::new(Txid::from_byte_array([tag; 32]), 0));
        self.ledger
            .run("seed", |uow| {
                let mut deposit = Deposit::new(id.clone(), total, true, None);
                let mut accounts = Vec::new();
                for (holder, share) in holders {
                    let holder = account(holder);
                    deposit.set_share(&holder, *share)?;
                    accounts.push(uow.find_or_create_account(&holder)?);
                }
                uow.persist_batch(vec![deposit], accounts);
                Ok(())
            })
            .unwrap();
        id
    }

    pub fn balance(&self, owner: &str) -> u64 {
        self.ledger.balance(&account(owner), false).unwrap()
    }

    pub fn deposit(&self, id: &DepositId) -> Option<Deposit> {
        use crate::db::Db;
        self.db.get_deposit(id).unwrap()
    }
}
