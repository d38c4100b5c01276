use std::sync::Arc;

use ledger::{Ledger, db::rocksdb::RocksDb};
use oracle::mock::MockOracle;

pub mod config;
pub mod errors;
pub mod logging;
pub mod notifier;
pub mod scheduler;
pub mod start_node;

pub use config::{NodeConfig, NodeConfigBuilder};
pub use errors::NodeError;

/// A ledger opened from configuration, along with the wallet it talks to.
#[derive(Clone)]
pub struct Node {
    pub ledger: Ledger,
    pub oracle: MockOracle,
}

impl Node {
    pub fn open(config: &NodeConfig) -> Result<Self, NodeError> {
        let path = config.database_directory.to_str().ok_or_else(|| {
            NodeError::Config(format!(
                "Database path {} is not valid UTF-8",
                config.database_directory.display()
            ))
        })?;
        let db = Arc::new(RocksDb::new(path)?);
        let oracle = MockOracle::new(config.network, config.mock_fee_rate);
        let ledger = Ledger::new(db, Box::new(oracle.clone()), config.ledger.clone());
        Ok(Self { ledger, oracle })
    }
}
