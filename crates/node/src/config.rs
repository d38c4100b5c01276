use std::{fs, path::PathBuf, str::FromStr};

use bitcoin::Network;
use directories::ProjectDirs;
use ledger::LedgerConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::NodeError;

const DEFAULT_DATABASE_DIRECTORY: &str = "custodian.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(skip)]
    pub config_file_path: PathBuf,
    pub database_directory: PathBuf,
    pub log_file_path: Option<PathBuf>,
    /// Prometheus exporter port; no exporter when unset.
    pub metrics_port: Option<u16>,
    #[serde(with = "network_str")]
    pub network: Network,
    pub deposit_poll_interval_secs: u64,
    pub expiration_sweep_interval_secs: u64,
    /// Fee rate in sat/vB reported by the in-memory wallet. `None` makes
    /// every fee estimate fail.
    pub mock_fee_rate: Option<f64>,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

mod network_str {
    use std::str::FromStr;

    use bitcoin::Network;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(network: &Network, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(network)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Network, D::Error> {
        let s = String::deserialize(deserializer)?;
        Network::from_str(&s).map_err(D::Error::custom)
    }
}

impl NodeConfig {
    #[must_use]
    pub fn new(config_file_path: PathBuf) -> Self {
        Self {
            config_file_path,
            database_directory: PathBuf::from(DEFAULT_DATABASE_DIRECTORY),
            log_file_path: None,
            metrics_port: None,
            network: Network::Regtest,
            deposit_poll_interval_secs: 30,
            expiration_sweep_interval_secs: 60,
            mock_fee_rate: Some(1.0),
            ledger: LedgerConfig::default(),
        }
    }

    pub fn get_config_file_path(file_path_option: Option<String>) -> Result<PathBuf, NodeError> {
        if let Some(file_path_str) = file_path_option {
            let mut path = PathBuf::from(file_path_str);
            if path.is_dir() {
                path.push("config.yaml");
            }
            debug!("Using config file path: {}", path.display());
            Ok(path)
        } else {
            let proj_dirs = ProjectDirs::from("", "", "Custodian")
                .ok_or_else(|| NodeError::Config("Failed to determine project directory".into()))?;
            Ok(proj_dirs.config_dir().join("config.yaml"))
        }
    }

    pub fn get_config(config_file_path: Option<String>) -> Result<Self, NodeError> {
        let config_file_path = Self::get_config_file_path(config_file_path)?;

        let contents = fs::read_to_string(&config_file_path).map_err(|e| {
            NodeError::Config(format!(
                "Failed to read config file {}: {e}",
                config_file_path.display()
            ))
        })?;

        let mut config = serde_yaml::from_str::<Self>(&contents)?;
        config.config_file_path = config_file_path;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self) -> Result<(), NodeError> {
        if let Some(parent) = self.config_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let config_str = serde_yaml::to_string(self)?;
        fs::write(&self.config_file_path, config_str)
            .map_err(|e| NodeError::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    /// `CUSTODIAN_DATABASE_DIRECTORY` and `CUSTODIAN_NETWORK` from the
    /// environment or `.env` take precedence over the file.
    pub fn apply_env_overrides(&mut self) -> Result<(), NodeError> {
        if let Ok(directory) = dotenvy::var("CUSTODIAN_DATABASE_DIRECTORY") {
            self.database_directory = PathBuf::from(directory);
        }
        if let Ok(network) = dotenvy::var("CUSTODIAN_NETWORK") {
            self.network = Network::from_str(&network)
                .map_err(|e| NodeError::Config(format!("Invalid CUSTODIAN_NETWORK: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if self.deposit_poll_interval_secs == 0 || self.expiration_sweep_interval_secs == 0 {
            return Err(NodeError::Config("Sweep intervals must be positive".into()));
        }
        if self.ledger.clearing_account.as_str().is_empty() {
            return Err(NodeError::Config("Clearing account id must not be empty".into()));
        }
        if self.ledger.max_commit_retries == 0 {
            return Err(NodeError::Config("max_commit_retries must be positive".into()));
        }
        if let Some(rate) = self.mock_fee_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(NodeError::Config(format!("Invalid mock fee rate {rate}")));
            }
        }
        Ok(())
    }
}

pub struct NodeConfigBuilder {
    config_file_path: Option<PathBuf>,
    database_directory: Option<PathBuf>,
    log_file_path: Option<PathBuf>,
    metrics_port: Option<u16>,
    network: Option<Network>,
    deposit_poll_interval_secs: Option<u64>,
    expiration_sweep_interval_secs: Option<u64>,
    mock_fee_rate: Option<Option<f64>>,
    ledger: Option<LedgerConfig>,
}

impl Default for NodeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            config_file_path: None,
            database_directory: None,
            log_file_path: None,
            metrics_port: None,
            network: None,
            deposit_poll_interval_secs: None,
            expiration_sweep_interval_secs: None,
            mock_fee_rate: None,
            ledger: None,
        }
    }

    #[must_use]
    pub fn config_file_path(mut self, path: PathBuf) -> Self {
        self.config_file_path = Some(path);
        self
    }

    #[must_use]
    pub fn database_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_directory = Some(path.into());
        self
    }

    #[must_use]
    pub fn log_file_path(mut self, path: Option<PathBuf>) -> Self {
        self.log_file_path = path;
        self
    }

    #[must_use]
    pub const fn metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = Some(port);
        self
    }

    #[must_use]
    pub const fn network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    #[must_use]
    pub const fn deposit_poll_interval_secs(mut self, secs: u64) -> Self {
        self.deposit_poll_interval_secs = Some(secs);
        self
    }

    #[must_use]
    pub const fn expiration_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.expiration_sweep_interval_secs = Some(secs);
        self
    }

    #[must_use]
    pub const fn mock_fee_rate(mut self, rate: Option<f64>) -> Self {
        self.mock_fee_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn build(self) -> Result<NodeConfig, NodeError> {
        let config_file_path = self.config_file_path.ok_or_else(|| {
            NodeError::Config("config_file_path must be provided when building NodeConfig".into())
        })?;

        let mut cfg = NodeConfig::new(config_file_path);
        cfg.log_file_path = self.log_file_path;
        cfg.metrics_port = self.metrics_port;

        if let Some(db_dir) = self.database_directory {
            cfg.database_directory = db_dir;
        }
        if let Some(network) = self.network {
            cfg.network = network;
        }
        if let Some(secs) = self.deposit_poll_interval_secs {
            cfg.deposit_poll_interval_secs = secs;
        }
        if let Some(secs) = self.expiration_sweep_interval_secs {
            cfg.expiration_sweep_interval_secs = secs;
        }
        if let Some(rate) = self.mock_fee_rate {
            cfg.mock_fee_rate = rate;
        }
        if let Some(ledger) = self.ledger {
            cfg.ledger = ledger;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}
