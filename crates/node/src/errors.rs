use std::error::Error;

use derive_more::Display;
use types::errors::LedgerError;

#[derive(Debug, Display)]
pub enum NodeError {
    #[display("Configuration error: {_0}")]
    Config(String),

    #[display("IO error: {_0}")]
    Io(std::io::Error),

    #[display("{_0}")]
    Ledger(LedgerError),

    #[display("{_0}")]
    Error(String),
}

impl From<LedgerError> for NodeError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for NodeError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl Error for NodeError {}
