use derive_more::Display;
use node::NodeError;
use types::errors::LedgerError;

#[derive(Debug, Display)]
pub enum CliError {
    #[display("{_0}")]
    Node(NodeError),

    #[display("{_0}")]
    Ledger(LedgerError),

    #[display("Invalid argument: {_0}")]
    InvalidArgument(String),

    #[display("Config file {_0} already exists")]
    ConfigExists(String),

    #[display("Failed to render output: {_0}")]
    Output(String),
}

impl From<NodeError> for CliError {
    fn from(error: NodeError) -> Self {
        match error {
            NodeError::Ledger(e) => Self::Ledger(e),
            other => Self::Node(other),
        }
    }
}

impl From<LedgerError> for CliError {
    fn from(error: LedgerError) -> Self {
        Self::Ledger(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Output(error.to_string())
    }
}

impl std::error::Error for CliError {}
