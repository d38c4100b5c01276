use bitcoin::{OutPoint, Txid};
use dyn_clone::DynClone;
use types::{
    errors::LedgerError,
    utxo::{TxOutput, UnspentFilter, UnspentOutput},
};

/// The custodial wallet as seen by the ledger.
///
/// Every call may be slow or fail; failures surface as `LedgerError` and the
/// ledger only calls these outside of a unit of work.
#[async_trait::async_trait]
pub trait Oracle: Send + DynClone + Sync {
    async fn validate_address(&self, address: &str) -> Result<bool, LedgerError>;

    /// Current fee rate in sat/vB.
    async fn estimate_fee_rate(&self) -> Result<f64, LedgerError>;

    async fn list_unspent(&self, filter: &UnspentFilter) -> Result<Vec<UnspentOutput>, LedgerError>;

    async fn create_and_broadcast_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[TxOutput],
    ) -> Result<Txid, LedgerError>;

    async fn get_new_address(&self) -> Result<String, LedgerError>;
}

dyn_clone::clone_trait_object!(Oracle);
