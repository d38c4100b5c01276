use std::{
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::oracle::Oracle;
use bitcoin::{
    Address, Amount, CompressedPublicKey, Network, OutPoint, PrivateKey, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Txid,
    absolute::LockTime,
    hashes::{Hash, sha256},
    secp256k1::{Secp256k1, SecretKey},
    transaction::Version,
};
use tracing::{debug, info};
use types::{
    errors::LedgerError,
    utxo::{TxOutput, UnspentFilter, UnspentOutput},
};

#[derive(Debug, Default)]
pub struct MockWalletState {
    pub fee_rate: Option<f64>,
    pub unspent: Vec<UnspentOutput>,
    pub issued_addresses: Vec<String>,
    pub broadcasts: Vec<Transaction>,
    pub fail_broadcast: bool,
    funding_counter: u32,
}

/// In-memory wallet. Clones share state so tests can fund and inspect it.
#[derive(Clone)]
pub struct MockOracle {
    pub network: Network,
    state: Arc<Mutex<MockWalletState>>,
}

impl MockOracle {
    #[must_use]
    pub fn new(network: Network, fee_rate: Option<f64>) -> Self {
        Self {
            network,
            state: Arc::new(Mutex::new(MockWalletState {
                fee_rate,
                ..MockWalletState::default()
            })),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, MockWalletState>, LedgerError> {
        self.state
            .lock()
            .map_err(|e| LedgerError::Wallet(format!("mock wallet poisoned: {e}")))
    }

    pub fn set_fee_rate(&self, fee_rate: Option<f64>) -> Result<(), LedgerError> {
        self.state()?.fee_rate = fee_rate;
        Ok(())
    }

    pub fn set_broadcast_failure(&self, fail: bool) -> Result<(), LedgerError> {
        self.state()?.fail_broadcast = fail;
        Ok(())
    }

    /// Simulates an incoming payment to `address` and returns its outpoint.
    pub fn fund_address(
        &self,
        address: &str,
        value_sat: u64,
        confirmations: u32,
    ) -> Result<OutPoint, LedgerError> {
        let script_pubkey = self.script_for(address)?;
        let mut state = self.state()?;
        state.funding_counter += 1;

        let tx = Self::create_dummy_tx(script_pubkey, value_sat, state.funding_counter);
        let outpoint = OutPoint::new(tx.compute_txid(), 0);

        state.unspent.push(UnspentOutput {
            outpoint,
            value: Amount::from_sat(value_sat),
            address: address.to_string(),
            confirmations,
        });
        Ok(outpoint)
    }

    pub fn set_confirmations(&self, outpoint: OutPoint, confirmations: u32) -> Result<(), LedgerError> {
        let mut state = self.state()?;
        let output = state
            .unspent
            .iter_mut()
            .find(|u| u.outpoint == outpoint)
            .ok_or_else(|| LedgerError::Wallet(format!("unknown outpoint {outpoint}")))?;
        output.confirmations = confirmations;
        Ok(())
    }

    /// Drops an output as if it had been double-spent or replaced.
    pub fn drop_unspent(&self, outpoint: OutPoint) -> Result<(), LedgerError> {
        self.state()?.unspent.retain(|u| u.outpoint != outpoint);
        Ok(())
    }

    /// Sum of every output the wallet can still spend.
    pub fn unspent_value(&self) -> Result<u64, LedgerError> {
        Ok(self.state()?.unspent.iter().map(|u| u.value.to_sat()).sum())
    }

    pub fn broadcasts(&self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.state()?.broadcasts.clone())
    }

    fn script_for(&self, address: &str) -> Result<ScriptBuf, LedgerError> {
        let address = Address::from_str(address)
            .map_err(|e| LedgerError::Wallet(format!("bad address {address}: {e}")))?
            .require_network(self.network)
            .map_err(|e| LedgerError::Wallet(format!("wrong network for {address}: {e}")))?;
        Ok(address.script_pubkey())
    }

    #[must_use]
    pub fn create_dummy_tx(script_pubkey: ScriptBuf, value_sat: u64, nonce: u32) -> Transaction {
        let tx_in = TxIn {
            previous_output: OutPoint {
                txid: Txid::all_zeros(),
                vout: nonce,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ZERO,
            witness: bitcoin::witness::Witness::new(),
        };

        let tx_out = TxOut {
            value: Amount::from_sat(value_sat),
            script_pubkey,
        };

        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![tx_in],
            output: vec![tx_out],
        }
    }
}

#[async_trait::async_trait]
impl Oracle for MockOracle {
    async fn validate_address(&self, address: &str) -> Result<bool, LedgerError> {
        Ok(Address::from_str(address)
            .ok()
            .and_then(|a| a.require_network(self.network).ok())
            .is_some())
    }

    async fn estimate_fee_rate(&self) -> Result<f64, LedgerError> {
        self.state()?
            .fee_rate
            .ok_or_else(|| LedgerError::FeeEstimationFailed("no fee estimate available".into()))
    }

    async fn list_unspent(&self, filter: &UnspentFilter) -> Result<Vec<UnspentOutput>, LedgerError> {
        Ok(self
            .state()?
            .unspent
            .iter()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect())
    }

    async fn create_and_broadcast_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[TxOutput],
    ) -> Result<Txid, LedgerError> {
        let scripts = outputs
            .iter()
            .map(|o| self.script_for(&o.address))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state()?;
        if state.fail_broadcast {
            return Err(LedgerError::Wallet("broadcast rejected".into()));
        }

        let mut input_total = Amount::ZERO;
        for outpoint in inputs {
            let spent = state
                .unspent
                .iter()
                .find(|u| u.outpoint == *outpoint)
                .ok_or_else(|| LedgerError::Wallet(format!("unknown input {outpoint}")))?;
            input_total += spent.value;
        }

        let output_total = outputs.iter().map(|o| o.value).sum::<Amount>();
        if output_total > input_total {
            return Err(LedgerError::Wallet(format!(
                "outputs {output_total} exceed inputs {input_total}"
            )));
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs
                .iter()
                .map(|outpoint| TxIn {
                    previous_output: *outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::ZERO,
                    witness: bitcoin::witness::Witness::new(),
                })
                .collect(),
            output: outputs
                .iter()
                .zip(scripts)
                .map(|(o, script_pubkey)| TxOut {
                    value: o.value,
                    script_pubkey,
                })
                .collect(),
        };
        let txid = tx.compute_txid();

        state.unspent.retain(|u| !inputs.contains(&u.outpoint));
        for (vout, output) in (0u32..).zip(outputs) {
            if state.issued_addresses.contains(&output.address) {
                state.unspent.push(UnspentOutput {
                    outpoint: OutPoint::new(txid, vout),
                    value: output.value,
                    address: output.address.clone(),
                    confirmations: 0,
                });
            }
        }
        state.broadcasts.push(tx);

        info!(
            "Broadcast mock transaction {txid} spending {} inputs (fee {})",
            inputs.len(),
            input_total - output_total
        );
        Ok(txid)
    }

    async fn get_new_address(&self) -> Result<String, LedgerError> {
        let mut state = self.state()?;
        let index = u32::try_from(state.issued_addresses.len())
            .map_err(|e| LedgerError::Wallet(e.to_string()))?;

        let seed = sha256::Hash::hash(format!("mock-wallet-key/{index}").as_bytes());
        let secret = SecretKey::from_slice(&seed.to_byte_array())
            .map_err(|e| LedgerError::Wallet(format!("key derivation failed: {e}")))?;
        let secp = Secp256k1::new();
        let public_key =
            CompressedPublicKey::from_private_key(&secp, &PrivateKey::new(secret, self.network))
                .map_err(|e| LedgerError::Wallet(e.to_string()))?;

        let address = Address::p2wpkh(&public_key, self.network).to_string();
        debug!("Issued mock wallet address {address}");
        state.issued_addresses.push(address.clone());
        Ok(address)
    }
}
