use bitcoin::{Amount, OutPoint};

/// An unspent wallet output as reported by the wallet collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub address: String,
    pub confirmations: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnspentFilter {
    /// Restrict to outputs paying one of these addresses; empty means all.
    pub addresses: Vec<String>,
    pub min_confirmations: u32,
}

impl UnspentFilter {
    #[must_use]
    pub fn for_addresses(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            min_confirmations: 0,
        }
    }

    #[must_use]
    pub fn matches(&self, output: &UnspentOutput) -> bool {
        output.confirmations >= self.min_confirmations
            && (self.addresses.is_empty() || self.addresses.contains(&output.address))
    }
}

/// A payment the wallet should include when building a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: String,
    pub value: Amount,
}
