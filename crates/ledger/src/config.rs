use serde::{Deserialize, Serialize};
use types::account::AccountId;

use crate::selection::{SelectionOrder, SelectionStrategy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Internal account every batch transfer leg is routed through.
    pub clearing_account: AccountId,
    pub withdraw_request_ttl_secs: u64,
    pub required_confirmations: u32,
    pub selection_order: SelectionOrder,
    pub selection_strategy: SelectionStrategy,
    pub max_commit_retries: u32,
    /// Change at or below this is folded into the miner fee when nobody else
    /// has a claim on it.
    pub dust_limit: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            clearing_account: AccountId::from("clearing"),
            withdraw_request_ttl_secs: 600,
            required_confirmations: 1,
            selection_order: SelectionOrder::default(),
            selection_strategy: SelectionStrategy::default(),
            max_commit_retries: 8,
            dust_limit: 546,
        }
    }
}
