pub mod config;
pub mod db;
pub mod fees;
pub mod ledger;
pub mod registration;
pub mod selection;
pub mod transfer;
pub mod unit_of_work;
pub mod withdrawal;

pub use config::LedgerConfig;
pub use ledger::{Ledger, LedgerTotals};
pub use transfer::TransferAmount;
pub use withdrawal::WithdrawAmount;

#[cfg(test)]
mod tests;
