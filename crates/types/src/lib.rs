pub mod account;
pub mod amount;
pub mod deposit;
pub mod errors;
pub mod events;
pub mod utxo;
pub mod withdraw;

#[macro_use]
pub mod macros;
