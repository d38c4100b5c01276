pub mod mock;
pub mod oracle;
