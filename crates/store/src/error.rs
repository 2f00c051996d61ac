//! Fact-store adapter errors, surfaced to the VM as exceptions (§7: "Fact-store
//! I/O error... surface as VM exception").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no fact named '{name}'")]
    Missing { name: String },
    #[error("fact '{name}' has no field '{field}'")]
    MissingField { name: String, field: String },
    #[error("transaction stack underflow: no open transaction to pop")]
    NoOpenTransaction,
    #[error("adapter I/O failure: {0}")]
    Io(String),
}
