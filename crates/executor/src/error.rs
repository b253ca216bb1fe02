use database::StorageError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("{0}")]
    Validation(String),

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ExecutorError {
    /// The human-readable reason surfaced when this failure is a recoverable
    /// rejection rather than a storage fault.
    ///
    /// Validation failures, margin shortfalls, and dangling references leave
    /// the ledger untouched and come back as rejection reasons; constraint
    /// violations and I/O failures propagate as errors instead.
    pub fn rejection_reason(&self) -> Option<String> {
        match self {
            ExecutorError::Validation(_) | ExecutorError::InsufficientFunds { .. } => {
                Some(self.to_string())
            }
            ExecutorError::Storage(StorageError::NotFound(_)) => Some(self.to_string()),
            ExecutorError::Storage(_) => None,
        }
    }
}
