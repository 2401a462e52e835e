use crate::domain::account::AccountId;
use thiserror::Error;

/// Infrastructure and input failures.
///
/// Business outcomes of a transfer (insufficient funds, missing account,
/// version conflict) are not errors; they are reported through
/// [`TransferOutcome`](crate::domain::transfer::TransferOutcome).
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Timed out waiting for a row lock")]
    LockTimeout,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Balance of account {account} would overflow")]
    BalanceOverflow { account: AccountId },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LedgerError {
    /// Wraps any store-level failure.
    pub fn store<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::StoreUnavailable(error.into())
    }

    /// Whether re-issuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::LockTimeout)
    }
}

#[cfg(feature = "storage-postgres")]
impl From<sqlx::Error> for LedgerError {
    fn from(error: sqlx::Error) -> Self {
        if let Some(db_error) = error.as_database_error() {
            match db_error.code().as_deref() {
                // 55P03: lock_not_available, raised when `lock_timeout` expires
                Some("55P03") => return Self::LockTimeout,
                // 22003: numeric_value_out_of_range, a balance outside NUMERIC(19, 4)
                Some("22003") => return Self::Validation(db_error.message().to_string()),
                _ => {}
            }
        }
        Self::StoreUnavailable(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
