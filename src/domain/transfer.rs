use super::account::{AccountId, Amount};
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request to move `amount` from one account to another.
///
/// Built per call and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTransfer")]
pub struct TransferRequest {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Amount,
}

#[derive(Deserialize)]
struct RawTransfer {
    from: AccountId,
    to: AccountId,
    amount: Decimal,
}

impl TryFrom<RawTransfer> for TransferRequest {
    type Error = LedgerError;

    fn try_from(raw: RawTransfer) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to, raw.amount)
    }
}

impl TransferRequest {
    /// Validates and builds a request. Transfers involve exactly two distinct parties.
    pub fn new(from: AccountId, to: AccountId, amount: Decimal) -> Result<Self, LedgerError> {
        if from == to {
            return Err(LedgerError::Validation(format!(
                "Source and destination must differ, both are {from}"
            )));
        }
        Ok(Self {
            from,
            to,
            amount: Amount::new(amount)?,
        })
    }
}

/// Business outcome of a transfer.
///
/// Anything other than `Success` means the scope was rolled back and no
/// balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Success,
    InsufficientFunds,
    AccountNotFound,
    ConcurrentConflict,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }

    /// Only conflicts may go away by re-issuing the identical request.
    pub fn is_retryable(&self) -> bool {
        *self == Self::ConcurrentConflict
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::InsufficientFunds => "insufficient funds",
            Self::AccountNotFound => "account not found",
            Self::ConcurrentConflict => "concurrent conflict",
        };
        f.write_str(text)
    }
}
