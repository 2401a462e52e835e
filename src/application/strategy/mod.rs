//! Concurrency-control strategies for moving funds between two accounts.
//!
//! Every strategy runs inside a scope opened by the
//! [`TransferCoordinator`](crate::application::coordinator::TransferCoordinator)
//! and never commits or rolls back by itself. Each write path goes through
//! exactly one discipline: a version check ([`Optimistic`]), an exclusive
//! row hold ([`Pessimistic`]), or one conditional statement ([`AtomicStatement`]).

mod atomic;
mod optimistic;
mod pessimistic;

pub use atomic::AtomicStatement;
pub use optimistic::Optimistic;
pub use pessimistic::{Pessimistic, lock_order};

use crate::domain::ports::StoreTransaction;
use crate::domain::transfer::{TransferOutcome, TransferRequest};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[async_trait]
pub trait TransferStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Performs the balance movement inside `scope`.
    ///
    /// Business failures are returned as `Ok` outcomes; the caller rolls the
    /// scope back for anything but [`TransferOutcome::Success`].
    async fn apply(
        &self,
        scope: &mut dyn StoreTransaction,
        request: &TransferRequest,
    ) -> Result<TransferOutcome>;
}

pub type TransferStrategyBox = Box<dyn TransferStrategy>;

/// Selector for the built-in strategies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Optimistic,
    Pessimistic,
    Atomic,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [Self::Optimistic, Self::Pessimistic, Self::Atomic];

    pub fn build(self) -> TransferStrategyBox {
        match self {
            Self::Optimistic => Box::new(Optimistic),
            Self::Pessimistic => Box::new(Pessimistic),
            Self::Atomic => Box::new(AtomicStatement),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.build().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_builds_matching_strategy() {
        let names: Vec<&str> = StrategyKind::ALL.iter().map(|k| k.build().name()).collect();
        assert_eq!(names, vec!["optimistic", "pessimistic", "atomic"]);
        assert_eq!(StrategyKind::Atomic.to_string(), "atomic");
    }
}
