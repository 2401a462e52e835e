use super::strategy::{StrategyKind, TransferStrategyBox};
use crate::domain::account::AccountId;
use crate::domain::ports::AccountStoreHandle;
use crate::domain::transfer::{TransferOutcome, TransferRequest};
use crate::error::Result;
use rust_decimal::Decimal;
use tracing::Instrument;

/// Lifecycle of a single transfer call.
///
/// `Idle → ScopeOpen → StrategyApplied → Committed`, or
/// `ScopeOpen → Failed → RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    ScopeOpen,
    StrategyApplied,
    Committed,
    Failed,
    RolledBack,
}

impl TransferPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    pub fn can_advance_to(&self, next: TransferPhase) -> bool {
        use TransferPhase::*;
        matches!(
            (self, next),
            (Idle, ScopeOpen)
                | (ScopeOpen, StrategyApplied)
                | (ScopeOpen, Failed)
                | (StrategyApplied, Committed)
                | (StrategyApplied, Failed)
                | (Failed, RolledBack)
        )
    }

    fn advance(&mut self, next: TransferPhase) {
        debug_assert!(self.can_advance_to(next), "{self:?} -> {next:?}");
        tracing::trace!(from = ?self, to = ?next, "Transfer phase");
        *self = next;
    }
}

/// Runs transfers against an account store with one strategy.
///
/// Each call opens its own scope, hands it to the strategy, commits on
/// [`TransferOutcome::Success`] and rolls back on anything else, including
/// errors. The coordinator never retries; see
/// [`RetryPolicy`](super::retry::RetryPolicy) for caller-driven retries.
pub struct TransferCoordinator {
    store: AccountStoreHandle,
    strategy: TransferStrategyBox,
}

impl TransferCoordinator {
    /// Creates a new `TransferCoordinator` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - The account store every scope is opened on.
    /// * `strategy` - The concurrency-control strategy to apply.
    pub fn new(store: AccountStoreHandle, strategy: TransferStrategyBox) -> Self {
        Self { store, strategy }
    }

    pub fn with_kind(store: AccountStoreHandle, kind: StrategyKind) -> Self {
        Self::new(store, kind.build())
    }

    pub fn store(&self) -> &AccountStoreHandle {
        &self.store
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Validates the arguments and runs the transfer.
    pub async fn transfer_between(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<TransferOutcome> {
        let request = TransferRequest::new(from, to, amount)?;
        self.transfer(&request).await
    }

    /// Moves funds as described by `request`.
    ///
    /// Balances change only when this returns `Ok(TransferOutcome::Success)`.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let span = tracing::info_span!(
            "transfer",
            strategy = self.strategy.name(),
            from = request.from,
            to = request.to,
            amount = %request.amount,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let mut phase = TransferPhase::Idle;
        let mut scope = self.store.begin().await?;
        phase.advance(TransferPhase::ScopeOpen);

        let applied = self.strategy.apply(scope.as_mut(), request).await;
        if let Ok(TransferOutcome::Success) = applied {
            phase.advance(TransferPhase::StrategyApplied);
            if let Err(e) = scope.commit().await {
                // A scope that failed to commit is discarded by the store
                phase.advance(TransferPhase::Failed);
                tracing::warn!(error = %e, "Commit failed");
                return Err(e);
            }
            phase.advance(TransferPhase::Committed);
            tracing::debug!("Transfer committed");
            return Ok(TransferOutcome::Success);
        }

        phase.advance(TransferPhase::Failed);
        match scope.rollback().await {
            Ok(()) => phase.advance(TransferPhase::RolledBack),
            // The scope is gone either way; surface the strategy result
            Err(e) => tracing::error!(error = %e, "Rollback failed"),
        }
        match &applied {
            Ok(outcome) => tracing::info!(%outcome, "Transfer rejected"),
            Err(e) => tracing::warn!(error = %e, "Transfer failed"),
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Account, Balance};
    use crate::domain::ports::AccountStore;
    use crate::error::LedgerError;
    use crate::infrastructure::in_memory::InMemoryAccountStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn coordinator(kind: StrategyKind) -> TransferCoordinator {
        let store = InMemoryAccountStore::new();
        store
            .create(Account::new(1, "Alice", Balance::new(dec!(500.00))))
            .await
            .unwrap();
        store
            .create(Account::new(2, "Bob", Balance::new(dec!(500.00))))
            .await
            .unwrap();
        TransferCoordinator::with_kind(Arc::new(store), kind)
    }

    #[test]
    fn test_phase_transitions() {
        use TransferPhase::*;
        assert!(Idle.can_advance_to(ScopeOpen));
        assert!(StrategyApplied.can_advance_to(Committed));
        assert!(Failed.can_advance_to(RolledBack));
        assert!(!Idle.can_advance_to(Committed));
        assert!(!ScopeOpen.can_advance_to(Committed));
        assert!(!RolledBack.can_advance_to(ScopeOpen));
        assert!(Committed.is_terminal() && RolledBack.is_terminal());
        assert!(!Failed.is_terminal());
    }

    #[tokio::test]
    async fn test_rejected_transfer_leaves_rows_untouched() {
        for kind in StrategyKind::ALL {
            let coordinator = coordinator(kind).await;
            let outcome = coordinator
                .transfer_between(1, 2, dec!(1000.00))
                .await
                .unwrap();
            assert_eq!(outcome, TransferOutcome::InsufficientFunds, "{kind}");

            for id in [1, 2] {
                let account = coordinator.store().get(id).await.unwrap().unwrap();
                assert_eq!(account.balance, Balance::new(dec!(500.00)), "{kind}");
                assert_eq!(account.version, 0, "{kind}");
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_open_a_scope() {
        let coordinator = coordinator(StrategyKind::Optimistic).await;
        let same = coordinator.transfer_between(1, 1, dec!(1.00)).await;
        assert!(matches!(same, Err(LedgerError::Validation(_))));
        let negative = coordinator.transfer_between(1, 2, dec!(-1.00)).await;
        assert!(matches!(negative, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_atomic_missing_destination_rolls_back_debit() {
        let coordinator = coordinator(StrategyKind::Atomic).await;
        let outcome = coordinator
            .transfer_between(1, 99, dec!(100.00))
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::AccountNotFound);

        let alice = coordinator.store().get(1).await.unwrap().unwrap();
        assert_eq!(alice.balance, Balance::new(dec!(500.00)));
        assert_eq!(alice.version, 0);
    }
}
