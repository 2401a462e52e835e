use super::TransferStrategy;
use crate::domain::ports::StoreTransaction;
use crate::domain::transfer::{TransferOutcome, TransferRequest};
use crate::error::Result;
use async_trait::async_trait;

/// Transfer expressed as a single conditional statement.
///
/// The store debits the source only if it covers the amount and credits the
/// destination only if the debit touched a row. When a leg touches nothing,
/// both rows are re-read: a missing account wins over a short balance, and
/// if neither explains it, another writer got in between.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicStatement;

#[async_trait]
impl TransferStrategy for AtomicStatement {
    fn name(&self) -> &'static str {
        "atomic"
    }

    async fn apply(
        &self,
        scope: &mut dyn StoreTransaction,
        request: &TransferRequest,
    ) -> Result<TransferOutcome> {
        let chain = scope
            .chained_transfer(request.from, request.to, request.amount)
            .await?;
        if chain.applied() {
            return Ok(TransferOutcome::Success);
        }

        let outcome = if !chain.debited {
            let source = scope.read(request.from).await?;
            let destination = scope.read(request.to).await?;
            match (source, destination) {
                (None, _) | (_, None) => TransferOutcome::AccountNotFound,
                (Some(source), _) if !source.balance.covers(request.amount) => {
                    TransferOutcome::InsufficientFunds
                }
                _ => TransferOutcome::ConcurrentConflict,
            }
        } else {
            match scope.read(request.to).await? {
                None => TransferOutcome::AccountNotFound,
                Some(_) => TransferOutcome::ConcurrentConflict,
            }
        };
        tracing::debug!(
            debited = chain.debited,
            credited = chain.credited,
            %outcome,
            "Chained statement did not apply"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Account, Balance};
    use crate::domain::ports::AccountStore;
    use crate::infrastructure::in_memory::InMemoryAccountStore;
    use rust_decimal_macros::dec;

    async fn store() -> InMemoryAccountStore {
        let store = InMemoryAccountStore::new();
        store
            .create(Account::new(1, "Alice", Balance::new(dec!(400.00))))
            .await
            .unwrap();
        store
            .create(Account::new(2, "Bob", Balance::new(dec!(600.00))))
            .await
            .unwrap();
        store
    }

    async fn apply(store: &InMemoryAccountStore, from: i64, to: i64) -> TransferOutcome {
        let request = TransferRequest::new(from, to, dec!(450.00)).unwrap();
        let mut scope = store.begin().await.unwrap();
        let outcome = AtomicStatement
            .apply(scope.as_mut(), &request)
            .await
            .unwrap();
        scope.rollback().await.unwrap();
        outcome
    }

    #[tokio::test]
    async fn test_classifies_failed_legs() {
        let store = store().await;
        assert_eq!(apply(&store, 1, 2).await, TransferOutcome::InsufficientFunds);
        assert_eq!(apply(&store, 3, 2).await, TransferOutcome::AccountNotFound);
        assert_eq!(apply(&store, 2, 3).await, TransferOutcome::AccountNotFound);
        // Source 1 cannot cover 450.00, but the missing destination is reported first
        assert_eq!(apply(&store, 1, 3).await, TransferOutcome::AccountNotFound);
        assert_eq!(apply(&store, 2, 1).await, TransferOutcome::Success);
    }

    #[tokio::test]
    async fn test_contended_source_is_a_conflict() {
        let store = store().await;
        let mut holder = store.begin().await.unwrap();
        holder
            .read_for_update(&[2].into_iter().collect())
            .await
            .unwrap();

        assert_eq!(apply(&store, 2, 1).await, TransferOutcome::ConcurrentConflict);
    }
}
