use super::TransferStrategy;
use crate::domain::account::Balance;
use crate::domain::ports::StoreTransaction;
use crate::domain::transfer::{TransferOutcome, TransferRequest};
use crate::error::Result;
use async_trait::async_trait;

/// Optimistic concurrency control.
///
/// Reads both rows without holds, then writes each new balance only if the
/// row is still at the version that was read. A moved version aborts the
/// whole transfer with [`TransferOutcome::ConcurrentConflict`]; there is no
/// internal retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimistic;

#[async_trait]
impl TransferStrategy for Optimistic {
    fn name(&self) -> &'static str {
        "optimistic"
    }

    async fn apply(
        &self,
        scope: &mut dyn StoreTransaction,
        request: &TransferRequest,
    ) -> Result<TransferOutcome> {
        let Some(source) = scope.read(request.from).await? else {
            return Ok(TransferOutcome::AccountNotFound);
        };
        let Some(destination) = scope.read(request.to).await? else {
            return Ok(TransferOutcome::AccountNotFound);
        };

        if !source.balance.covers(request.amount) {
            return Ok(TransferOutcome::InsufficientFunds);
        }

        let amount = Balance::from(request.amount);
        let debited_balance = source.balance.with_delta(request.from, -amount)?;
        let credited_balance = destination.balance.with_delta(request.to, amount)?;

        let debited = scope
            .conditional_write(request.from, debited_balance, source.version)
            .await?;
        let credited = debited
            && scope
                .conditional_write(request.to, credited_balance, destination.version)
                .await?;

        if !credited {
            tracing::warn!(
                from_version = source.version,
                to_version = destination.version,
                "Version moved since read"
            );
            return Ok(TransferOutcome::ConcurrentConflict);
        }
        Ok(TransferOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Account;
    use crate::domain::ports::AccountStore;
    use crate::infrastructure::in_memory::InMemoryAccountStore;
    use rust_decimal_macros::dec;

    async fn store() -> InMemoryAccountStore {
        let store = InMemoryAccountStore::new();
        store
            .create(Account::new(1, "Alice", Balance::new(dec!(500.00))))
            .await
            .unwrap();
        store
            .create(Account::new(2, "Bob", Balance::new(dec!(500.00))))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_writes_bump_versions() {
        let store = store().await;
        let request = TransferRequest::new(1, 2, dec!(100.00)).unwrap();

        let mut scope = store.begin().await.unwrap();
        let outcome = Optimistic.apply(scope.as_mut(), &request).await.unwrap();
        assert_eq!(outcome, TransferOutcome::Success);
        scope.commit().await.unwrap();

        let alice = store.get(1).await.unwrap().unwrap();
        let bob = store.get(2).await.unwrap().unwrap();
        assert_eq!((alice.balance, alice.version), (Balance::new(dec!(400.00)), 1));
        assert_eq!((bob.balance, bob.version), (Balance::new(dec!(600.00)), 1));
    }

    #[tokio::test]
    async fn test_row_held_elsewhere_is_a_conflict() {
        let store = store().await;
        let request = TransferRequest::new(1, 2, dec!(10.00)).unwrap();

        // A concurrent writer has Bob's row and is about to bump its version
        let mut holder = store.begin().await.unwrap();
        holder
            .read_for_update(&[2].into_iter().collect())
            .await
            .unwrap();

        let mut scope = store.begin().await.unwrap();
        let outcome = Optimistic.apply(scope.as_mut(), &request).await.unwrap();
        assert_eq!(outcome, TransferOutcome::ConcurrentConflict);
        scope.rollback().await.unwrap();

        let alice = store.get(1).await.unwrap().unwrap();
        assert_eq!((alice.balance, alice.version), (Balance::new(dec!(500.00)), 0));
    }

    #[tokio::test]
    async fn test_insufficient_funds_writes_nothing() {
        let store = store().await;
        let request = TransferRequest::new(1, 2, dec!(500.01)).unwrap();
        let mut scope = store.begin().await.unwrap();
        let outcome = Optimistic.apply(scope.as_mut(), &request).await.unwrap();
        assert_eq!(outcome, TransferOutcome::InsufficientFunds);
        scope.commit().await.unwrap();
        assert_eq!(store.get(1).await.unwrap().unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_missing_account() {
        let store = store().await;
        let request = TransferRequest::new(1, 9, dec!(10.00)).unwrap();
        let mut scope = store.begin().await.unwrap();
        let outcome = Optimistic.apply(scope.as_mut(), &request).await.unwrap();
        assert_eq!(outcome, TransferOutcome::AccountNotFound);
    }
}
