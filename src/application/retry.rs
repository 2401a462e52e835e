use super::coordinator::TransferCoordinator;
use crate::domain::transfer::{TransferOutcome, TransferRequest};
use crate::error::Result;
use std::time::Duration;

/// Caller-side retry for transfers.
///
/// Re-issues the identical request while the outcome is
/// [`TransferOutcome::ConcurrentConflict`] or the error is retryable, with a
/// linear backoff. Business rejections are returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Pause after the given failed attempt; saturates instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    pub async fn run(
        &self,
        coordinator: &TransferCoordinator,
        request: &TransferRequest,
    ) -> Result<TransferOutcome> {
        let mut attempt = 1;
        loop {
            let result = coordinator.transfer(request).await;
            let retryable = match &result {
                Ok(outcome) => outcome.is_retryable(),
                Err(e) => e.is_retryable(),
            };
            if !retryable || attempt >= self.max_attempts {
                return result;
            }
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                from = request.from,
                to = request.to,
                "Retrying transfer"
            );
            tokio::time::sleep(self.delay(attempt)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::strategy::StrategyKind;
    use crate::domain::account::{Account, Balance};
    use crate::domain::ports::AccountStore;
    use crate::infrastructure::in_memory::InMemoryAccountStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn contended() -> (InMemoryAccountStore, TransferCoordinator) {
        let store = InMemoryAccountStore::new();
        store
            .create(Account::new(1, "Alice", Balance::new(dec!(500.00))))
            .await
            .unwrap();
        store
            .create(Account::new(2, "Bob", Balance::new(dec!(500.00))))
            .await
            .unwrap();
        let coordinator =
            TransferCoordinator::with_kind(Arc::new(store.clone()), StrategyKind::Optimistic);
        (store, coordinator)
    }

    #[test]
    fn test_delay_grows_linearly_and_saturates() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10));
        assert_eq!(policy.delay(1), Duration::from_millis(10));
        assert_eq!(policy.delay(3), Duration::from_millis(30));

        let huge = RetryPolicy::new(4, Duration::MAX / 2);
        assert_eq!(huge.delay(3), Duration::MAX);
    }

    #[tokio::test]
    async fn test_single_attempt_reports_conflict() {
        let (store, coordinator) = contended().await;
        let mut holder = store.begin().await.unwrap();
        holder
            .read_for_update(&[1].into_iter().collect())
            .await
            .unwrap();

        let request = TransferRequest::new(1, 2, dec!(10.00)).unwrap();
        let outcome = RetryPolicy::once().run(&coordinator, &request).await.unwrap();
        assert_eq!(outcome, TransferOutcome::ConcurrentConflict);
    }

    #[tokio::test]
    async fn test_retries_until_holder_releases() {
        let (store, coordinator) = contended().await;
        let mut holder = store.begin().await.unwrap();
        holder
            .read_for_update(&[1].into_iter().collect())
            .await
            .unwrap();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            holder.rollback().await.unwrap();
        });

        let request = TransferRequest::new(1, 2, dec!(10.00)).unwrap();
        let policy = RetryPolicy::new(20, Duration::from_millis(10));
        let outcome = policy.run(&coordinator, &request).await.unwrap();
        assert_eq!(outcome, TransferOutcome::Success);
        release.await.unwrap();

        let alice = store.get(1).await.unwrap().unwrap();
        assert_eq!(alice.balance, Balance::new(dec!(490.00)));
    }

    #[tokio::test]
    async fn test_business_rejection_is_not_retried() {
        let (_store, coordinator) = contended().await;
        let request = TransferRequest::new(1, 2, dec!(900.00)).unwrap();
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        // A retry would sleep for a minute; returning promptly proves there was none
        let outcome = tokio::time::timeout(Duration::from_secs(5), policy.run(&coordinator, &request))
            .await
            .expect("rejection should not be retried")
            .unwrap();
        assert_eq!(outcome, TransferOutcome::InsufficientFunds);
    }
}
