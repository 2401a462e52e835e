use super::TransferStrategy;
use crate::domain::account::{AccountId, Balance};
use crate::domain::ports::StoreTransaction;
use crate::domain::transfer::{TransferOutcome, TransferRequest};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Canonical hold order for a transfer: ascending id, whatever the direction.
///
/// Two transfers in opposite directions then wait on the same first row
/// instead of each holding the row the other needs.
pub fn lock_order(from: AccountId, to: AccountId) -> [AccountId; 2] {
    [from.min(to), from.max(to)]
}

/// Pessimistic concurrency control.
///
/// Takes exclusive holds on both rows (in [`lock_order`]), validates the
/// source balance observed under the hold, then applies unconditional
/// deltas. Conflicting transfers are serialized rather than aborted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pessimistic;

#[async_trait]
impl TransferStrategy for Pessimistic {
    fn name(&self) -> &'static str {
        "pessimistic"
    }

    async fn apply(
        &self,
        scope: &mut dyn StoreTransaction,
        request: &TransferRequest,
    ) -> Result<TransferOutcome> {
        let ids: BTreeSet<AccountId> = lock_order(request.from, request.to).into();
        let held = scope.read_for_update(&ids).await?;

        let (Some(source), true) = (held.get(&request.from), held.contains_key(&request.to))
        else {
            return Ok(TransferOutcome::AccountNotFound);
        };
        if !source.balance.covers(request.amount) {
            return Ok(TransferOutcome::InsufficientFunds);
        }

        let amount = Balance::from(request.amount);
        let debited = scope.apply_delta(request.from, -amount).await?;
        let credited = scope.apply_delta(request.to, amount).await?;
        // Both rows are held, so they cannot have vanished since the read
        if !(debited && credited) {
            return Ok(TransferOutcome::AccountNotFound);
        }
        Ok(TransferOutcome::Success)
    }
}
