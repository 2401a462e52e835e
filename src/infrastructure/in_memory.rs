use super::StoreOptions;
use crate::domain::account::{Account, AccountId, AccountState, Amount, Balance};
use crate::domain::ports::{AccountStore, ChainedTransfer, StoreTransaction};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tokio::time::Instant;

type ScopeId = u64;

struct Row {
    account: Account,
    holder: Option<ScopeId>,
}

#[derive(Default)]
struct Shared {
    rows: Mutex<BTreeMap<AccountId, Row>>,
    released: Notify,
    next_scope: AtomicU64,
}

/// A thread-safe in-memory account table with transactional scopes.
///
/// Each scope stages its writes privately and publishes them on commit.
/// Exclusive row holds are tracked per row and released on commit, rollback
/// or drop; waiters are woken through a shared `Notify`.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    shared: Arc<Shared>,
    options: StoreOptions,
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            shared: Arc::default(),
            options,
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let id = self.shared.next_scope.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(scope = id, "Scope opened");
        Ok(Box::new(InMemoryTransaction {
            id,
            shared: Arc::clone(&self.shared),
            lock_timeout: self.options.lock_timeout,
            held: BTreeSet::new(),
            staged: BTreeMap::new(),
            finished: false,
        }))
    }

    async fn create(&self, account: Account) -> Result<()> {
        let mut rows = self.shared.rows.lock();
        if rows.contains_key(&account.id) {
            return Err(LedgerError::Validation(format!(
                "Account {} already exists",
                account.id
            )));
        }
        rows.insert(
            account.id,
            Row {
                account,
                holder: None,
            },
        );
        Ok(())
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let rows = self.shared.rows.lock();
        Ok(rows.get(&id).map(|row| row.account.clone()))
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        let rows = self.shared.rows.lock();
        Ok(rows.values().map(|row| row.account.clone()).collect())
    }
}

/// One open scope over an [`InMemoryAccountStore`].
pub struct InMemoryTransaction {
    id: ScopeId,
    shared: Arc<Shared>,
    lock_timeout: Option<std::time::Duration>,
    held: BTreeSet<AccountId>,
    staged: BTreeMap<AccountId, AccountState>,
    finished: bool,
}

impl InMemoryTransaction {
    fn is_free_for(&self, row: &Row) -> bool {
        row.holder.is_none_or(|holder| holder == self.id)
    }

    fn visible_state(&self, row: &Row) -> AccountState {
        self.staged
            .get(&row.account.id)
            .copied()
            .unwrap_or_else(|| row.account.state())
    }

    /// Takes the exclusive hold on `id`, waiting for the current holder to
    /// finish. Returns `None` if the row does not exist.
    async fn acquire(&mut self, id: AccountId) -> Result<Option<AccountState>> {
        let deadline = self.lock_timeout.map(|limit| Instant::now() + limit);
        loop {
            // Registered before checking so a release in between is not missed.
            let notified = self.shared.released.notified();
            {
                let mut rows = self.shared.rows.lock();
                let Some(row) = rows.get_mut(&id) else {
                    return Ok(None);
                };
                if self.is_free_for(row) {
                    row.holder = Some(self.id);
                    let state = self.visible_state(row);
                    self.held.insert(id);
                    return Ok(Some(state));
                }
            }
            tracing::debug!(scope = self.id, account = id, "Waiting for row hold");
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, notified)
                    .await
                    .map_err(|_| LedgerError::LockTimeout)?,
                None => notified.await,
            }
        }
    }

    fn finish(&mut self, publish: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        {
            let mut rows = self.shared.rows.lock();
            if publish {
                for (id, state) in std::mem::take(&mut self.staged) {
                    if let Some(row) = rows.get_mut(&id) {
                        row.account.balance = state.balance;
                        row.account.version = state.version;
                    }
                }
            }
            for id in std::mem::take(&mut self.held) {
                if let Some(row) = rows.get_mut(&id)
                    && row.holder == Some(self.id)
                {
                    row.holder = None;
                }
            }
        }
        self.staged.clear();
        self.shared.released.notify_waiters();
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn read(&mut self, id: AccountId) -> Result<Option<AccountState>> {
        let rows = self.shared.rows.lock();
        Ok(rows.get(&id).map(|row| self.visible_state(row)))
    }

    async fn read_for_update(
        &mut self,
        ids: &BTreeSet<AccountId>,
    ) -> Result<BTreeMap<AccountId, AccountState>> {
        let mut states = BTreeMap::new();
        for &id in ids {
            if let Some(state) = self.acquire(id).await? {
                states.insert(id, state);
            }
        }
        Ok(states)
    }

    async fn conditional_write(
        &mut self,
        id: AccountId,
        balance: Balance,
        expected_version: u64,
    ) -> Result<bool> {
        let mut rows = self.shared.rows.lock();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        // A row held elsewhere is about to move; treat it as already moved.
        if !self.is_free_for(row) {
            tracing::debug!(scope = self.id, account = id, "Row held by another scope");
            return Ok(false);
        }
        let current = self.visible_state(row);
        if current.version != expected_version {
            return Ok(false);
        }
        row.holder = Some(self.id);
        self.held.insert(id);
        self.staged.insert(
            id,
            AccountState {
                balance,
                version: expected_version + 1,
            },
        );
        Ok(true)
    }

    async fn apply_delta(&mut self, id: AccountId, delta: Balance) -> Result<bool> {
        let Some(current) = self.acquire(id).await? else {
            return Ok(false);
        };
        let balance = current.balance.with_delta(id, delta)?;
        self.staged.insert(
            id,
            AccountState {
                balance,
                version: current.version + 1,
            },
        );
        Ok(true)
    }

    async fn chained_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<ChainedTransfer> {
        let mut rows = self.shared.rows.lock();
        let mut outcome = ChainedTransfer::default();

        let Some(source) = rows.get_mut(&from).filter(|row| self.is_free_for(row)) else {
            return Ok(outcome);
        };
        let debit = self.visible_state(source);
        if !debit.balance.covers(amount) {
            return Ok(outcome);
        }
        let debited_balance = debit.balance.with_delta(from, -Balance::from(amount))?;
        source.holder = Some(self.id);
        self.held.insert(from);
        self.staged.insert(
            from,
            AccountState {
                balance: debited_balance,
                version: debit.version + 1,
            },
        );
        outcome.debited = true;

        let Some(destination) = rows.get_mut(&to).filter(|row| self.is_free_for(row)) else {
            return Ok(outcome);
        };
        let credit = self.visible_state(destination);
        let credited_balance = credit.balance.with_delta(to, amount.into())?;
        destination.holder = Some(self.id);
        self.held.insert(to);
        self.staged.insert(
            to,
            AccountState {
                balance: credited_balance,
                version: credit.version + 1,
            },
        );
        outcome.credited = true;
        Ok(outcome)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut scope = self;
        tracing::trace!(scope = scope.id, writes = scope.staged.len(), "Scope committed");
        scope.finish(true);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut scope = self;
        tracing::trace!(scope = scope.id, "Scope rolled back");
        scope.finish(false);
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.finish(false);
    }
}
