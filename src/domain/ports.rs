use super::account::{Account, AccountId, AccountState, Amount, Balance};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Rows touched by each leg of a chained conditional transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainedTransfer {
    pub debited: bool,
    pub credited: bool,
}

impl ChainedTransfer {
    pub fn applied(&self) -> bool {
        self.debited && self.credited
    }
}

/// Storage holding account rows.
///
/// All balance mutations happen through a [`StoreTransaction`] obtained from
/// [`AccountStore::begin`]. The remaining methods exist for setup and reporting.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Opens a transactional scope.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
    /// Inserts a new account. Fails if the id is taken.
    async fn create(&self, account: Account) -> Result<()>;
    async fn get(&self, id: AccountId) -> Result<Option<Account>>;
    /// All committed accounts ordered by id.
    async fn get_all(&self) -> Result<Vec<Account>>;
}

/// A transactional scope over the account rows.
///
/// Writes are staged and become visible to other scopes only on
/// [`commit`](StoreTransaction::commit). Row holds are released on commit or
/// rollback. Dropping an unfinished scope rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Reads without acquiring any hold.
    async fn read(&mut self, id: AccountId) -> Result<Option<AccountState>>;

    /// Acquires exclusive holds in ascending id order and returns the current
    /// state of every row that exists. Blocks while another scope holds a row.
    async fn read_for_update(
        &mut self,
        ids: &BTreeSet<AccountId>,
    ) -> Result<BTreeMap<AccountId, AccountState>>;

    /// Sets `balance` iff the row is still at `expected_version`, bumping the
    /// version by one. Returns `false` when the version moved.
    async fn conditional_write(
        &mut self,
        id: AccountId,
        balance: Balance,
        expected_version: u64,
    ) -> Result<bool>;

    /// Adds `delta` to the balance without a version check. Callers must
    /// already hold the row. Returns `false` if the row does not exist.
    async fn apply_delta(&mut self, id: AccountId, delta: Balance) -> Result<bool>;

    /// Debits `from` only if it can cover `amount`, then credits `to` only if
    /// the debit touched a row, as one storage-level statement.
    async fn chained_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<ChainedTransfer>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

pub type AccountStoreHandle = Arc<dyn AccountStore>;
