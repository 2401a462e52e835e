use super::StoreOptions;
use crate::domain::account::{Account, AccountId, AccountState, Amount, Balance};
use crate::domain::ports::{AccountStore, ChainedTransfer, StoreTransaction};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::{BTreeMap, BTreeSet};

/// A persistent store backed by a PostgreSQL `accounts(id, name, balance, version)` table.
///
/// Scopes map one-to-one onto database transactions. Row holds are
/// `FOR NO KEY UPDATE` locks, released by the database at commit or rollback.
///
/// This struct is cheap to clone (`PgPool` is reference counted).
#[derive(Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
    options: StoreOptions,
}

impl PostgresAccountStore {
    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, options: StoreOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, options))
    }

    pub fn new(pool: PgPool, options: StoreOptions) -> Self {
        Self { pool, options }
    }

    /// Creates the accounts table if it is missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id BIGINT PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                balance NUMERIC(19, 4) NOT NULL,
                version BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drops and recreates the accounts table.
    pub async fn recreate_schema(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS accounts")
            .execute(&self.pool)
            .await?;
        self.ensure_schema().await
    }
}

fn to_db_version(version: u64) -> Result<i64> {
    i64::try_from(version).map_err(LedgerError::store)
}

fn row_to_state(row: &PgRow) -> Result<AccountState> {
    let balance: Decimal = row.try_get("balance")?;
    let version: i64 = row.try_get("version")?;
    Ok(AccountState {
        balance: Balance::new(balance),
        version: u64::try_from(version).map_err(LedgerError::store)?,
    })
}

fn row_to_account(row: &PgRow) -> Result<Account> {
    let state = row_to_state(row)?;
    Ok(Account {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        balance: state.balance,
        version: state.version,
    })
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await?;
        if let Some(limit) = self.options.lock_timeout {
            // SET does not accept bind parameters
            let statement = format!("SET LOCAL lock_timeout = '{}ms'", limit.as_millis());
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn create(&self, account: Account) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO accounts (id, name, balance, version) VALUES ($1, $2, $3, $4)",
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(account.balance.value())
        .bind(to_db_version(account.version)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // 23505: unique_violation
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => Err(
                LedgerError::Validation(format!("Account {} already exists", account.id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, name, balance, version FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT id, name, balance, version FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_account).collect()
    }
}

/// A database transaction acting as a store scope.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn read(&mut self, id: AccountId) -> Result<Option<AccountState>> {
        let row = sqlx::query("SELECT balance, version FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_state).transpose()
    }

    async fn read_for_update(
        &mut self,
        ids: &BTreeSet<AccountId>,
    ) -> Result<BTreeMap<AccountId, AccountState>> {
        let ids: Vec<AccountId> = ids.iter().copied().collect();
        let rows = sqlx::query(
            r#"
            SELECT id, balance, version FROM accounts
            WHERE id = ANY($1)
            ORDER BY id
            FOR NO KEY UPDATE
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&mut *self.tx)
        .await?;

        let mut states = BTreeMap::new();
        for row in &rows {
            let id: AccountId = row.try_get("id")?;
            states.insert(id, row_to_state(row)?);
        }
        Ok(states)
    }

    async fn conditional_write(
        &mut self,
        id: AccountId,
        balance: Balance,
        expected_version: u64,
    ) -> Result<bool> {
        // SKIP LOCKED: a row locked by another transaction is reported as a
        // mismatch instead of waiting for it
        let result = sqlx::query(
            r#"
            UPDATE accounts SET balance = $1, version = version + 1
            WHERE id = (
                SELECT id FROM accounts
                WHERE id = $2 AND version = $3
                FOR NO KEY UPDATE SKIP LOCKED
            )
            "#,
        )
        .bind(balance.value())
        .bind(id)
        .bind(to_db_version(expected_version)?)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_delta(&mut self, id: AccountId, delta: Balance) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET balance = balance + $1, version = version + 1 WHERE id = $2",
        )
        .bind(delta.value())
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn chained_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<ChainedTransfer> {
        // The CTE locks `from` before `to`; take both in ascending id order first
        let ids = [from, to];
        sqlx::query("SELECT id FROM accounts WHERE id = ANY($1) ORDER BY id FOR NO KEY UPDATE")
            .bind(&ids[..])
            .fetch_all(&mut *self.tx)
            .await?;

        let row = sqlx::query(
            r#"
            WITH debit AS (
                UPDATE accounts SET balance = balance - $1, version = version + 1
                WHERE id = $2 AND balance >= $1
                RETURNING id
            ), credit AS (
                UPDATE accounts SET balance = balance + $1, version = version + 1
                WHERE id = $3 AND EXISTS (SELECT 1 FROM debit)
                RETURNING id
            )
            SELECT
                (SELECT COUNT(*) FROM debit) AS debited,
                (SELECT COUNT(*) FROM credit) AS credited
            "#,
        )
        .bind(amount.value())
        .bind(from)
        .bind(to)
        .fetch_one(&mut *self.tx)
        .await?;

        let debited: i64 = row.try_get("debited")?;
        let credited: i64 = row.try_get("credited")?;
        Ok(ChainedTransfer {
            debited: debited > 0,
            credited: credited > 0,
        })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let scope = *self;
        scope.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let scope = *self;
        scope.tx.rollback().await?;
        Ok(())
    }
}
