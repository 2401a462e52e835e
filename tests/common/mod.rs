#![allow(dead_code)]

use ledgerlock::application::coordinator::TransferCoordinator;
use ledgerlock::application::strategy::StrategyKind;
use ledgerlock::domain::account::{Account, AccountId, Balance};
use ledgerlock::domain::ports::AccountStore;
use ledgerlock::infrastructure::in_memory::InMemoryAccountStore;
use rust_decimal::Decimal;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

/// In-memory store holding the given `(id, balance)` accounts at version 0.
pub async fn store_with(balances: &[(AccountId, Decimal)]) -> InMemoryAccountStore {
    let store = InMemoryAccountStore::new();
    for &(id, balance) in balances {
        store
            .create(Account::new(id, format!("account-{id}"), Balance::new(balance)))
            .await
            .expect("seed account");
    }
    store
}

pub fn coordinator(store: &InMemoryAccountStore, kind: StrategyKind) -> TransferCoordinator {
    TransferCoordinator::with_kind(Arc::new(store.clone()), kind)
}

pub async fn account(store: &InMemoryAccountStore, id: AccountId) -> Account {
    store.get(id).await.unwrap().expect("account exists")
}

pub async fn total(store: &InMemoryAccountStore) -> Decimal {
    store
        .get_all()
        .await
        .unwrap()
        .iter()
        .map(|a| a.balance.value())
        .sum()
}

pub fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// `count` transfers of `amount` bouncing between accounts 1 and 2.
pub fn generate_transfers_csv(path: &Path, count: usize, amount: &str) -> Result<(), Error> {
    let rows: Vec<Vec<String>> = (0..count)
        .map(|i| {
            let (from, to) = if i % 2 == 0 { ("1", "2") } else { ("2", "1") };
            vec![from.to_string(), to.to_string(), amount.to_string()]
        })
        .collect();
    write_csv(path, &["from", "to", "amount"], &rows)
}
