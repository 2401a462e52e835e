use super::input_reader;
use crate::domain::account::Account;
use crate::error::{LedgerError, Result};
use std::io::Read;

/// Reads seed accounts from a CSV source with an `id,name,balance` header.
///
/// A `version` column is accepted but optional; it defaults to 0.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: input_reader(source),
        }
    }

    pub fn accounts(self) -> impl Iterator<Item = Result<Account>> {
        self.reader.into_deserialize().map(|result| {
            let account: Account = result?;
            if account.balance.is_negative() {
                return Err(LedgerError::Validation(format!(
                    "Account {} has a negative opening balance",
                    account.id
                )));
            }
            Ok(account)
        })
    }
}
