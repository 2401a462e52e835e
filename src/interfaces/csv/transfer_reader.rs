use super::input_reader;
use crate::domain::transfer::TransferRequest;
use crate::error::{LedgerError, Result};
use std::io::Read;

/// Transfer requests from a `from,to,amount` CSV.
pub struct TransferReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransferReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: input_reader(source),
        }
    }

    /// Yields one request per row. A row naming the same account twice or a
    /// non-positive amount yields an error and the rows after it are still read.
    pub fn transfers(self) -> impl Iterator<Item = Result<TransferRequest>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
