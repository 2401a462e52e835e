use crate::domain::account::Account;
use crate::error::{LedgerError, Result};
use std::io::Write;

/// Output format of the account report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

/// Writes the final account table as `id,name,balance,version` CSV or a JSON array.
pub struct AccountWriter<W: Write> {
    writer: W,
    format: ReportFormat,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_format(writer, ReportFormat::Csv)
    }

    pub fn with_format(writer: W, format: ReportFormat) -> Self {
        Self { writer, format }
    }

    pub fn write_accounts(&mut self, accounts: &[Account]) -> Result<()> {
        match self.format {
            ReportFormat::Csv => {
                let mut csv = csv::Writer::from_writer(&mut self.writer);
                for account in accounts {
                    csv.serialize(account)?;
                }
                csv.flush()?;
            }
            ReportFormat::Json => {
                serde_json::to_writer_pretty(&mut self.writer, accounts)
                    .map_err(|e| LedgerError::IoError(e.into()))?;
                writeln!(self.writer)?;
            }
        }
        Ok(())
    }
}
