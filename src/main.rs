use clap::Parser;
use ledgerlock::application::coordinator::TransferCoordinator;
use ledgerlock::application::retry::RetryPolicy;
use ledgerlock::application::strategy::StrategyKind;
use ledgerlock::domain::account::{Account, Balance};
use ledgerlock::domain::ports::{AccountStore, AccountStoreHandle};
use ledgerlock::domain::transfer::TransferRequest;
use ledgerlock::infrastructure::StoreOptions;
use ledgerlock::infrastructure::in_memory::InMemoryAccountStore;
#[cfg(feature = "storage-postgres")]
use ledgerlock::infrastructure::postgres::PostgresAccountStore;
use ledgerlock::interfaces::csv::account_reader::AccountReader;
use ledgerlock::interfaces::csv::account_writer::{AccountWriter, ReportFormat};
use ledgerlock::interfaces::csv::transfer_reader::TransferReader;
use ledgerlock::telemetry;
use miette::{IntoDiagnostic, Result};
use rust_decimal_macros::dec;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Transfers CSV file (`from,to,amount`). Runs the demo sequence when omitted.
    input: Option<PathBuf>,

    /// Concurrency-control strategy used for every transfer.
    #[arg(long, value_enum, default_value_t = StrategyKind::Optimistic)]
    strategy: StrategyKind,

    /// Seed accounts CSV (`id,name,balance`). Defaults to Alice (1) and Bob (2) with 500.00 each.
    #[arg(long)]
    accounts: Option<PathBuf>,

    /// PostgreSQL connection string (optional). If provided, uses PostgreSQL.
    #[arg(long)]
    database_url: Option<String>,

    /// Give up waiting for a row lock after this many milliseconds.
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Attempts per transfer; conflicts and transient store errors are retried.
    #[arg(long, default_value_t = 1)]
    max_attempts: u32,

    /// Base delay between attempts, multiplied by the attempt number.
    #[arg(long, default_value_t = 10)]
    retry_backoff_ms: u64,

    /// Format of the final account report on stdout.
    #[arg(long, value_enum, default_value_t = ReportFormat::Csv)]
    format: ReportFormat,
}

fn demo_accounts() -> Vec<Account> {
    vec![
        Account::new(1, "Alice", Balance::new(dec!(500.00))),
        Account::new(2, "Bob", Balance::new(dec!(500.00))),
    ]
}

fn demo_transfers() -> ledgerlock::error::Result<Vec<TransferRequest>> {
    Ok(vec![
        TransferRequest::new(1, 2, dec!(100.00))?,
        // Exceeds Alice's balance and must be rejected
        TransferRequest::new(1, 2, dec!(1000.00))?,
        // Opposite direction, same hold order
        TransferRequest::new(2, 1, dec!(50.00))?,
    ])
}

async fn open_store(database_url: Option<&str>, options: StoreOptions) -> Result<AccountStoreHandle> {
    #[cfg(feature = "storage-postgres")]
    if let Some(url) = database_url {
        let store = PostgresAccountStore::connect(url, options)
            .await
            .into_diagnostic()?;
        store.recreate_schema().await.into_diagnostic()?;
        tracing::info!("Using PostgreSQL account store");
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "storage-postgres"))]
    if database_url.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --database-url, but 'storage-postgres' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    Ok(Arc::new(InMemoryAccountStore::with_options(options)))
}

async fn seed(store: &AccountStoreHandle, path: Option<&Path>) -> Result<()> {
    let accounts = match path {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            AccountReader::new(file)
                .accounts()
                .collect::<ledgerlock::error::Result<Vec<_>>>()
                .into_diagnostic()?
        }
        None => demo_accounts(),
    };
    for account in accounts {
        store.create(account).await.into_diagnostic()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_logging();
    let cli = Cli::parse();

    let mut options = StoreOptions::default();
    if let Some(ms) = cli.lock_timeout_ms {
        options = options.with_lock_timeout(Duration::from_millis(ms));
    }

    let store = open_store(cli.database_url.as_deref(), options).await?;
    seed(&store, cli.accounts.as_deref()).await?;

    let coordinator = TransferCoordinator::with_kind(Arc::clone(&store), cli.strategy);
    let policy = RetryPolicy::new(
        cli.max_attempts,
        Duration::from_millis(cli.retry_backoff_ms),
    );
    tracing::info!(strategy = coordinator.strategy_name(), "Processing transfers");

    let requests: Box<dyn Iterator<Item = ledgerlock::error::Result<TransferRequest>>> =
        match cli.input {
            Some(path) => {
                let file = File::open(path).into_diagnostic()?;
                Box::new(TransferReader::new(file).transfers())
            }
            None => Box::new(demo_transfers().into_diagnostic()?.into_iter().map(Ok)),
        };

    for request in requests {
        match request {
            Ok(request) => match policy.run(&coordinator, &request).await {
                Ok(outcome) => tracing::info!(
                    from = request.from,
                    to = request.to,
                    amount = %request.amount,
                    %outcome,
                    "Transfer processed"
                ),
                Err(e) => eprintln!("Error processing transfer: {}", e),
            },
            Err(e) => {
                eprintln!("Error reading transfer: {}", e);
            }
        }
    }

    // Output final state
    let accounts = store.get_all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::with_format(stdout.lock(), cli.format);
    writer.write_accounts(&accounts).into_diagnostic()?;

    Ok(())
}
