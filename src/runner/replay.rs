use std::error::Error;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use csv_async::{AsyncReaderBuilder, Error as CsvError, Trim};
use rust_decimal::Decimal;
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::csv_utils::{read_csv, write_csv};
use crate::dto::{Account, AccountRow, TransferRequest, TransferRow};
use crate::ledger::Ledger;
use crate::stores::{AccountStore, InMemoryStore};

type Result<T, E = Box<dyn Error + Send + Sync>> = std::result::Result<T, E>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Replays a transfers file against accounts seeded from an accounts file and
/// writes the final balances to the provided writer.
/// Spawns two tasks:
/// * CSV reader - streams transfer rows from the input file and sends them to the processor via channel.
/// * Processor - executes the transfers in file order until the channel is closed.
///
/// # Arguments
/// * `accounts_path` - CSV file with `id,currency,balance` rows
/// * `transfers_path` - CSV file with `source,target,amount,currency` rows
/// * `writer` - Where to write the final account balances (e.g. stdout)
///
/// # Errors
/// Returns an error if:
/// * Either input file cannot be read
/// * Either CSV is malformed
/// * A seeded account has a negative balance
/// * The accounts file lists an id more than once
/// * Writing to the output fails
///
/// A transfer that fails validation is logged and counted as rejected, it does
/// not stop the replay.
pub async fn run<P, Q, W>(
    accounts_path: P,
    transfers_path: Q,
    writer: W,
    config: &Config,
) -> Result<ReplaySummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    W: Write,
{
    let store = Arc::new(InMemoryStore::new());
    seed_accounts(&store, accounts_path)?;
    let ledger = Ledger::new(store, config);

    let (tx, rx) = mpsc::channel(config.replay_buffer);
    let transfers_path = transfers_path.as_ref().to_owned();

    let reader_handle = tokio::spawn(read_transfers(transfers_path, tx));
    let processor_handle = tokio::spawn(process_transfers(ledger.clone(), rx));

    // Wait for reader to finish and propagate any errors
    reader_handle.await??;
    let summary = processor_handle.await?;
    info!(applied = summary.applied, rejected = summary.rejected, "replay finished");

    // Accounts are listed in id order, so the output is deterministic
    let accounts = ledger.accounts().list_all()?;
    write_csv(writer, accounts.iter().map(AccountRow::from))?;
    Ok(summary)
}

fn seed_accounts(store: &InMemoryStore, path: impl AsRef<Path>) -> Result<()> {
    let created_at = Utc::now();
    for row in read_csv::<AccountRow, _>(path)? {
        let row = row?;
        if row.balance < Decimal::ZERO {
            return Err(crate::Error::InvalidAmount.into());
        }
        if store.get_account(row.id)?.is_some() {
            warn!(id = row.id, "duplicate account in seed file");
            return Err(format!("duplicate account id {} in accounts file", row.id).into());
        }
        debug!(id = row.id, "seeding account");
        store.save_account(Account {
            id: row.id,
            balance: row.balance,
            currency: row.currency,
            created_at,
        })?;
    }
    Ok(())
}

/// Reads and deserializes transfer rows from a CSV file.
/// Returns them through the provided channel.
async fn read_transfers(
    input_path: impl AsRef<Path> + Send,
    tx: mpsc::Sender<TransferRequest>,
) -> Result<(), CsvError> {
    let file = File::open(input_path).await?;
    let mut csv_reader = AsyncReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .create_deserializer(file);

    let mut records = csv_reader.deserialize::<TransferRow>();
    while let Some(result) = records.next().await {
        // CSV parsing errors are critical - propagate them
        let row = result?;
        if tx.send(row.into()).await.is_err() {
            // Receiver dropped, exit gracefully
            break;
        }
    }
    Ok(())
}

/// Executes transfers received through the channel, one at a time.
async fn process_transfers(ledger: Ledger, mut rx: mpsc::Receiver<TransferRequest>) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    while let Some(request) = rx.recv().await {
        match ledger.transfers().execute(request).await {
            Ok(_) => summary.applied += 1,
            Err(err) => {
                warn!(%err, "transfer skipped");
                summary.rejected += 1;
            }
        }
    }
    summary
}
