use std::env;
use std::error::Error;
use std::process;

use tracing::info;
use transfer_ledger::{api, replay, telemetry, Config, Ledger};

const USAGE: &str = "Usage: transfer-ledger [serve] | transfer-ledger replay <accounts.csv> <transfers.csv>";

#[tokio::main]
async fn main() {
    telemetry::init();
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Config::from_env();
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve") if args.len() <= 2 => {
            api::serve(Ledger::in_memory(&config), &config).await?;
        }
        Some("replay") if args.len() == 4 => {
            let summary = replay(&args[2], &args[3], std::io::stdout(), &config).await?;
            info!(applied = summary.applied, rejected = summary.rejected, "replay complete");
        }
        _ => return Err(USAGE.into()),
    }
    Ok(())
}
