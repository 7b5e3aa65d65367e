use clap::{Parser, Subcommand};
use foodspend_lib::mail::FileMailSource;
use foodspend_lib::repository::OrderStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "foodspend")]
#[command(about = "Extract food-delivery orders from exported emails and summarize spending")]
struct Args {
    /// Directory holding foodspend_config.json and the database
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse exported JSON messages and store the orders found
    Fetch {
        /// Directory of message resources (one JSON file per message)
        #[arg(long)]
        messages: PathBuf,
    },
    /// Print spending statistics over stored orders
    Report,
    /// Delete all stored orders
    Clear,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{json}");
    Ok(())
}

async fn run(args: Args) -> Result<(), String> {
    let (config, db_path) = foodspend_lib::load_config(&args.config_dir)?;
    let store = OrderStore::acquire(&db_path).await?;
    let repo = Arc::new(store.orders());

    let outcome = match args.command {
        Command::Fetch { messages } => match FileMailSource::load(&messages) {
            Ok(source) => {
                foodspend_lib::fetch_orders(Arc::new(source), repo, &config, |event| {
                    log::info!(
                        "[{}] {:.0}% {}",
                        event.task_name,
                        event.progress_percent,
                        event.status_message
                    )
                })
                .await
                .and_then(|summary| print_json(&summary))
            }
            Err(e) => Err(e),
        },
        Command::Report => foodspend_lib::get_report(repo.as_ref())
            .await
            .and_then(|report| print_json(&report)),
        Command::Clear => foodspend_lib::clear_orders(repo.as_ref()).await.map(|deleted| {
            println!("Deleted {deleted} order(s)");
        }),
    };

    store.release().await;
    outcome
}

#[tokio::main]
async fn main() {
    foodspend_lib::init_logger();

    if let Err(e) = run(Args::parse()).await {
        log::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
