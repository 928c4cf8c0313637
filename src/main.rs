use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;

use hookd::db::Database;
use hookd::ledger::DeliveryLedger;

#[derive(Parser)]
#[command(name = "hookd")]
#[command(about = "Signed webhook delivery daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server, dispatcher, and retry sweep
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Database file path
        #[arg(long, default_value = "./hookd.db")]
        db: String,
        /// Seconds between retry sweeps
        #[arg(long, default_value = "30")]
        retry_interval: u64,
    },
    /// Delete delivery records older than the retention window
    Purge {
        /// Database file path
        #[arg(long, default_value = "./hookd.db")]
        db: String,
        /// Retention window in days
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hookd=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            db,
            retry_interval,
        } => {
            let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
            hookd::server::run_server(addr, &db, retry_interval).await?;
        }
        Commands::Purge { db, days } => {
            let database = Database::open(&db)?;
            let ledger = DeliveryLedger::new(database);
            let deleted = ledger.purge_older_than(days)?;
            println!("Deleted {} deliveries older than {} days", deleted, days);
        }
    }

    Ok(())
}
