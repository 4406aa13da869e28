//! Roster CLI - database bootstrap tools.
//!
//! # Usage
//!
//! ```bash
//! # Wait for the database (5 attempts, 3 s apart), then apply migrations
//! roster-cli ensure-db
//!
//! # Apply migrations only if the schema has no tables yet
//! roster-cli init-db
//! ```
//!
//! Both commands read the same configuration as the server (`ENV_DB`,
//! `ENV_TYPE`, `DATABASE_URI_*`, `DATA_DIR`, `key/.env`, `.env`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "roster-cli")]
#[command(author, version, about = "Roster CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the database with bounded retries, then apply migrations
    EnsureDb {
        /// Connection attempts before giving up
        #[arg(long, default_value_t = 5)]
        attempts: u32,

        /// Seconds to wait between attempts
        #[arg(long, default_value_t = 3)]
        backoff_secs: u64,
    },
    /// Apply migrations only if the schema is empty
    InitDb,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::EnsureDb {
            attempts,
            backoff_secs,
        } => commands::db::ensure(attempts, backoff_secs).await?,
        Commands::InitDb => commands::db::init().await?,
    }
    Ok(())
}
