mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_check_password, cmd_feed, cmd_limit, cmd_qr, cmd_status, resolve_password,
};
use crate::config::Config;
use kibble_core::db::Database;
use kibble_core::service::Ledger;
use kibble_core::store::{FileStore, Store};

#[derive(Parser)]
#[command(
    name = "kibble",
    version,
    about = "Track how much food the cat gets each day"
)]
struct Cli {
    /// Where the record is kept
    #[arg(long, global = true, value_enum, env = "KIBBLE_BACKEND", default_value = "file")]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// A single `data.json` file
    File,
    /// One key in a SQLite key-value table
    Sqlite,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "3000")]
        port: u16,
        /// Address to bind to (use 0.0.0.0 to expose to the network)
        #[arg(short, long, env = "KIBBLE_BIND", default_value = "127.0.0.1")]
        bind: String,
        /// Directory with the web frontend to serve at /
        #[arg(long, value_name = "PATH")]
        static_dir: Option<std::path::PathBuf>,
    },
    /// Show today's totals and feedings
    Status {
        #[arg(long, env = "KIBBLE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a feeding from the bag weight before and after filling the bowl
    Feed {
        /// Bag weight before filling (grams)
        weight_before: f64,
        /// Bag weight after filling (grams)
        weight_after: f64,
        #[arg(long, env = "KIBBLE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report whether the shared password has been set
    CheckPassword {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the daily limit
    Limit {
        /// Grams per day
        grams: f64,
        #[arg(long, env = "KIBBLE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a QR code that logs a phone straight into the web frontend
    Qr {
        /// Frontend URL (default: this machine's LAN address)
        #[arg(long)]
        url: Option<String>,
        /// Port used when the URL is detected
        #[arg(short, long, env = "PORT", default_value = "3000")]
        port: u16,
        #[arg(long, env = "KIBBLE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

fn open_store(config: &Config, backend: Backend) -> Result<Box<dyn Store>> {
    let store: Box<dyn Store> = match backend {
        Backend::File => Box::new(FileStore::new(&config.record_path)),
        Backend::Sqlite => Box::new(Database::open(&config.db_path)?),
    };
    Ok(store)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    tracing::debug!(data_dir = %config.data_dir.display(), "resolved data directory");
    let ledger = Ledger::new(open_store(&config, cli.backend)?, config.defaults);

    match cli.command {
        Commands::Serve {
            port,
            bind,
            static_dir,
        } => server::start_server(ledger, port, &bind, static_dir).await,
        Commands::Status { password, json } => {
            cmd_status(&ledger, &resolve_password(password)?, json)
        }
        Commands::Feed {
            weight_before,
            weight_after,
            password,
            json,
        } => cmd_feed(
            &ledger,
            &resolve_password(password)?,
            weight_before,
            weight_after,
            json,
        ),
        Commands::CheckPassword { json } => cmd_check_password(&ledger, json),
        Commands::Limit {
            grams,
            password,
            json,
        } => cmd_limit(&ledger, &resolve_password(password)?, grams, json),
        Commands::Qr {
            url,
            port,
            password,
        } => cmd_qr(&ledger, url, port, &resolve_password(password)?),
    }
}
