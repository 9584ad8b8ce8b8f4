//! Metastore CLI - data object operations from the command line
//!
//! # Usage
//!
//! ```bash
//! # Store a document (id generated)
//! metastore put --index agents '{"name": "a1"}'
//!
//! # Fetch it back, dropping a field
//! metastore get --index agents 5f0c... --excludes secret
//!
//! # Query a remote store configured through a file
//! metastore --config store.toml search --index agents '{"query": {"term": {"name": "a1"}}}'
//!
//! # Show the resolved configuration
//! metastore info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{delete, get, info, put, search, update, Session};
use output::{report, Outcome};

/// Metastore - one contract over embedded, remote and key-value document stores
#[derive(Parser)]
#[command(
    name = "metastore",
    version,
    about = "Metastore CLI - data object CRUD and search",
    long_about = "Runs put/get/update/delete/search against the backend selected by\n\
                  the configuration file and METASTORE_* environment variables."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short = 'c', value_name = "FILE", env = "METASTORE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Tenant that owns the documents
    #[arg(long, short = 't', env = "METASTORE_TENANT_ID", global = true)]
    tenant: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a document
    Put(put::PutArgs),

    /// Fetch a document by id
    Get(get::GetArgs),

    /// Merge fields into a document
    Update(update::UpdateArgs),

    /// Remove a document
    Delete(delete::DeleteArgs),

    /// Run a query
    Search(search::SearchArgs),

    /// Show version and resolved configuration
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        report(Outcome::Failed, format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let session = Session::new(cli.config, cli.tenant);
    match cli.command {
        Commands::Put(args) => put::run(&session, args).await,
        Commands::Get(args) => get::run(&session, args).await,
        Commands::Update(args) => update::run(&session, args).await,
        Commands::Delete(args) => delete::run(&session, args).await,
        Commands::Search(args) => search::run(&session, args).await,
        Commands::Info(args) => info::run(&session, args),
    }
}

/// Send tracing output to stderr; `RUST_LOG` overrides the `-v` count
fn setup_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(output::log_directives(verbosity)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
