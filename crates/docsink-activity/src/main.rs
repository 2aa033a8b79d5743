//! docsink - blob folder to document collection upsert activity

use anyhow::Result;
use clap::Parser;
use docsink_activity::activity;
use docsink_activity::config::{ActivityConfig, ConfigOverrides};
use docsink_activity::docstore::PgDocumentStore;
use docsink_activity::storage::S3BlobSource;
use docsink_common::logging::{init_logging, LogConfig, LogLevel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "docsink")]
#[command(author, version, about = "Upsert JSON blobs into a document collection")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the activity once over the configured source folder
    Run {
        /// Source folder path (key prefix) inside the bucket
        #[arg(short, long)]
        folder_path: Option<String>,

        /// Target collection name
        #[arg(short, long)]
        collection: Option<String>,

        /// Create the collection table if it does not exist
        #[arg(long)]
        ensure_collection: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment-driven logging config; --verbose raises the default level
    let mut log_config = LogConfig::from_env()?;
    if cli.verbose && log_config.level == LogLevel::Info {
        log_config.level = LogLevel::Debug;
    }

    init_logging(&log_config)?;

    match cli.command {
        Command::Run {
            folder_path,
            collection,
            ensure_collection,
        } => {
            // CLI flags win over anything resolved from the environment.
            let config = ActivityConfig::load_with(ConfigOverrides {
                folder_path,
                collection,
            })?;

            info!(
                "Starting run: s3://{}/{} -> collection {}",
                config.storage.bucket, config.storage.folder_path, config.target.collection
            );

            let source = S3BlobSource::new(&config.storage);
            let store = PgDocumentStore::connect(&config.target).await?;

            if ensure_collection {
                store.ensure_collection().await?;
            }

            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping before the next record");
                    signal_cancel.cancel();
                }
            });

            let summary =
                activity::execute(&source, &store, &config.extended_properties, cancel).await?;

            // Returned properties are reserved for activity chaining; for a
            // standalone run they are just logged.
            for (key, value) in summary.into_properties() {
                info!("{key}={value}");
            }
        },
    }

    info!("Activity complete");
    Ok(())
}
