//! docsink activity library
//!
//! A single pipeline activity: read a folder of JSON blobs from object
//! storage and upsert every record into a document collection, matching by
//! the record's `id` field.
//!
//! # Example
//!
//! ```no_run
//! use docsink_activity::{activity, config::ActivityConfig};
//! use docsink_activity::docstore::PgDocumentStore;
//! use docsink_activity::storage::S3BlobSource;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ActivityConfig::load()?;
//!     let source = S3BlobSource::new(&config.storage);
//!     let store = PgDocumentStore::connect(&config.target).await?;
//!     let summary = activity::execute(
//!         &source,
//!         &store,
//!         &config.extended_properties,
//!         CancellationToken::new(),
//!     )
//!     .await?;
//!     println!("{:?}", summary.into_properties());
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod config;
pub mod docstore;
pub mod record;
pub mod storage;

pub use activity::{execute, RunSummary};
pub use record::Record;
