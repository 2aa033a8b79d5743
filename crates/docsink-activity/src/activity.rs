//! Activity run loop
//!
//! The host-facing entry point: one invocation walks the whole source
//! folder and upserts every record it finds, strictly sequentially. The
//! next fetch/decode/upsert never starts before the previous write has
//! finished, so the only mutable state in the loop is the pagination
//! cursor. Any failure aborts the run; documents written before the
//! failure stay written.

use std::collections::HashMap;

use docsink_common::{DocsinkError, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::docstore::{upsert, DocumentStore, UpsertOutcome};
use crate::record::records_from_payload;
use crate::storage::BlobSource;

/// Counters for one finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Data objects fetched and decoded (markers excluded).
    pub blobs: u64,
    pub created: u64,
    pub replaced: u64,
}

impl RunSummary {
    /// The string map handed back to the host, reserved for chaining
    /// activities together.
    pub fn into_properties(self) -> HashMap<String, String> {
        HashMap::from([
            ("blobs".to_string(), self.blobs.to_string()),
            ("created".to_string(), self.created.to_string()),
            ("replaced".to_string(), self.replaced.to_string()),
        ])
    }
}

/// Run the activity once.
///
/// Paginates the source listing, fetches and decodes each non-marker
/// object, and reconciles each record into the target collection. The
/// cancellation token is checked between records and never interrupts a
/// write in flight.
pub async fn execute(
    source: &dyn BlobSource,
    store: &dyn DocumentStore,
    extended_properties: &HashMap<String, String>,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    info!("Logging extended properties if any...");
    for (key, value) in extended_properties {
        info!("<key:{key}> <value:{value}>");
    }

    let mut summary = RunSummary::default();
    let mut cursor: Option<String> = None;

    loop {
        let page = source.list_page(cursor.as_deref()).await?;
        info!("number of blobs found: {}", page.entries.len());

        for entry in page.data_entries() {
            let payload = source.fetch(&entry.key).await?;
            let records = records_from_payload(&payload)?;
            summary.blobs += 1;

            for record in records {
                if cancel.is_cancelled() {
                    return Err(DocsinkError::Cancelled(record.id));
                }
                match upsert(store, &record).await? {
                    UpsertOutcome::Created => summary.created += 1,
                    UpsertOutcome::Replaced => summary.replaced += 1,
                }
            }
        }

        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(
        "Run complete: {} blobs, {} created, {} replaced",
        summary.blobs, summary.created, summary.replaced
    );

    Ok(summary)
}
