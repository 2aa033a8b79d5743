//! Blob enumeration over object storage
//!
//! Lists the source folder one page at a time, threading the storage
//! layer's opaque continuation token between calls, and fetches raw
//! payloads for the entries that hold data. Placeholder objects the
//! storage layer writes to represent empty folders are filtered out
//! before any fetch.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Region, Client};
use docsink_common::{DocsinkError, Result};
use tracing::{debug, info};

use crate::config::StorageConfig;

/// Literal token in the name of an empty-folder placeholder object.
/// Such objects carry no usable payload and are never decoded.
pub const EMPTY_FOLDER_MARKER: &str = "$$$.$$$";

/// One listed source object
#[derive(Debug, Clone, PartialEq)]
pub struct BlobEntry {
    pub key: String,
    pub size: i64,
}

impl BlobEntry {
    /// Whether this entry is a placeholder rather than a real data object.
    pub fn is_marker(&self) -> bool {
        self.key.contains(EMPTY_FOLDER_MARKER) || (self.size == 0 && self.key.ends_with('/'))
    }
}

/// One page of listing results, carrying its own successor cursor.
///
/// `next` is `None` once the listing is exhausted; the caller threads it
/// back into the next `list_page` call and holds no other state.
#[derive(Debug, Clone, Default)]
pub struct BlobPage {
    pub entries: Vec<BlobEntry>,
    pub next: Option<String>,
}

impl BlobPage {
    /// The entries worth fetching: everything that is not a marker.
    pub fn data_entries(&self) -> impl Iterator<Item = &BlobEntry> {
        self.entries.iter().filter(|entry| !entry.is_marker())
    }
}

/// Read-side port over the source object store
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// List one page of source objects. Pass `None` to start and the
    /// returned `next` cursor for each following page until it is `None`.
    async fn list_page(&self, cursor: Option<&str>) -> Result<BlobPage>;

    /// Download the raw payload of one listed object.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// S3 adapter for [`BlobSource`]
#[derive(Clone)]
pub struct S3BlobSource {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3BlobSource {
    pub fn new(config: &StorageConfig) -> Self {
        debug!("Initializing blob source for bucket: {}", config.bucket);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "docsink-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "Blob source initialized for s3://{}/{}",
            config.bucket, config.folder_path
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            prefix: config.folder_path.clone(),
        }
    }
}

#[async_trait]
impl BlobSource for S3BlobSource {
    async fn list_page(&self, cursor: Option<&str>) -> Result<BlobPage> {
        debug!(
            "Listing objects in s3://{}/{} (cursor: {:?})",
            self.bucket, self.prefix, cursor
        );

        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix);

        if let Some(token) = cursor {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DocsinkError::Storage(format!("failed to list source objects: {e}")))?;

        let entries = response
            .contents()
            .iter()
            .filter_map(|obj| {
                obj.key().map(|key| BlobEntry {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0),
                })
            })
            .collect();

        Ok(BlobPage {
            entries,
            next: response.next_continuation_token().map(|t| t.to_string()),
        })
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| DocsinkError::Storage(format!("failed to download {key}: {e}")))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| DocsinkError::Storage(format!("failed to read body of {key}: {e}")))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(data)
    }
}
