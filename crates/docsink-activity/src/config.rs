//! Activity configuration
//!
//! Everything the host hands the activity at invocation time is resolved
//! here, eagerly: source location, storage credentials, target document
//! store and collection, and any free-form extended properties. A missing
//! or unparsable required field is a `Config` error before any I/O starts.

use docsink_common::{DocsinkError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Prefix for host-supplied extended properties in the environment.
const EXTENDED_PROPERTY_PREFIX: &str = "DOCSINK_PROP_";

/// Full activity configuration for one run
#[derive(Debug, Clone)]
pub struct ActivityConfig {
    pub storage: StorageConfig,
    pub target: TargetConfig,
    /// Free-form key/value pairs supplied by the host, logged at startup.
    pub extended_properties: HashMap<String, String>,
}

/// Explicit per-invocation overrides (CLI flags), applied during the eager
/// load. An override always wins over the environment, including over a
/// collection named inside a connection string.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub folder_path: Option<String>,
    pub collection: Option<String>,
}

/// Source object-storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Key prefix under which the source objects live.
    pub folder_path: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env(folder_path: Option<String>) -> Result<Self> {
        let folder_path = match folder_path {
            Some(path) if !path.trim().is_empty() => path,
            _ => require_env("DOCSINK_FOLDER_PATH")?,
        };

        Ok(Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            bucket: require_env("S3_BUCKET")?,
            folder_path,
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .map_err(|_| missing_either("S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"))?,
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .map_err(|_| missing_either("S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"))?,
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        })
    }
}

/// Target document-store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Postgres connection URL for the document database.
    pub database_url: String,
    /// Collection (table) the records are upserted into.
    pub collection: String,
}

impl TargetConfig {
    /// Load from the environment.
    ///
    /// Either a single `DOCSINK_TARGET` connection string
    /// (`Endpoint=...;Database=...;Collection=...`, keys case-insensitive)
    /// or the discrete `DATABASE_URL` + `DOCSINK_COLLECTION` pair. An
    /// explicit collection override wins over both.
    pub fn from_env(collection: Option<String>) -> Result<Self> {
        let mut config = if let Ok(conn) = env::var("DOCSINK_TARGET") {
            Self::from_connection_string(&conn)?
        } else {
            Self {
                database_url: require_env("DATABASE_URL")?,
                collection: match collection.clone() {
                    Some(name) => name,
                    None => require_env("DOCSINK_COLLECTION")?,
                },
            }
        };
        if let Some(name) = collection {
            config.collection = name;
        }
        validate_collection_name(&config.collection)?;
        Ok(config)
    }

    /// Parse a `Key=Value;Key=Value` connection string.
    ///
    /// Required keys: `endpoint`, `database`, `collection`. The database URL
    /// is `endpoint/database`.
    pub fn from_connection_string(conn: &str) -> Result<Self> {
        let parts = parse_connection_string(conn)?;
        let endpoint = require_part(&parts, "endpoint")?;
        let database = require_part(&parts, "database")?;
        let collection = require_part(&parts, "collection")?;

        Ok(Self {
            database_url: format!("{}/{}", endpoint.trim_end_matches('/'), database),
            collection,
        })
    }
}

impl ActivityConfig {
    /// Resolve the full configuration from the environment.
    pub fn load() -> Result<Self> {
        Self::load_with(ConfigOverrides::default())
    }

    /// Resolve the full configuration from the environment, with explicit
    /// per-invocation overrides taking precedence.
    pub fn load_with(overrides: ConfigOverrides) -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            storage: StorageConfig::from_env(overrides.folder_path)?,
            target: TargetConfig::from_env(overrides.collection)?,
            extended_properties: extended_properties_from_env(),
        })
    }
}

/// Split a `;`-separated `Key=Value` string into a map with lowercased keys.
///
/// Values may themselves contain `=` (only the first one splits); empty
/// segments are skipped; a segment without `=` is a configuration error.
pub fn parse_connection_string(conn: &str) -> Result<HashMap<String, String>> {
    let mut parts = HashMap::new();

    for segment in conn.split(';') {
        if segment.trim().is_empty() {
            continue;
        }
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            DocsinkError::Config(format!("malformed connection string segment: {segment:?}"))
        })?;
        parts.insert(key.trim().to_lowercase(), value.trim().to_string());
    }

    Ok(parts)
}

/// Collection names are interpolated into SQL, so restrict them to plain
/// identifiers.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        },
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DocsinkError::Config(format!(
            "invalid collection name: {name:?}"
        )))
    }
}

fn extended_properties_from_env() -> HashMap<String, String> {
    env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(EXTENDED_PROPERTY_PREFIX)
                .map(|name| (name.to_lowercase(), value))
        })
        .collect()
}

fn require_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(missing(key)),
    }
}

fn require_part(parts: &HashMap<String, String>, key: &str) -> Result<String> {
    parts
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| DocsinkError::Config(format!("connection string is missing key: {key}")))
}

fn missing(key: &str) -> DocsinkError {
    DocsinkError::Config(format!("missing required setting: {key}"))
}

fn missing_either(key: &str, fallback: &str) -> DocsinkError {
    DocsinkError::Config(format!("missing required setting: {key} (or {fallback})"))
}
