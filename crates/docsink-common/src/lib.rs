//! docsink common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging initialization for the docsink
//! workspace.
//!
//! # Example
//!
//! ```no_run
//! use docsink_common::{Result, DocsinkError};
//!
//! fn require(value: Option<&str>, key: &str) -> Result<String> {
//!     value
//!         .map(str::to_string)
//!         .ok_or_else(|| DocsinkError::Config(format!("missing key: {}", key)))
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{DocsinkError, Result};
