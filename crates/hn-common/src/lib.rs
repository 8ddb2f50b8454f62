//! hn-pulse Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the hn-pulse workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`HnError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by `LOG_*` environment variables
//! - **Types**: the persisted [`types::Story`] and [`types::ErrorRecord`] shapes
//!
//! # Example
//!
//! ```no_run
//! use hn_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{HnError, Result};
pub use types::{ErrorRecord, Story};
