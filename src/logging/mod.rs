//! Logging setup.
//!
//! The library only emits `tracing` events; hosts decide where they go.
//! `init_logging` installs a formatted subscriber for native hosts and tests.

use std::sync::Once;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `aadhaar_proof_registry=debug`.
    pub level: String,
    #[serde(default)]
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), ansi: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggingError {
    #[error("Invalid log filter {0:?}: {1}")]
    InvalidFilter(String, String),
    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// Installs the global subscriber once. `RUST_LOG`, when set, overrides the
/// configured level. Later calls are no-ops.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    static INIT: Once = Once::new();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoggingError::InvalidFilter(config.level.clone(), e.to_string()))?,
    };

    let mut result = Ok(());
    INIT.call_once(|| {
        result = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.ansi)
            .with_target(true)
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()));
    });
    result
}
