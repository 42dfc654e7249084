//! CLI error types.

use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The engine could not be started.
    #[error("engine error: {0}")]
    Engine(#[from] locksmith_pki::Error),

    /// The operation ran and reported a failure status.
    #[error("{status}: {}", messages.join("; "))]
    Failed {
        /// Status tag of the failed response.
        status: String,
        /// Messages of the failed response.
        messages: Vec<String>,
    },

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
