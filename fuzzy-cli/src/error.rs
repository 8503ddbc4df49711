use fuzzy_engine::FuzzyError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the command-line front end
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file could not be read or is invalid
    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Invalid logging setup
    #[error("Logging error: {0}")]
    Logging(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Template could not be expanded
    #[error("{source}\n  hint: {hint}")]
    Template {
        #[source]
        source: FuzzyError,
        hint: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<FuzzyError> for CliError {
    fn from(source: FuzzyError) -> Self {
        let hint = source.remediation();
        CliError::Template { source, hint }
    }
}
