use super::config::ConfigError;
use crate::core::command::CommandError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a [`JobBackend`](super::backend::JobBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Job execution interrupted by the operator")]
    Interrupted,

    #[error("Backend setup failed: {0}")]
    Setup(String),

    #[error("Failed to poll job '{job}': {source}")]
    Poll {
        job: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to kill job '{job}': {source}")]
    Kill {
        job: String,
        #[source]
        source: io::Error,
    },

    #[error("Backend failure: {0}")]
    Other(String),
}

impl BackendError {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, BackendError::Interrupted)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Job queue '{0}' has already started, cannot add more jobs")]
    QueueStarted(String),

    #[error("Job queue '{0}' has already run and cannot be reused")]
    QueueConsumed(String),

    #[error("Invalid recipient email address: {0}")]
    InvalidRecipient(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid command: {0}")]
    Command(#[from] CommandError),

    #[error("Backend error: {source}")]
    Backend {
        #[from]
        source: BackendError,
    },

    #[error("I/O error on '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write report '{path}': {source}", path = path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Renders an error and its chain of sources, one cause per line.
pub fn format_error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str("\nCaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
