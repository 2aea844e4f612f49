//! Error types for the buy alert pipeline

use thiserror::Error;

/// Errors raised by the pipeline stages and publishers
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Price oracle unreachable or returned unusable data
    #[error("Quote unavailable for {asset}: {reason}")]
    QuoteUnavailable { asset: String, reason: String },

    /// Chain source unreachable, non-2xx or undecodable body
    #[error("Fetch failed for {asset}: {reason}")]
    FetchFailed { asset: String, reason: String },

    /// Publisher could not deliver the alert
    #[error("Publish to {destination} failed: {reason}")]
    PublishFailed { destination: String, reason: String },

    /// Browser session could not be established at startup
    #[error("Session authentication failed: {0}")]
    SessionAuthFailed(String),

    /// Browser session was lost while running
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Errors that must terminate the process instead of being logged per asset
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::SessionAuthFailed(_) | PipelineError::SessionExpired(_)
        )
    }

    /// Process exit code used when this error terminates the binary
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::SessionAuthFailed(_) => crate::config::EXIT_SESSION_AUTH_FAILED,
            PipelineError::SessionExpired(_) => crate::config::EXIT_SESSION_EXPIRED,
            _ => crate::config::EXIT_STARTUP_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
