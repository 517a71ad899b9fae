//! Error types for the interview engine
//!
//! Each component owns one enum. Validation and permission failures are raised
//! at the component boundary and never reach the network layer; everything in
//! `AnalysisError` except `Validation` is a retryable analysis failure.

use thiserror::Error;

use crate::session::{AnalysisMode, SessionPhase};

/// Question catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Domain {domain} does not support level {level}")]
    UnsupportedLevel { domain: String, level: String },

    #[error("No questions available for {domain} at level {level}")]
    NoQuestions { domain: String, level: String },

    #[error("Failed to load catalog: {0}")]
    Load(String),
}

/// Capture manager errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CaptureError {
    /// Device access refused. Fatal to the current attempt only.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Cannot {action} while capture is {state}")]
    InvalidState { action: &'static str, state: String },

    /// Device failed mid-recording; the attempt was aborted
    #[error("Capture device error: {0}")]
    Device(String),

    #[error("Failed to encode recording: {0}")]
    Encoding(String),

    #[error("Invalid capture configuration: {0}")]
    Config(String),
}

/// Analysis submitter errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    /// Local precondition failure. No request was sent.
    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Analysis request timed out")]
    Timeout,

    #[error("Analysis service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    /// Whether the caller may re-invoke the same request
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AnalysisError::Validation(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::Timeout
        } else if err.is_decode() {
            AnalysisError::MalformedResponse(err.to_string())
        } else {
            AnalysisError::Network(err.to_string())
        }
    }
}

/// Session controller errors
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid answer: {0}")]
    Validation(String),

    #[error("{input} answers are not accepted in {mode} mode")]
    ModeMismatch {
        mode: AnalysisMode,
        input: &'static str,
    },

    #[error("Cannot {action} while session is {phase}")]
    InvalidState {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("An answer is already being submitted")]
    SubmissionInFlight,

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Session was cancelled")]
    Cancelled,

    #[error("Session controller is no longer running")]
    ControllerGone,
}

impl From<CatalogError> for SessionError {
    fn from(err: CatalogError) -> Self {
        SessionError::Catalog(err.to_string())
    }
}

/// Session persistence errors. Never surfaced past the results aggregator.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Persistence connection error: {0}")]
    Connection(String),

    #[error("Failed to publish session: {0}")]
    Publish(String),

    #[error("Failed to serialize session: {0}")]
    Serialization(#[from] serde_json::Error),
}
