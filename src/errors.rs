//! Typed error hierarchy for narrate.
//!
//! Three top-level enums cover the three places an edit can fail:
//! - `TrackerError`: reading the edited file
//! - `RevisionError`: committed-revision lookups (always recovered by callers)
//! - `InferenceError`: talking to the model endpoint
//!
//! Unparseable stream lines are not errors; see `inference::StreamLine::Unparsed`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from turning a watch event into tracker input.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the committed-revision collaborator.
#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("No git repository found at or above {0}")]
    RepositoryNotFound(PathBuf),

    #[error("Committed content of {path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

/// Errors from the streaming inference client.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model endpoint returned HTTP {status}")]
    UpstreamHttp { status: u16 },

    #[error("Invalid model endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Request to model endpoint failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl InferenceError {
    /// Status code for upstream HTTP failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            InferenceError::UpstreamHttp { status } => Some(*status),
            _ => None,
        }
    }

    /// A hint printed next to the error so the user knows what to check.
    pub fn hint(&self) -> &'static str {
        match self {
            InferenceError::UpstreamHttp { status: 404 } => {
                "is the model pulled on the server? (e.g. `ollama pull <model>`)"
            }
            InferenceError::UpstreamHttp { .. } => "check the model server logs",
            InferenceError::InvalidEndpoint { .. } => "set [model] endpoint in narrate.toml",
            InferenceError::Request(_) => "is the model server running?",
        }
    }
}
