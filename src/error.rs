use std::path::PathBuf;

use snafu::Snafu;

/// Errors surfaced by editing operations. Every operation recovers at its
/// own boundary; nothing here propagates past the edit session.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EditorError {
    #[snafu(display("invalid input: {message}"))]
    Validation { message: String },

    #[snafu(display("{what} not found"))]
    ResourceNotFound { what: String },

    #[snafu(display("failed to {stage} {path:?}: {source}"))]
    Persistence {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("malformed book record {path:?}: {message}"))]
    Format { path: PathBuf, message: String },
}

impl EditorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::ResourceNotFound { what: what.into() }
    }
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
