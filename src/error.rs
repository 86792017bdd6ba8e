//! Error types for the collector, publisher and dashboard.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse Atom feed: {0}")]
    Feed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("arXiv unavailable for every category ({})", .failed.join(", "))]
    UpstreamUnavailable { failed: Vec<String> },

    #[error("Malformed upstream record {id}: missing {field}")]
    MalformedRecord { id: String, field: &'static str },

    #[error("Missing or invalid artifact {name}: {reason}")]
    MissingArtifact { name: String, reason: String },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        PipelineError::Json {
            path: path.into(),
            source,
        }
    }
}
