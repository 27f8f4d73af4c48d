//! SOL-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SolError>;

/// Top-level error type for the outliner core.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("[SOL-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SOL-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SOL-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SOL-2001] payload is not a readable response: {details}")]
    Payload { details: String },

    #[error("[SOL-2002] render failure in {node}: {details}")]
    Render { node: &'static str, details: String },

    #[error("[SOL-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SOL-3001] evaluation collaborator failed: {details}")]
    Collaborator { details: String },

    #[error("[SOL-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SOL-3003] unknown outliner {id}")]
    UnknownOutliner { id: u64 },

    #[error("[SOL-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SolError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SOL-1001",
            Self::MissingConfig { .. } => "SOL-1002",
            Self::ConfigParse { .. } => "SOL-1003",
            Self::Payload { .. } => "SOL-2001",
            Self::Render { .. } => "SOL-2002",
            Self::Serialization { .. } => "SOL-2101",
            Self::Collaborator { .. } => "SOL-3001",
            Self::Io { .. } => "SOL-3002",
            Self::UnknownOutliner { .. } => "SOL-3003",
            Self::Runtime { .. } => "SOL-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Collaborator { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for evaluation collaborator failures.
    #[must_use]
    pub fn collaborator(details: impl Into<String>) -> Self {
        Self::Collaborator {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for SolError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SolError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<regex::Error> for SolError {
    fn from(value: regex::Error) -> Self {
        Self::Runtime {
            details: format!("regex: {value}"),
        }
    }
}
