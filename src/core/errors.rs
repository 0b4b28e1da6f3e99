//! BP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, BpError>;

/// Top-level error type for bambu-progress.
#[derive(Debug, Error)]
pub enum BpError {
    #[error("[BP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[BP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[BP-1004] missing printer credential: set {name}")]
    MissingCredential { name: &'static str },

    #[error("[BP-2001] failed to start {program}: {source}")]
    SourceSpawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("[BP-2002] telemetry source closed: {details}")]
    SourceClosed { details: String },

    #[error("[BP-2003] report parse failure: {details}")]
    ReportParse { details: String },

    #[error("[BP-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[BP-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[BP-3002] terminal failure: {source}")]
    Terminal {
        #[source]
        source: std::io::Error,
    },

    #[error("[BP-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[BP-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl BpError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BP-1001",
            Self::MissingConfig { .. } => "BP-1002",
            Self::ConfigParse { .. } => "BP-1003",
            Self::MissingCredential { .. } => "BP-1004",
            Self::SourceSpawn { .. } => "BP-2001",
            Self::SourceClosed { .. } => "BP-2002",
            Self::ReportParse { .. } => "BP-2003",
            Self::Serialization { .. } => "BP-2101",
            Self::Io { .. } => "BP-3001",
            Self::Terminal { .. } => "BP-3002",
            Self::ChannelClosed { .. } => "BP-3003",
            Self::Runtime { .. } => "BP-3900",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for BpError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for BpError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for BpError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
