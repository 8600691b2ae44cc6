//! Error types for documents and settings

use seq_model::TreeError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur while loading, building or saving sequences
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File extension is not one of `.yaml`, `.yml` or `.json`
    #[error("unsupported document format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No factory registered for a discriminator
    #[error("unknown {role} type '{kind}'")]
    UnknownKind { role: &'static str, kind: String },

    /// Parameters did not match what the factory expects
    #[error("invalid parameters for '{kind}': {reason}")]
    InvalidParams { kind: String, reason: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Result type for settings operations
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors that can occur while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment override could not be parsed
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
