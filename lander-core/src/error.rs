//! Error types for lander-core
//!
//! None of these ever escape to a hosting page: the tracker logs and
//! degrades. They exist so the storage and selector seams can report what
//! went wrong to the caller that chooses to look.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a durable key/value storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage is unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt storage contents: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors from parsing an attribute selector
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Selector must be of the form [attr] or [attr=value], got {0:?}")]
    Malformed(String),

    #[error("Selector has an empty attribute name")]
    EmptyAttribute,
}

/// Errors from reading a config overrides file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
