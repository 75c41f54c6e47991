use std::path::PathBuf;

use thiserror::Error;

use crate::app::object_store::Key;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database is at version {stored}, cannot open it as older version {requested}")]
    VersionMismatch { stored: u32, requested: u32 },

    #[error("Object store '{0}' does not exist")]
    UnknownStore(String),

    #[error("Invalid object store name '{0}'")]
    InvalidStoreName(String),

    #[error("Object store '{0}' is not part of this transaction")]
    NotInScope(String),

    #[error("Transaction is read-only, cannot write to '{0}'")]
    ReadOnly(String),

    #[error("Key {key} already exists in '{store}'")]
    Constraint { store: String, key: Key },

    #[error("Key {key} not found in '{store}'")]
    NotFound { store: String, key: Key },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Connection lock poisoned")]
    Poisoned,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
