//! Error types for the storage and remote API boundaries.

use thiserror::Error;

/// Errors raised by the durable record store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("store error: {0}")]
    SledError(#[from] sled::Error),

    #[error("record serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Errors surfaced by the picker API surface.
///
/// Validation rejections from the selection rules are deliberately not here;
/// a denied toggle is an advisory, not an error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("remote returned {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("another knowledge base operation is already in flight")]
    OperationInFlight,

    #[error("selection is empty")]
    EmptySelection,

    #[error("operation requires exactly one selected resource, found {0}")]
    SelectionNotSingular(usize),

    #[error("operation requires the view to be scoped to one knowledge base")]
    ScopeRequired,

    #[error("operation is only available in the all-files view")]
    ScopeForbidden,

    #[error("no path known for resource {0}")]
    UnknownResourcePath(String),

    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),
}
