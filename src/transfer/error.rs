//! Error types for the transfer engine and registry.
//!
//! This module defines structured errors for every transfer operation,
//! carrying the URL, path or identifier needed to act on them.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::registry::TransferId;

/// Boxed source error for transport failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur while resolving, streaming or tracking a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Malformed or missing required input (empty directory, bad URL, ...).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input.
        reason: String,
    },

    /// The URL is not an absolute `http`/`https` URL.
    #[error("the '{scheme}' scheme is not supported: {url}")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
        /// The scheme that was found (empty when the URL had none).
        scheme: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level failure (DNS, connection reset, body read, ...).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying error.
        #[source]
        source: BoxError,
    },

    /// Filesystem failure writing, renaming or creating a path.
    #[error("storage error at {path}: {source}")]
    Storage {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Cancellation was observed before the transfer finished.
    #[error("transfer of {url} was cancelled")]
    Cancelled {
        /// The URL whose transfer was cancelled.
        url: String,
    },

    /// No in-flight transfer is registered under the identifier.
    #[error("no active transfer found with ID: {id}")]
    NotFound {
        /// The unknown identifier.
        id: TransferId,
    },

    /// A freshly generated identifier was already registered.
    #[error("transfer ID {id} is already registered")]
    RegistrationConflict {
        /// The colliding identifier.
        id: TransferId,
    },

    /// The transfer task ended without producing an outcome (panic or abort).
    #[error("transfer task {id} aborted: {reason}")]
    TaskAborted {
        /// The transfer whose task died.
        id: TransferId,
        /// Join error description.
        reason: String,
    },
}

/// Coarse classification of [`TransferError`] for callers that only need
/// the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferErrorKind {
    InvalidArgument,
    UnsupportedScheme,
    Transport,
    Storage,
    Cancelled,
    NotFound,
    RegistrationConflict,
    TaskAborted,
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::Transport => "transport",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
            Self::NotFound => "not_found",
            Self::RegistrationConflict => "registration_conflict",
            Self::TaskAborted => "task_aborted",
        };
        write!(f, "{label}")
    }
}

impl TransferError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates an unsupported-scheme error.
    pub fn unsupported_scheme(url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            url: url.into(),
            scheme: scheme.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a network error from any underlying error.
    pub fn network(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(id: TransferId) -> Self {
        Self::NotFound { id }
    }

    /// Returns the failure category.
    #[must_use]
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            Self::InvalidArgument { .. } => TransferErrorKind::InvalidArgument,
            Self::UnsupportedScheme { .. } => TransferErrorKind::UnsupportedScheme,
            Self::HttpStatus { .. } | Self::Network { .. } => TransferErrorKind::Transport,
            Self::Storage { .. } => TransferErrorKind::Storage,
            Self::Cancelled { .. } => TransferErrorKind::Cancelled,
            Self::NotFound { .. } => TransferErrorKind::NotFound,
            Self::RegistrationConflict { .. } => TransferErrorKind::RegistrationConflict,
            Self::TaskAborted { .. } => TransferErrorKind::TaskAborted,
        }
    }

    /// Returns the HTTP status for status failures.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error is the cooperative-cancellation outcome.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the
// URL or path the source error lacks, so callers go through the helpers.
