use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that end a single transfer attempt.
///
/// None of these are retried by the library; the caller decides.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Listening port unavailable (in use, permission denied)
    #[error("Failed to bind listening socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Failure while waiting for or accepting the inbound connection
    #[error("Failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// Peer did not answer within the connect timeout
    #[error("Connection to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// Peer actively refused, or no route to it
    #[error("Connection to {endpoint} refused: {source}")]
    ConnectRefused {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Host name could not be turned into a socket address
    #[error("Failed to resolve {endpoint}: {reason}")]
    AddressResolution { endpoint: String, reason: String },

    /// The content to send could not be opened
    #[error("Source not found: {what}: {source}")]
    SourceUnavailable {
        what: String,
        #[source]
        source: io::Error,
    },

    /// Destination directory could not be created
    #[error("Failed to create directory {path:?}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Read/write failure during the copy, or while creating the output file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cancelled through the transfer's cancellation token
    #[error("Transfer cancelled")]
    Cancelled,
}

/// Tag carried by a failed `TransferResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferErrorKind {
    Bind,
    Accept,
    ConnectTimeout,
    ConnectRefused,
    AddressResolution,
    SourceUnavailable,
    DirectoryCreate,
    Io,
    Cancelled,
}

impl TransferError {
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            TransferError::Bind { .. } => TransferErrorKind::Bind,
            TransferError::Accept(_) => TransferErrorKind::Accept,
            TransferError::ConnectTimeout { .. } => TransferErrorKind::ConnectTimeout,
            TransferError::ConnectRefused { .. } => TransferErrorKind::ConnectRefused,
            TransferError::AddressResolution { .. } => TransferErrorKind::AddressResolution,
            TransferError::SourceUnavailable { .. } => TransferErrorKind::SourceUnavailable,
            TransferError::DirectoryCreate { .. } => TransferErrorKind::DirectoryCreate,
            TransferError::Io(_) => TransferErrorKind::Io,
            TransferError::Cancelled => TransferErrorKind::Cancelled,
        }
    }

    /// Whether the error happened before any byte could move
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self.kind(),
            TransferErrorKind::Bind
                | TransferErrorKind::ConnectTimeout
                | TransferErrorKind::ConnectRefused
                | TransferErrorKind::AddressResolution
        )
    }
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferErrorKind::Bind => "bind",
            TransferErrorKind::Accept => "accept",
            TransferErrorKind::ConnectTimeout => "connect_timeout",
            TransferErrorKind::ConnectRefused => "connect_refused",
            TransferErrorKind::AddressResolution => "address_resolution",
            TransferErrorKind::SourceUnavailable => "source_unavailable",
            TransferErrorKind::DirectoryCreate => "directory_create",
            TransferErrorKind::Io => "io",
            TransferErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
