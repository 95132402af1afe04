use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{TransferError, TransferErrorKind};

/// Which side of the transfer produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferRole {
    Receiver,
    Sender,
}

/// Outcome of exactly one transfer attempt.
///
/// Built once when the attempt ends and never changed afterwards.
/// `success()` is true iff `error_kind()` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    transfer_id: Uuid,
    role: TransferRole,
    success: bool,
    destination_path: Option<PathBuf>,
    bytes_transferred: u64,
    sha256: Option<String>,
    error_kind: Option<TransferErrorKind>,
    error_detail: Option<String>,
    elapsed_ms: u64,
    finished_at: DateTime<Utc>,
}

impl TransferResult {
    pub(crate) fn completed(
        transfer_id: Uuid,
        role: TransferRole,
        destination_path: Option<PathBuf>,
        bytes_transferred: u64,
        sha256: Option<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            transfer_id,
            role,
            success: true,
            destination_path,
            bytes_transferred,
            sha256,
            error_kind: None,
            error_detail: None,
            elapsed_ms: elapsed.as_millis() as u64,
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn failure(
        transfer_id: Uuid,
        role: TransferRole,
        error: &TransferError,
        elapsed: Duration,
    ) -> Self {
        Self::failure_with(transfer_id, role, error.kind(), error.to_string(), elapsed)
    }

    pub(crate) fn failure_with(
        transfer_id: Uuid,
        role: TransferRole,
        kind: TransferErrorKind,
        detail: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            transfer_id,
            role,
            success: false,
            destination_path: None,
            bytes_transferred: 0,
            sha256: None,
            error_kind: Some(kind),
            error_detail: Some(detail),
            elapsed_ms: elapsed.as_millis() as u64,
            finished_at: Utc::now(),
        }
    }

    pub fn transfer_id(&self) -> Uuid {
        self.transfer_id
    }

    pub fn role(&self) -> TransferRole {
        self.role
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Where the receiver stored the payload
    pub fn destination_path(&self) -> Option<&Path> {
        self.destination_path.as_deref()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Hex SHA-256 of the received payload (receiver only)
    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    pub fn error_kind(&self) -> Option<TransferErrorKind> {
        self.error_kind
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Short line for the user
    pub fn summary(&self) -> String {
        match (self.success, self.role, &self.destination_path) {
            (true, TransferRole::Receiver, Some(path)) => format!("File copied - {}", path.display()),
            (true, _, _) => format!("Transfer complete ({} bytes)", self.bytes_transferred),
            (false, _, _) => format!(
                "Transfer failed ({}): {}",
                self.error_kind.map(|k| k.to_string()).unwrap_or_default(),
                self.error_detail.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
