use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Progress of a running copy
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub bytes_transferred: u64,
    /// Known only on the sending side, and only for sized sources
    pub total_bytes: Option<u64>,
    pub average_speed_mbps: f64,
}

impl ProgressInfo {
    pub fn new(bytes_transferred: u64, total_bytes: Option<u64>, started: Instant) -> Self {
        let secs = started.elapsed().as_secs_f64();
        let average_speed_mbps = if secs > 0.0 {
            (bytes_transferred as f64 * 8.0) / (secs * 1_000_000.0)
        } else {
            0.0
        };

        Self {
            bytes_transferred,
            total_bytes,
            average_speed_mbps,
        }
    }

    pub fn percentage(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(100.0),
            Some(total) => Some(self.bytes_transferred as f64 * 100.0 / total as f64),
            None => None,
        }
    }
}

/// Callback for progress updates
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Status transitions of a transfer, in the order they happen
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// Receiver is about to wait for a peer / sender is about to connect
    OpeningSocket { receiver: bool },
    /// Receiver is listening
    SocketOpened { local_addr: SocketAddr },
    /// A peer connection exists
    Connected { peer: SocketAddr, receiver: bool },
    Progress(ProgressInfo),
    /// Receiver finished writing the destination file
    FileCopied { path: PathBuf, bytes: u64 },
    /// Sender finished writing the source into the socket
    DataWritten { bytes: u64 },
    Failed { error: String },
}

/// Callback for transfer events
pub type EventCallback = Arc<dyn Fn(TransferEvent) + Send + Sync>;

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferEvent::OpeningSocket { receiver: true } => write!(f, "Opening a server socket"),
            TransferEvent::OpeningSocket { receiver: false } => write!(f, "Opening client socket"),
            TransferEvent::SocketOpened { local_addr } => {
                write!(f, "Server: Socket opened on {}", local_addr)
            }
            TransferEvent::Connected { peer, receiver: true } => {
                write!(f, "Server: connection done ({})", peer)
            }
            TransferEvent::Connected { peer, receiver: false } => {
                write!(f, "Client socket - connected to {}", peer)
            }
            TransferEvent::Progress(info) => match info.percentage() {
                Some(pct) => write!(f, "{} bytes ({:.1}%)", info.bytes_transferred, pct),
                None => write!(f, "{} bytes", info.bytes_transferred),
            },
            TransferEvent::FileCopied { path, .. } => {
                write!(f, "File copied - {}", path.display())
            }
            TransferEvent::DataWritten { bytes } => write!(f, "Client: Data written ({} bytes)", bytes),
            TransferEvent::Failed { error } => write!(f, "Transfer failed: {}", error),
        }
    }
}

/// What a running transfer reports to, and is stopped by.
///
/// Cloning shares the cancellation token.
#[derive(Clone, Default)]
pub struct TransferContext {
    events: Option<EventCallback>,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl TransferContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, callback: EventCallback) -> Self {
        self.events = Some(callback);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn emit(&self, event: TransferEvent) {
        tracing::debug!("{}", event);
        if let Some(callback) = &self.events {
            callback(event);
        }
    }

    pub(crate) fn report_progress(&self, info: ProgressInfo) {
        if let Some(callback) = &self.progress {
            callback(info.clone());
        }
        if self.events.is_some() {
            self.emit(TransferEvent::Progress(info));
        }
    }
}

impl fmt::Debug for TransferContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferContext")
            .field("events", &self.events.is_some())
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_status_strings() {
        assert_eq!(
            TransferEvent::OpeningSocket { receiver: true }.to_string(),
            "Opening a server socket"
        );
        assert_eq!(
            TransferEvent::FileCopied {
                path: PathBuf::from("/sdcard/x/wifip2pshared-1.jpg"),
                bytes: 3,
            }
            .to_string(),
            "File copied - /sdcard/x/wifip2pshared-1.jpg"
        );
        assert!(TransferEvent::DataWritten { bytes: 10 }
            .to_string()
            .starts_with("Client: Data written"));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_percentage() {
        let info = ProgressInfo {
            bytes_transferred: 512,
            total_bytes: Some(1024),
            average_speed_mbps: 0.0,
        };
        assert_eq!(info.percentage(), Some(50.0));

        let empty = ProgressInfo {
            bytes_transferred: 0,
            total_bytes: Some(0),
            average_speed_mbps: 0.0,
        };
        assert_eq!(empty.percentage(), Some(100.0));

        let unknown = ProgressInfo::new(10, None, Instant::now());
        assert!(unknown.percentage().is_none());
    }

    #[test]
    fn test_context_delivers_events_and_progress() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let ticks = Arc::new(Mutex::new(0u32));

        let events_clone = events.clone();
        let ticks_clone = ticks.clone();
        let ctx = TransferContext::new()
            .with_events(Arc::new(move |e: TransferEvent| events_clone.lock().push(e.to_string())))
            .with_progress(Arc::new(move |_: ProgressInfo| *ticks_clone.lock() += 1));

        ctx.emit(TransferEvent::DataWritten { bytes: 1 });
        ctx.report_progress(ProgressInfo::new(1, Some(1), Instant::now()));

        assert_eq!(*ticks.lock(), 1);
        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], "1 bytes (100.0%)");
    }

    #[test]
    fn test_clone_shares_cancellation() {
        let ctx = TransferContext::new();
        let clone = ctx.clone();
        clone.cancellation().cancel();
        assert!(ctx.is_cancelled());
    }
}
