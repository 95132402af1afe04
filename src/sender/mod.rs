use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpSocket, TcpStream};
use uuid::Uuid;

use crate::buffer::ChunkCopier;
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::file::ContentSource;
use crate::progress::{TransferContext, TransferEvent};
use crate::protocol::TransferEndpoint;
use crate::state::{TransferResult, TransferRole};

/// Client side of a transfer: pushes one byte stream to the group owner
/// over a fresh connection, then closes it.
pub struct Sender {
    endpoint: TransferEndpoint,
    connect_timeout: Duration,
    chunk_size: usize,
    transfer_id: Uuid,
}

impl Sender {
    pub fn new(endpoint: TransferEndpoint, config: &TransferConfig) -> Self {
        Self {
            endpoint,
            connect_timeout: config.connect_timeout,
            chunk_size: config.chunk_size,
            transfer_id: Uuid::new_v4(),
        }
    }

    pub fn endpoint(&self) -> &TransferEndpoint {
        &self.endpoint
    }

    pub fn transfer_id(&self) -> Uuid {
        self.transfer_id
    }

    /// Send the whole of `source`.
    ///
    /// The source is opened before any connection attempt. The socket is
    /// closed on every path out of this function.
    pub async fn send(self, source: &dyn ContentSource, ctx: &TransferContext) -> TransferResult {
        let started = Instant::now();

        match self.run(source, ctx).await {
            Ok(bytes) => {
                tracing::info!(
                    "Transfer {} complete: {} bytes to {} in {:?}",
                    self.transfer_id,
                    bytes,
                    self.endpoint,
                    started.elapsed()
                );
                ctx.emit(TransferEvent::DataWritten { bytes });
                TransferResult::completed(
                    self.transfer_id,
                    TransferRole::Sender,
                    None,
                    bytes,
                    None,
                    started.elapsed(),
                )
            }
            Err(e) => {
                tracing::error!("Transfer {} to {} failed: {}", self.transfer_id, self.endpoint, e);
                ctx.emit(TransferEvent::Failed { error: e.to_string() });
                TransferResult::failure(self.transfer_id, TransferRole::Sender, &e, started.elapsed())
            }
        }
    }

    async fn run(&self, source: &dyn ContentSource, ctx: &TransferContext) -> Result<u64, TransferError> {
        let mut reader = source.open().map_err(|e| TransferError::SourceUnavailable {
            what: source.describe(),
            source: e,
        })?;

        tracing::info!("Sending {} to {}", source.describe(), self.endpoint);
        ctx.emit(TransferEvent::OpeningSocket { receiver: false });

        let mut stream = self.connect(ctx).await?;
        let peer = stream.peer_addr()?;
        ctx.emit(TransferEvent::Connected {
            peer,
            receiver: false,
        });

        let outcome = ChunkCopier::new(self.chunk_size, ctx)
            .with_total(source.size_hint())
            .copy(&mut reader, &mut stream)
            .await?;

        // FIN marks end of file for the receiver
        stream.shutdown().await?;
        tracing::debug!("Client: data written, write half closed");

        Ok(outcome.bytes)
    }

    /// Connect from an ephemeral local port, trying every resolved address
    /// until one answers. The timeout covers all attempts together.
    async fn connect(&self, ctx: &TransferContext) -> Result<TcpStream, TransferError> {
        let addrs = self.endpoint.resolve().await?;
        let deadline = tokio::time::Instant::now() + self.connect_timeout;
        let cancel = ctx.cancellation().clone();
        let mut last_error = None;

        for addr in addrs {
            let socket = bind_ephemeral(addr)?;
            tracing::debug!("Opening client socket to {}", addr);

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                attempt = tokio::time::timeout_at(deadline, socket.connect(addr)) => attempt,
            };

            match attempt {
                Ok(Ok(stream)) => {
                    tracing::info!("Client socket connected to {}", addr);
                    return Ok(stream);
                }
                Ok(Err(e)) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    return Err(TransferError::ConnectTimeout {
                        endpoint: self.endpoint.to_string(),
                        timeout: self.connect_timeout,
                    });
                }
            }
        }

        let source = last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address to connect to"));

        Err(TransferError::ConnectRefused {
            endpoint: self.endpoint.to_string(),
            source,
        })
    }
}

fn bind_ephemeral(peer: SocketAddr) -> io::Result<TcpSocket> {
    let (socket, local) = match peer {
        SocketAddr::V4(_) => (TcpSocket::new_v4()?, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))),
        SocketAddr::V6(_) => (TcpSocket::new_v6()?, SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))),
    };
    socket.bind(local)?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use crate::buffer::tests::MockReader;
    use crate::error::TransferErrorKind;
    use crate::file::{ByteStream, FileSource, MemorySource};

    struct MockSource {
        data: Vec<u8>,
        fail_at_end: bool,
        opens: AtomicUsize,
        drops: Arc<AtomicUsize>,
    }

    impl MockSource {
        fn new(data: Vec<u8>, fail_at_end: bool) -> Self {
            Self {
                data,
                fail_at_end,
                opens: AtomicUsize::new(0),
                drops: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ContentSource for MockSource {
        fn describe(&self) -> String {
            "mock".to_string()
        }

        fn open(&self) -> io::Result<ByteStream> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockReader {
                data: self.data.clone(),
                pos: 0,
                fail_at_end: self.fail_at_end,
                drops: self.drops.clone(),
            }))
        }
    }

    async fn listener() -> (TcpListener, TransferEndpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = TransferEndpoint::from(listener.local_addr().unwrap());
        (listener, endpoint)
    }

    fn config(timeout_ms: u64) -> TransferConfig {
        TransferConfig {
            connect_timeout: Duration::from_millis(timeout_ms),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_releases_source_and_socket() {
        let (listener, endpoint) = listener().await;
        let payload: Vec<u8> = (0..4096u32).map(|i| (i * 7) as u8).collect();
        let source = MockSource::new(payload.clone(), false);

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let result = Sender::new(endpoint, &config(5000))
            .send(&source, &TransferContext::new())
            .await;

        assert!(result.success(), "{:?}", result.error_detail());
        assert_eq!(result.bytes_transferred(), 4096);
        assert!(result.destination_path().is_none());
        assert_eq!(server.await.unwrap(), payload);
        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
        assert_eq!(source.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_source_failure_mid_copy_closes_socket() {
        let (listener, endpoint) = listener().await;
        let source = MockSource::new(vec![1u8; 100], true);

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            // EOF or reset, either way the read must end
            let _ = stream.read_to_end(&mut received).await;
        });

        let result = Sender::new(endpoint, &config(5000))
            .send(&source, &TransferContext::new())
            .await;

        assert_eq!(result.error_kind(), Some(TransferErrorKind::Io));
        assert_eq!(source.drops.load(Ordering::SeqCst), 1);
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("peer must observe the closed socket")
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_source_never_connects() {
        let (listener, endpoint) = listener().await;
        let temp_dir = tempfile::TempDir::new().unwrap();
        let source = FileSource::new(temp_dir.path().join("deleted.jpg"));

        let result = Sender::new(endpoint, &config(5000))
            .send(&source, &TransferContext::new())
            .await;

        assert_eq!(result.error_kind(), Some(TransferErrorKind::SourceUnavailable));
        assert!(result.error_detail().unwrap().starts_with("Source not found"));

        let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(accepted.is_err(), "no connection expected");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, endpoint) = listener().await;
        drop(listener);
        let source = MockSource::new(vec![1, 2, 3], false);

        let started = Instant::now();
        let result = Sender::new(endpoint, &config(5000))
            .send(&source, &TransferContext::new())
            .await;

        assert_eq!(result.error_kind(), Some(TransferErrorKind::ConnectRefused));
        assert!(started.elapsed() < Duration::from_millis(5500));
        assert_eq!(source.drops.load(Ordering::SeqCst), 1);
    }

    /// Loopback listener that never accepts, with its backlog already full
    /// so further SYNs go unanswered
    async fn saturated_listener() -> (TcpListener, Vec<TcpStream>, TransferEndpoint) {
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut held = Vec::new();
        for _ in 0..16 {
            match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => held.push(stream),
                _ => break,
            }
        }
        (listener, held, TransferEndpoint::from(addr))
    }

    #[tokio::test]
    async fn test_connect_is_bounded_by_timeout() {
        let (_listener, _held, endpoint) = saturated_listener().await;
        let source = MockSource::new(vec![0u8; 8], false);

        let started = Instant::now();
        let result = Sender::new(endpoint, &config(300))
            .send(&source, &TransferContext::new())
            .await;

        assert_eq!(result.error_kind(), Some(TransferErrorKind::ConnectTimeout));
        assert!(result.error_detail().unwrap().contains("timed out"));
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_millis(300 + 500));
        assert_eq!(source.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_connect() {
        let (_listener, _held, endpoint) = saturated_listener().await;
        let source = MemorySource::new("payload", vec![0u8; 8]);
        let ctx = TransferContext::new();
        ctx.cancellation().cancel();

        let result = Sender::new(endpoint, &config(5000)).send(&source, &ctx).await;
        assert_eq!(result.error_kind(), Some(TransferErrorKind::Cancelled));
    }
}
