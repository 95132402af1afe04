use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Instant;
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::buffer::{ChunkCopier, CopyOutcome};
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::file::FileManager;
use crate::progress::{TransferContext, TransferEvent};
use crate::state::{TransferResult, TransferRole};

/// Listening side of a transfer (the group owner).
///
/// Accepts exactly one connection and writes its whole byte stream to a
/// new file. `receive` consumes the receiver, so the listening socket is
/// closed once it returns; a new transfer needs a new `Receiver`.
pub struct Receiver {
    listener: TcpListener,
    config: TransferConfig,
    transfer_id: Uuid,
}

impl Receiver {
    /// Bind `0.0.0.0:<config.port>`. Fails with `Bind` while another
    /// receiver holds the port.
    pub async fn bind(config: TransferConfig) -> Result<Self, TransferError> {
        Self::bind_with_id(config, Uuid::new_v4()).await
    }

    pub(crate) async fn bind_with_id(config: TransferConfig, transfer_id: Uuid) -> Result<Self, TransferError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransferError::Bind {
                port: config.port,
                source,
            })?;

        tracing::info!(
            "Receiver {} socket bound to {}",
            transfer_id,
            listener.local_addr().unwrap_or(addr)
        );

        Ok(Self {
            listener,
            config,
            transfer_id,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn transfer_id(&self) -> Uuid {
        self.transfer_id
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.config.output_dir
    }

    /// Wait for one peer, store its payload, report the outcome.
    ///
    /// Waits for the peer with no timeout; only the context's cancellation
    /// token ends the wait early.
    pub async fn receive(self, ctx: &TransferContext) -> TransferResult {
        let started = Instant::now();
        let transfer_id = self.transfer_id;

        match self.run(ctx).await {
            Ok((path, outcome)) => {
                tracing::info!(
                    "Transfer {} complete: {} bytes -> {:?} in {:?}",
                    transfer_id,
                    outcome.bytes,
                    path,
                    started.elapsed()
                );
                ctx.emit(TransferEvent::FileCopied {
                    path: path.clone(),
                    bytes: outcome.bytes,
                });
                TransferResult::completed(
                    transfer_id,
                    TransferRole::Receiver,
                    Some(path),
                    outcome.bytes,
                    outcome.sha256,
                    started.elapsed(),
                )
            }
            Err(e) => {
                tracing::error!("Transfer {} failed: {}", transfer_id, e);
                ctx.emit(TransferEvent::Failed { error: e.to_string() });
                TransferResult::failure(transfer_id, TransferRole::Receiver, &e, started.elapsed())
            }
        }
    }

    async fn run(self, ctx: &TransferContext) -> Result<(PathBuf, CopyOutcome), TransferError> {
        let Self {
            listener, config, ..
        } = self;

        ctx.emit(TransferEvent::OpeningSocket { receiver: true });
        ctx.emit(TransferEvent::SocketOpened {
            local_addr: listener.local_addr()?,
        });
        tracing::info!("Waiting for incoming transfer...");

        let cancel = ctx.cancellation().clone();
        let (mut stream, peer) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            accepted = listener.accept() => accepted.map_err(TransferError::Accept)?,
        };

        // One connection per invocation
        drop(listener);

        tracing::info!("Connection from {}", peer);
        ctx.emit(TransferEvent::Connected {
            peer,
            receiver: true,
        });

        let mut destination = FileManager::create_for_receive(&config.output_dir, &config.naming).await?;
        tracing::info!("Copying into {:?}", destination.path());

        let copied = ChunkCopier::new(config.chunk_size, ctx)
            .with_digest()
            .copy(&mut stream, destination.file_mut())
            .await;
        drop(stream);

        let outcome = match copied {
            Ok(outcome) => outcome,
            Err(e) => {
                if config.remove_partial {
                    destination.discard().await;
                }
                return Err(e);
            }
        };

        let path = destination.finish(config.remove_partial).await?;
        let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);

        Ok((path, outcome))
    }
}
