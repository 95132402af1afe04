use sha2::{Digest, Sha256};
use std::io;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransferError;
use crate::progress::{ProgressInfo, TransferContext};
use crate::protocol::constants::PROGRESS_EVERY_CHUNKS;

/// What a finished copy moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub bytes: u64,
    /// Hex SHA-256 of everything copied, if requested
    pub sha256: Option<String>,
}

/// Fixed-size chunk copier shared by both transfer directions.
///
/// Reads up to `chunk_size` bytes, writes them fully, repeats until a
/// zero-length read. Order is preserved; nothing is framed.
pub struct ChunkCopier<'a> {
    chunk_size: usize,
    total_bytes: Option<u64>,
    hasher: Option<Sha256>,
    ctx: &'a TransferContext,
}

impl<'a> ChunkCopier<'a> {
    pub fn new(chunk_size: usize, ctx: &'a TransferContext) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            total_bytes: None,
            hasher: None,
            ctx,
        }
    }

    /// Expected length, used only for progress percentages
    pub fn with_total(mut self, total_bytes: Option<u64>) -> Self {
        self.total_bytes = total_bytes;
        self
    }

    /// Hash the payload while copying
    pub fn with_digest(mut self) -> Self {
        self.hasher = Some(Sha256::new());
        self
    }

    pub async fn copy<R, W>(mut self, reader: &mut R, writer: &mut W) -> Result<CopyOutcome, TransferError>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let cancel = self.ctx.cancellation().clone();
        let started = Instant::now();
        let mut buf = vec![0u8; self.chunk_size];
        let mut bytes = 0u64;
        let mut chunks = 0u64;

        loop {
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                read = reader.read(&mut buf) => read.map_err(|e| with_context(e, "read"))?,
            };

            if n == 0 {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                written = writer.write_all(&buf[..n]) => written.map_err(|e| with_context(e, "write"))?,
            }

            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(&buf[..n]);
            }

            bytes += n as u64;
            chunks += 1;
            tracing::trace!("Chunk #{} copied ({} bytes, {} total)", chunks, n, bytes);

            if chunks % PROGRESS_EVERY_CHUNKS == 0 {
                self.ctx
                    .report_progress(ProgressInfo::new(bytes, self.total_bytes, started));
            }
        }

        writer.flush().await.map_err(|e| with_context(e, "flush"))?;
        self.ctx
            .report_progress(ProgressInfo::new(bytes, self.total_bytes, started));

        Ok(CopyOutcome {
            bytes,
            sha256: self.hasher.map(|h| hex::encode(h.finalize())),
        })
    }
}

fn with_context(err: io::Error, op: &str) -> io::Error {
    io::Error::new(err.kind(), format!("{} failed: {}", op, err))
}
