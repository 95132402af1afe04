use bytes::Bytes;
use chrono::Utc;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::config::FileNaming;
use crate::error::TransferError;

/// Sequential byte stream handed to the sender
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

// Upper bound on `-N` suffixes tried within one millisecond
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Content access capability: turns an opaque content reference into a
/// readable stream. Injected into the sender instead of looked up globally.
pub trait ContentSource: Send + Sync {
    /// Human readable name for logs and errors
    fn describe(&self) -> String;

    /// Length of the content when it is known up front
    fn size_hint(&self) -> Option<u64> {
        None
    }

    /// Open a fresh stream positioned at the start of the content
    fn open(&self) -> io::Result<ByteStream>;
}

/// A file on local storage
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn size_hint(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }

    fn open(&self) -> io::Result<ByteStream> {
        let file = std::fs::File::open(&self.path)?;
        if file.metadata()?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", self.path.display()),
            ));
        }
        Ok(Box::new(File::from_std(file)))
    }
}

/// Content already held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Bytes,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ContentSource for MemorySource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn open(&self) -> io::Result<ByteStream> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

/// Destination file of a receive
pub struct FileManager {
    file_path: PathBuf,
    file: File,
}

impl FileManager {
    /// Create the output directory if needed, then a new file whose name
    /// no earlier receive has used. Never truncates an existing file.
    pub async fn create_for_receive(output_dir: &Path, naming: &FileNaming) -> Result<Self, TransferError> {
        fs::create_dir_all(output_dir)
            .await
            .map_err(|source| TransferError::DirectoryCreate {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let millis = Utc::now().timestamp_millis();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = output_dir.join(naming.file_name(millis, attempt));

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    tracing::debug!("Destination file created: {:?}", path);
                    return Ok(Self {
                        file_path: path,
                        file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::trace!("{:?} exists, trying next name", path);
                }
                Err(e) => {
                    return Err(TransferError::Io(io::Error::new(
                        e.kind(),
                        format!("Failed to create file {:?}: {}", path, e),
                    )));
                }
            }
        }

        Err(TransferError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("No free file name in {:?}", output_dir),
        )))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Flush to disk and close; returns the final path.
    ///
    /// If flushing fails the file is incomplete and is deleted when
    /// `discard_on_error` is set.
    pub async fn finish(mut self, discard_on_error: bool) -> Result<PathBuf, TransferError> {
        let synced = match self.file.flush().await {
            Ok(()) => self.file.sync_all().await,
            Err(e) => Err(e),
        };

        match synced {
            Ok(()) => Ok(self.file_path),
            Err(e) => {
                tracing::error!("Failed to flush {:?}: {}", self.file_path, e);
                if discard_on_error {
                    self.discard().await;
                }
                Err(TransferError::Io(e))
            }
        }
    }

    /// Close and delete a file whose content is incomplete
    pub async fn discard(self) {
        let Self { file_path, file } = self;
        drop(file);

        if let Err(e) = fs::remove_file(&file_path).await {
            tracing::warn!("Failed to remove partial file {:?}: {}", file_path, e);
        } else {
            tracing::info!("Removed partial file {:?}", file_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_create_makes_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");

        let manager = FileManager::create_for_receive(&nested, &FileNaming::default())
            .await
            .unwrap();

        assert!(nested.is_dir());
        let name = manager.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("wifip2pshared-"));
        assert!(name.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let temp_dir = TempDir::new().unwrap();
        let naming = FileNaming::default();

        let mut paths = Vec::new();
        for _ in 0..5 {
            let manager = FileManager::create_for_receive(temp_dir.path(), &naming).await.unwrap();
            paths.push(manager.finish(true).await.unwrap());
        }

        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 5);
    }

    /// Manager over a read-only handle: writes are accepted by the
    /// buffered tokio file and fail once flushed
    async fn read_only_manager(dir: &TempDir) -> FileManager {
        let file_path = dir.path().join("wifip2pshared-1.jpg");
        std::fs::write(&file_path, b"").unwrap();
        let std_file = std::fs::File::open(&file_path).unwrap();

        let mut manager = FileManager {
            file_path,
            file: File::from_std(std_file),
        };
        manager.file_mut().write_all(b"partial").await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_finish_failure_discards_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = read_only_manager(&temp_dir).await;
        let path = manager.path().to_path_buf();

        let err = manager.finish(true).await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_finish_failure_keeps_file_when_asked() {
        let temp_dir = TempDir::new().unwrap();
        let manager = read_only_manager(&temp_dir).await;
        let path = manager.path().to_path_buf();

        assert!(manager.finish(false).await.is_err());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_directory_create_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = FileManager::create_for_receive(&blocker.join("sub"), &FileNaming::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransferError::DirectoryCreate { .. }));
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = FileManager::create_for_receive(temp_dir.path(), &FileNaming::default())
            .await
            .unwrap();
        let path = manager.path().to_path_buf();
        assert!(path.exists());

        manager.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.size_hint(), Some(10));

        let mut stream = source.open().unwrap();
        let mut content = Vec::new();
        stream.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_file_source_missing_and_directory() {
        let temp_dir = TempDir::new().unwrap();

        let missing = FileSource::new(temp_dir.path().join("gone.jpg"));
        assert_eq!(missing.open().err().unwrap().kind(), io::ErrorKind::NotFound);
        assert!(missing.size_hint().is_none());

        let dir = FileSource::new(temp_dir.path());
        assert!(dir.open().is_err());
    }

    #[tokio::test]
    async fn test_memory_source_reopens() {
        let source = MemorySource::new("buffer", vec![1u8, 2, 3]);
        for _ in 0..2 {
            let mut content = Vec::new();
            source.open().unwrap().read_to_end(&mut content).await.unwrap();
            assert_eq!(content, vec![1, 2, 3]);
        }
        assert_eq!(source.size_hint(), Some(3));
    }
}
