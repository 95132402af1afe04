use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::constants::*;

/// How received files are named inside the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNaming {
    pub prefix: String,
    pub extension: String,
}

impl Default for FileNaming {
    fn default() -> Self {
        Self {
            prefix: FILE_PREFIX.to_string(),
            extension: FILE_EXTENSION.to_string(),
        }
    }
}

impl FileNaming {
    /// `<prefix><millis>[-<n>].<extension>`; `attempt` 0 has no suffix.
    pub fn file_name(&self, millis: i64, attempt: u32) -> String {
        let stem = if attempt == 0 {
            format!("{}{}", self.prefix, millis)
        } else {
            format!("{}{}-{}", self.prefix, millis, attempt)
        };

        if self.extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, self.extension)
        }
    }
}

/// Settings shared by the receiving and the sending side
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Listening port (receiver) / default target port (sender)
    pub port: u16,
    /// Copy loop chunk size in bytes
    pub chunk_size: usize,
    /// Upper bound for the outbound connect
    pub connect_timeout: Duration,
    /// Where the receiver writes files
    pub output_dir: PathBuf,
    /// Destination file naming
    pub naming: FileNaming,
    /// Remove the destination file when a receive fails after creating it
    pub remove_partial: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            chunk_size: CHUNK_SIZE,
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
            output_dir: default_output_dir(),
            naming: FileNaming::default(),
            remove_partial: true,
        }
    }
}

/// The user's download directory, or `./received`
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from(FALLBACK_OUTPUT_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.port, 8988);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.connect_timeout, Duration::from_millis(5000));
        assert!(config.remove_partial);
        assert_eq!(config.naming.prefix, "wifip2pshared-");
    }

    #[test]
    fn test_file_name() {
        let naming = FileNaming::default();
        assert_eq!(naming.file_name(1700000000123, 0), "wifip2pshared-1700000000123.jpg");
        assert_eq!(naming.file_name(1700000000123, 2), "wifip2pshared-1700000000123-2.jpg");

        let bare = FileNaming {
            prefix: "rx-".to_string(),
            extension: String::new(),
        };
        assert_eq!(bare.file_name(5, 0), "rx-5");
    }
}
