//! WiFi Direct file transfer core (lib.rs)
//!
//! One-shot transfer of a single file from a client device to the group
//! owner over a bare TCP byte stream. The group owner runs a [`Receiver`]
//! that accepts one connection and stores its payload; the client runs a
//! [`Sender`] that connects with a bounded timeout and streams the file.

#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod file;
pub mod progress;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod state;
pub mod task;

// Re-export main types
pub use config::{FileNaming, TransferConfig};
pub use error::{TransferError, TransferErrorKind};
pub use file::{ByteStream, ContentSource, FileSource, MemorySource};
pub use progress::{EventCallback, ProgressCallback, ProgressInfo, TransferContext, TransferEvent};
pub use protocol::constants::*;
pub use protocol::TransferEndpoint;
pub use receiver::Receiver;
pub use sender::Sender;
pub use state::{TransferResult, TransferRole};
pub use task::{spawn_receive, spawn_receiver, spawn_sender, TransferHandle};

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging system
///
/// `RUST_LOG` takes precedence over `level`; an unparsable level falls back
/// to `info`. Calling this twice is harmless.
///
/// # Example
/// ```
/// wifidirect_transfer::init_logging("debug");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

    let mut filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Reduce verbosity of the runtime
    for directive in ["tokio=warn", "runtime=warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(true),
        )
        .with(filter)
        .try_init();
}

/// Non-loopback addresses of this host, i.e. the addresses a peer can use
/// to reach a receiver running here.
pub fn local_addresses() -> Vec<(String, IpAddr)> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| {
                let ip = iface.ip();
                (iface.name, ip)
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate network interfaces: {}", e);
            Vec::new()
        }
    }
}

/// System and network summary printed by the binaries at startup
pub fn system_info() -> String {
    use sysinfo::System;

    let mut sys = System::new_all();
    sys.refresh_all();

    let cpu_brand = sys.cpus().first().map(|cpu| cpu.brand()).unwrap_or("Unknown");

    let mut info = format!(
        "WiFi Direct Transfer v{}\n\
         ════════════════════════════════════════\n\
         OS: {} {}\n\
         CPU: {} ({} cores)\n\
         Memory: {:.2} GB available / {:.2} GB total",
        VERSION,
        System::name().unwrap_or_else(|| "Unknown".to_string()),
        System::os_version().unwrap_or_else(|| "Unknown".to_string()),
        cpu_brand,
        sys.cpus().len(),
        sys.available_memory() as f64 / 1024.0 / 1024.0 / 1024.0,
        sys.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0
    );

    info.push_str("\n\nNetwork Interfaces:");
    let addresses = local_addresses();
    if addresses.is_empty() {
        info.push_str("\n  No active network interfaces found");
    }
    for (name, ip) in addresses {
        let ip_version = if ip.is_ipv4() { "IPv4" } else { "IPv6" };
        info.push_str(&format!("\n  {} ({}): {}", name, ip_version, ip));
    }

    info.push_str("\n════════════════════════════════════════");
    info
}

/// Builder for creating a Sender with custom configuration
pub struct SenderBuilder {
    endpoint: TransferEndpoint,
    config: TransferConfig,
}

impl SenderBuilder {
    pub fn new(endpoint: TransferEndpoint) -> Self {
        Self {
            endpoint,
            config: TransferConfig::default(),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    pub fn build(self) -> Sender {
        Sender::new(self.endpoint, &self.config)
    }
}

/// Builder for creating a Receiver with custom configuration
pub struct ReceiverBuilder {
    config: TransferConfig,
}

impl ReceiverBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: TransferConfig {
                output_dir: output_dir.into(),
                ..Default::default()
            },
        }
    }

    /// Listening port; 0 picks a free one
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    pub fn naming(mut self, naming: FileNaming) -> Self {
        self.config.naming = naming;
        self
    }

    /// Leave incomplete files on disk after a failed receive
    pub fn keep_partial(mut self, keep: bool) -> Self {
        self.config.remove_partial = !keep;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Bind the listening socket
    pub async fn build(self) -> anyhow::Result<Receiver> {
        let port = self.config.port;
        let receiver = Receiver::bind(self.config).await?;
        tracing::debug!("Receiver built for port {}", port);
        Ok(receiver)
    }
}
