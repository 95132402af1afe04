use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wifidirect_transfer::{
    init_logging, spawn_sender, system_info, FileSource, SenderBuilder, TransferContext,
    TransferEndpoint, TransferEvent, CHUNK_SIZE, CONNECT_TIMEOUT_MS, DEFAULT_PORT,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "WiFi Direct File Sender (client side)", long_about = None)]
struct Args {
    /// File to send
    file: PathBuf,

    /// Group owner address (hostname or IP)
    host: String,

    /// Group owner port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Connect timeout in milliseconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Copy chunk size in bytes
    #[arg(long, default_value_t = CHUNK_SIZE)]
    chunk_size: usize,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    println!("{}", system_info());
    println!();

    if args.file.is_dir() {
        anyhow::bail!("Cannot send directory: {:?}", args.file);
    }

    let file_size = std::fs::metadata(&args.file)
        .with_context(|| format!("File not found: {:?}", args.file))?
        .len();

    let endpoint = TransferEndpoint::new(args.host.clone(), args.port);
    println!("File: {:?}", args.file);
    println!("Size: {} bytes ({:.2} MB)", file_size, file_size as f64 / 1024.0 / 1024.0);
    println!("Receiver: {}", endpoint);
    println!();

    let sender = SenderBuilder::new(endpoint)
        .connect_timeout(Duration::from_millis(args.timeout_ms))
        .chunk_size(args.chunk_size)
        .build();

    let ctx = TransferContext::new().with_events(Arc::new(|event: TransferEvent| {
        println!("{}", event);
    }));

    let handle = spawn_sender(sender, FileSource::new(&args.file), ctx);
    let (result, interrupted) = handle
        .result_or_cancel(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            println!("Interrupted, aborting transfer...");
        })
        .await;

    if args.json {
        println!("{}", result.to_json()?);
    } else {
        println!("{}", result.summary());
    }

    if interrupted {
        std::process::exit(130);
    }

    if !result.success() {
        std::process::exit(1);
    }

    Ok(())
}
