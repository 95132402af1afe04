use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use wifidirect_transfer::{
    config::default_output_dir, init_logging, spawn_receive, system_info, TransferConfig,
    TransferContext, TransferErrorKind, TransferEvent, DEFAULT_PORT,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "WiFi Direct File Receiver (group owner side)", long_about = None)]
struct Args {
    /// Directory to save received files (defaults to the download directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Listening port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Start a new receive after each finished one
    #[arg(long)]
    keep_listening: bool,

    /// Keep incomplete files when a receive fails
    #[arg(long)]
    keep_partial: bool,

    /// Print each result as JSON
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

    let config = TransferConfig {
        port: args.port,
        output_dir: args.output.clone().unwrap_or_else(default_output_dir),
        remove_partial: !args.keep_partial,
        ..Default::default()
    };

    println!("Output directory: {:?}", config.output_dir);
    println!("Listen port: {}", config.port);
    println!();

    let mut failures = 0u32;

    loop {
        let ctx = TransferContext::new().with_events(Arc::new(|event: TransferEvent| {
            if !matches!(event, TransferEvent::Progress(_)) {
                println!("{}", event);
            }
        }));

        let handle = spawn_receive(config.clone(), ctx);
        let (result, interrupted) = handle
            .result_or_cancel(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
                println!("Interrupted, stopping receiver...");
            })
            .await;

        if args.json {
            println!("{}", result.to_json()?);
        } else {
            println!("{}", result.summary());
        }

        if !result.success() {
            failures += 1;
        }

        if interrupted {
            return Ok(());
        }

        // Port taken: another receive would fail the same way
        if !args.keep_listening || result.error_kind() == Some(TransferErrorKind::Bind) {
            break;
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }

    Ok(())
}
