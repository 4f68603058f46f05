use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use itransfer::config::{self, ServerConfig};
use itransfer::selection::{Selection, format_size};
use itransfer::upload::{UploadOutcome, Uploader};
use itransfer::{logging, server, source};

#[derive(Parser)]
#[command(name = "itransfer", version, about = "Self-hosted file transfer over email links")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transfer server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Upload files or folders and email the recipient a download link
    Send {
        /// Files or directories to send
        paths: Vec<PathBuf>,
        /// Recipient email address
        #[arg(long)]
        to: String,
        /// Your email address (used as the reply-to)
        #[arg(long)]
        from: String,
        /// Backend URL (defaults to ITRANSFER_BACKEND_URL, then localhost)
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = ServerConfig::load_or_default()?;
            let config_path = config::get_config_file_path()?;
            let data_dir = config.resolve_data_dir()?;
            std::fs::create_dir_all(&data_dir)?;
            let _guard = logging::init_server_logging(data_dir.join("itransfer.log"))?;
            server::run_server(config, config_path, port).await
        }
        Commands::Send { paths, to, from, url } => {
            logging::init_console_logging();
            send(paths, to, from, url).await
        }
    }
}

async fn send(paths: Vec<PathBuf>, to: String, from: String, url: Option<String>) -> Result<()> {
    let backend_url = url
        .or_else(|| std::env::var("ITRANSFER_BACKEND_URL").ok())
        .unwrap_or_else(|| "http://localhost:5500".to_string());

    let mut selection = Selection::new();
    selection.append(source::collect_picked(&paths).await);
    if selection.is_empty() {
        bail!("nothing to send");
    }
    println!(
        "Sending {} file(s), {} total",
        selection.len(),
        format_size(selection.total_size())
    );

    let uploader = Uploader::new(&backend_url);
    let progress = uploader.progress();

    // Ctrl-C cancels the in-flight upload instead of killing the process
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}% {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    let bar_ticker = bar.clone();
    let progress_ticker = progress.clone();
    let ticker = tokio::spawn(async move {
        loop {
            bar_ticker.set_position(progress_ticker.percent() as u64);
            bar_ticker.set_message(format_size(progress_ticker.bytes_sent()));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    let outcome = uploader.send(&mut selection, &to, &from, &cancel).await;
    ticker.abort();
    bar.finish_and_clear();

    match outcome? {
        UploadOutcome::Completed { message } => {
            println!("{}", message);
        }
        UploadOutcome::CompletedWithWarning { message, warning } => {
            println!("{}", message);
            eprintln!("Warning: {}", warning);
        }
        UploadOutcome::Cancelled => {
            println!("Upload cancelled");
        }
    }

    Ok(())
}
