//! Logging infrastructure for the iTransfer server
//!
//! Structured logging with file output, timestamps, and an env-controlled filter

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the server.
///
/// Writes to the given log file in append mode and mirrors output to stderr.
/// Returns a guard that must be kept alive for the duration of the program.
pub fn init_server_logging<P: AsRef<Path>>(log_file: P) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_path = log_file.as_ref();

    // Write a startup header to the file (append mode)
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let separator = "=".repeat(80);
        writeln!(file, "\n{}", separator)?;
        writeln!(file, "iTransfer Server Started - {}", timestamp)?;
        writeln!(file, "Log file: {}", log_path.display())?;
        writeln!(file, "{}\n", separator)?;
        file.flush()?;
    }

    let file = OpenOptions::new().create(true).append(true).open(log_path)?;

    // When the guard is dropped, logging stops.
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false);

    // Controlled via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    tracing::info!(log_file = %log_path.display(), "Logging initialized");

    Ok(guard)
}

/// Initialize console-only logging (for the send command)
pub fn init_console_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
