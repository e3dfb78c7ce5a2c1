use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Route `tracing` output to `<log_dir>/robochat.log`. The terminal belongs
/// to the UI, so nothing is written to stderr. Keep the returned guard alive
/// until exit or buffered lines are lost.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;

    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);

    // Transcripts end up in the log at debug level; keep it private.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }

    let log_file = log_file_opts
        .open(log_dir.join("robochat.log"))
        .context("Failed to open log file")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    // use RUST_LOG env var, default to info for this crate.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("robochat=info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    // an already-installed subscriber wins
    let _ = tracing_subscriber::registry().with(file_layer).try_init();

    Ok(guard)
}
