//! File logging bootstrap.
//!
//! The REPL owns the terminal, so logs go to a file under the Folio config
//! directory (`logs/folio.log`) instead of stdout. Filtering follows
//! `RUST_LOG` when set, `info` otherwise.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use folio_infrastructure::FolioPaths;

/// Installs the global tracing subscriber writing to the log file.
///
/// The returned guard keeps the background log writer alive; it must live
/// for the duration of the program.
pub fn init() -> Result<WorkerGuard> {
    let logs_dir = FolioPaths::logs_dir()?;
    std::fs::create_dir_all(&logs_dir)?;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join("folio.log"))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Ok(guard)
}
