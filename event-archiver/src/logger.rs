//! Logging setup
//!
//! Level comes from `RUST_LOG` (default `info` for this crate). With a log
//! directory, output goes to a daily rolling file instead of stderr.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "event_archiver=info,archive_crypto=info";

/// Initialize the global subscriber.
///
/// The returned guard must be held for the life of the process when logging
/// to a file, or buffered lines are lost on exit.
pub fn init_logger(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    if let Some(dir) = log_dir {
        let path = Path::new(dir);
        if path.is_dir() {
            let appender = tracing_appender::rolling::daily(path, "event-archiver");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            subscriber.with_ansi(false).with_writer(writer).init();
            return Some(guard);
        }
        eprintln!("Log directory {dir} does not exist, logging to stderr");
    }

    subscriber.with_writer(std::io::stderr).init();
    None
}
