//! Event Archiver
//!
//! Periodic encrypted backups of the Stripe event stream.
//!
//! Configuration comes from the environment (a `.env` file is honoured).
//! With `ARCHIVE_RUN_ONCE=true` a single pass runs and the exit status
//! reflects its outcome; otherwise passes repeat until Ctrl-C.

use std::process::ExitCode;

use event_archiver::error::error_chain;
use event_archiver::{ArchiveScheduler, Config, build_archiver, logger};
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = logger::init_logger(config.log_dir.as_deref());
    tracing::info!(?config, "Starting event-archiver");

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %error_chain(e.as_ref()), "event-archiver failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<ExitCode, BoxError> {
    let archiver = build_archiver(&config).await?;
    let shutdown = CancellationToken::new();
    let scheduler = ArchiveScheduler::new(archiver, config.interval, shutdown.clone());

    if config.run_once {
        let report = scheduler.run_once().await?;
        return Ok(if report.failed() == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current pass");
            shutdown.cancel();
        }
    });

    scheduler.run().await;
    Ok(ExitCode::SUCCESS)
}
