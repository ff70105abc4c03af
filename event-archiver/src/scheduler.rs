//! Pass scheduler
//!
//! Runs a pass at startup, then one per interval until shutdown. A failed
//! pass is logged and the loop keeps going; shutdown is only observed between
//! passes, so a running pass always completes.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::archive::{Archiver, PassReport};
use crate::error::{ArchiveError, error_chain};

pub struct ArchiveScheduler {
    archiver: Archiver,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ArchiveScheduler {
    pub fn new(archiver: Archiver, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            archiver,
            interval,
            shutdown,
        }
    }

    /// Main loop: pass → sleep → pass … until `shutdown` is cancelled.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Archive scheduler started"
        );

        loop {
            let _ = self.run_once().await;

            tracing::info!(
                next_in_minutes = self.interval.as_secs() / 60,
                "Waiting for next pass"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Archive scheduler received shutdown signal");
                    break;
                }
            }
        }

        tracing::info!("Archive scheduler stopped");
    }

    /// A single pass; fatal errors are logged and returned.
    pub async fn run_once(&self) -> Result<PassReport, ArchiveError> {
        let result = self.archiver.run_pass().await;
        if let Err(e) = &result {
            tracing::error!(error = %error_chain(e), "Archive pass aborted");
        }
        result
    }
}
