//! One archival pass: fetch → bucket by day → archive each finished day
//!
//! Days are processed in ascending order. A day is archived only when it now
//! holds more events than the state store remembers; only counts are
//! compared, so an edited event on an otherwise unchanged day is not picked
//! up again. A failing day is logged and never stops the remaining days.

use std::collections::BTreeMap;
use std::pin::pin;
use std::sync::Arc;

use archive_crypto::ArchiveCipher;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::TryStreamExt;

use crate::dump::Dump;
use crate::error::{ArchiveError, error_chain};
use crate::event::Event;
use crate::publisher::ArchivePublisher;
use crate::source::{EventSource, RetryPolicy, fetch_events};
use crate::state::StateStore;

/// `YYYY-MM-DD`
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Calendar day of a Unix timestamp in `tz`; `None` if out of range.
pub fn day_of(created: i64, tz: Tz) -> Option<NaiveDate> {
    DateTime::from_timestamp(created, 0).map(|dt| dt.with_timezone(&tz).date_naive())
}

/// What happened to one day during a pass
#[derive(Debug)]
pub enum DayOutcome {
    /// Already archived with at least as many events
    Skipped { archived: u64 },
    Archived { path: String, events: usize },
    Failed(ArchiveError),
}

/// Summary of one pass
#[derive(Debug, Default)]
pub struct PassReport {
    /// Events received from the source
    pub fetched: usize,
    /// Events placed in a day bucket (excludes today and undatable events)
    pub accepted: usize,
    pub days: Vec<(NaiveDate, DayOutcome)>,
}

impl PassReport {
    pub fn archived(&self) -> usize {
        self.count(|o| matches!(o, DayOutcome::Archived { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DayOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DayOutcome::Failed(_)))
    }

    pub fn outcome(&self, date: NaiveDate) -> Option<&DayOutcome> {
        self.days.iter().find(|(d, _)| *d == date).map(|(_, o)| o)
    }

    fn count(&self, pred: impl Fn(&DayOutcome) -> bool) -> usize {
        self.days.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// The archival engine. Collaborators are injected; nothing is global.
pub struct Archiver {
    source: Arc<dyn EventSource>,
    state: Arc<dyn StateStore>,
    cipher: Arc<dyn ArchiveCipher>,
    publisher: ArchivePublisher,
    timezone: Tz,
    retry: RetryPolicy,
}

impl Archiver {
    pub fn new(
        source: Arc<dyn EventSource>,
        state: Arc<dyn StateStore>,
        cipher: Arc<dyn ArchiveCipher>,
        publisher: ArchivePublisher,
    ) -> Self {
        Self {
            source,
            state,
            cipher,
            publisher,
            timezone: Tz::UTC,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn run_pass(&self) -> Result<PassReport, ArchiveError> {
        self.run_pass_at(Utc::now()).await
    }

    /// Run one pass as if started at `now`.
    ///
    /// Errors are fatal to the pass: the state store is unreachable or the
    /// event stream could not be read. Per-day failures are in the report.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<PassReport, ArchiveError> {
        let today = now.with_timezone(&self.timezone).date_naive();
        tracing::info!(today = %day_key(today), "Starting to archive events");

        self.state.health_check().await?;

        let mut report = PassReport::default();
        let buckets = self.collect_days(today, &mut report).await?;
        tracing::info!(
            fetched = report.fetched,
            accepted = report.accepted,
            days = buckets.len(),
            "Fetched events"
        );

        for (date, events) in &buckets {
            let outcome = match self.archive_day(*date, events).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        day = %day_key(*date),
                        error = %error_chain(&e),
                        "No backup created"
                    );
                    DayOutcome::Failed(e)
                }
            };
            report.days.push((*date, outcome));
        }

        tracing::info!(
            archived = report.archived(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Done for today"
        );
        Ok(report)
    }

    /// Drain the event stream into per-day buckets, leaving out `today`.
    async fn collect_days(
        &self,
        today: NaiveDate,
        report: &mut PassReport,
    ) -> Result<BTreeMap<NaiveDate, Vec<Event>>, ArchiveError> {
        let mut buckets: BTreeMap<NaiveDate, Vec<Event>> = BTreeMap::new();
        let mut events = pin!(fetch_events(self.source.as_ref(), &self.retry));

        while let Some(event) = events.try_next().await? {
            report.fetched += 1;

            // `created` presence is checked when the page is validated
            let Some(date) = event.created().and_then(|ts| day_of(ts, self.timezone)) else {
                tracing::warn!(id = ?event.id(), "Event timestamp out of range, not archived");
                continue;
            };
            if date == today {
                continue;
            }

            report.accepted += 1;
            buckets.entry(date).or_default().push(event);
        }

        Ok(buckets)
    }

    async fn archive_day(
        &self,
        date: NaiveDate,
        events: &[Event],
    ) -> Result<DayOutcome, ArchiveError> {
        let day = day_key(date);
        let count = events.len() as u64;
        tracing::info!(day = %day, events = events.len(), "Processing day");

        if let Some(archived) = self.state.archived_count(&day).await?
            && count <= archived
        {
            tracing::info!(day = %day, archived, "Skipping day, already archived");
            return Ok(DayOutcome::Skipped { archived });
        }

        let dump = Dump::build(&day, events)?;
        let file_name = dump.file_name(self.cipher.extension());
        tracing::info!(day = %day, file = %file_name, "Dumping events");

        let artifact = self.cipher.encrypt(dump.as_bytes())?;
        let path = self
            .publisher
            .publish(date, &file_name, artifact, count)
            .await?;

        Ok(DayOutcome::Archived {
            path,
            events: events.len(),
        })
    }
}
