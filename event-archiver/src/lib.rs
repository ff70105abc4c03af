//! Event Archiver
//!
//! Daily encrypted backups of a remote event stream.
//!
//! One pass fetches the whole stream, groups events by calendar day, and for
//! every finished day holding more events than last recorded, uploads an
//! encrypted JSON Lines dump and remembers the new count.
//!
//! - **source**: paginated event fetching with backoff
//! - **archive**: day bucketing and the per-day pipeline
//! - **dump**: canonical serialization and content hash
//! - **publisher** / **state**: object storage and the archived-count store
//! - **scheduler**: repeats passes on a fixed cadence

pub mod archive;
pub mod config;
pub mod dump;
pub mod error;
pub mod event;
pub mod logger;
pub mod publisher;
pub mod scheduler;
pub mod source;
pub mod state;

use std::sync::Arc;

use archive_crypto::{ArchiveCipher, ChunkedRsaCipher, PassphraseCipher};

pub use archive::{Archiver, DayOutcome, PassReport, day_key, day_of};
pub use config::{Config, EncryptionSecret, S3Config};
pub use dump::Dump;
pub use error::{ArchiveError, ConfigError, PublishError, SourceError, StoreError};
pub use event::{Event, EventPage};
pub use publisher::{ArchivePublisher, ObjectStore, S3ObjectStore, target_path};
pub use scheduler::ArchiveScheduler;
pub use source::{EventSource, PAGE_SIZE, RetryPolicy, StripeEventSource, fetch_events};
pub use state::{RedisStateStore, StateStore};

/// Wire the production collaborators described by `config`.
pub async fn build_archiver(config: &Config) -> Result<Archiver, ArchiveError> {
    let cipher: Arc<dyn ArchiveCipher> = match &config.encryption {
        EncryptionSecret::Passphrase(passphrase) => {
            tracing::info!("Archives encrypted with passphrase (AES-256-CBC)");
            Arc::new(PassphraseCipher::new(passphrase.as_str()))
        }
        EncryptionSecret::PublicKeyFile(path) => Arc::new(ChunkedRsaCipher::from_file(path)?),
    };

    let source = Arc::new(StripeEventSource::new(
        &config.stripe_api_key,
        &config.stripe_api_base,
    )?);

    let state = Arc::new(RedisStateStore::new(&config.redis_host, config.redis_port)?);
    tracing::info!(
        host = %config.redis_host,
        port = config.redis_port,
        "State store configured"
    );

    let store = Arc::new(S3ObjectStore::new(&config.s3).await);
    let publisher = ArchivePublisher::new(
        store,
        state.clone(),
        config.s3.path_template.clone(),
        config.retention,
    );

    Ok(Archiver::new(source, state, cipher, publisher)
        .with_timezone(config.timezone)
        .with_retry(config.retry.clone()))
}
