//! Archive publisher: upload to object storage, then record the count
//!
//! Objects are stored at `<strftime(S3_PATH)>/<file>`, e.g.
//! `backups/2017/07/2017-07-14_66b61f.jsonl.enc`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::fmt::Write;

use chrono::{NaiveDate, NaiveTime};

use crate::archive::day_key;
use crate::config::S3Config;
use crate::error::{ArchiveError, PublishError};
use crate::state::StateStore;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, path: &str, body: Vec<u8>) -> Result<(), PublishError>;
}

/// S3-compatible object storage with static credentials
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "event-archiver",
        );
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        tracing::info!(
            endpoint = %config.endpoint,
            bucket = %config.bucket,
            "Object storage configured"
        );

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, path: &str, body: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(body))
            .content_type("application/octet-stream")
            .send()
            .await
            .map_err(|e| PublishError::Upload {
                path: path.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}

/// Object key for `file_name` archived for `date`.
///
/// Without a template the key is the bare file name. The template is applied
/// to midnight of `date`, so time specifiers render as zero. Specifiers that
/// need an offset (`%z`, `%Z`) cannot be rendered and yield an error.
pub fn target_path(
    template: Option<&str>,
    date: NaiveDate,
    file_name: &str,
) -> Result<String, PublishError> {
    let Some(template) = template else {
        return Ok(file_name.to_string());
    };

    let mut path = String::new();
    write!(path, "{}/{}", date.and_time(NaiveTime::MIN).format(template), file_name).map_err(
        |_| PublishError::PathTemplate {
            template: template.to_string(),
            date: date.to_string(),
        },
    )?;
    Ok(path)
}

/// Uploads archives and advances the state store strictly afterwards.
pub struct ArchivePublisher {
    store: Arc<dyn ObjectStore>,
    state: Arc<dyn StateStore>,
    path_template: Option<String>,
    retention: Duration,
}

impl ArchivePublisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        state: Arc<dyn StateStore>,
        path_template: Option<String>,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            state,
            path_template,
            retention,
        }
    }

    /// Upload `artifact` for `date` and record `count` as archived.
    ///
    /// Returns the object path. If the upload fails the state entry is left
    /// untouched, so the day stays eligible on the next pass.
    pub async fn publish(
        &self,
        date: NaiveDate,
        file_name: &str,
        artifact: Vec<u8>,
        count: u64,
    ) -> Result<String, ArchiveError> {
        let path = target_path(self.path_template.as_deref(), date, file_name)?;
        let size = artifact.len();

        self.store.upload(&path, artifact).await?;
        tracing::info!(path = %path, bytes = size, "Archive uploaded");

        self.state
            .record_archived(&day_key(date), count, self.retention)
            .await?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 7, 14).unwrap()
    }

    #[test]
    fn template_becomes_prefix() {
        assert_eq!(
            target_path(Some("backups/%Y/%m"), date(), "2017-07-14_66b61f.jsonl.enc").unwrap(),
            "backups/2017/07/2017-07-14_66b61f.jsonl.enc"
        );
    }

    #[test]
    fn time_specifiers_render_as_midnight() {
        assert_eq!(
            target_path(Some("backups/%Y/%m/%d-%H"), date(), "a.jsonl.enc").unwrap(),
            "backups/2017/07/14-00/a.jsonl.enc"
        );
    }

    #[test]
    fn offset_specifier_is_an_error() {
        let err = target_path(Some("backups/%z"), date(), "a.jsonl.enc").unwrap_err();
        assert!(matches!(err, PublishError::PathTemplate { .. }));
    }

    #[test]
    fn no_template_is_bare_file_name() {
        assert_eq!(
            target_path(None, date(), "2017-07-14_66b61f.jsonl.enc").unwrap(),
            "2017-07-14_66b61f.jsonl.enc"
        );
    }
}
