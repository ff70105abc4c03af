//! Archive state store: day-key → number of events already archived
//!
//! An entry is written only after the day's upload succeeded and expires
//! after the retention window. A missing entry means "never archived".

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use crate::error::StoreError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fails when the store cannot be reached at all.
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn archived_count(&self, day: &str) -> Result<Option<u64>, StoreError>;

    async fn record_archived(&self, day: &str, count: u64, ttl: Duration)
    -> Result<(), StoreError>;
}

/// Redis-backed store (`GET` / `SETEX`, values are decimal strings)
///
/// No connection is made until the first command. A broken connection is
/// dropped and reopened on the next command, so an outage only fails the
/// passes that run during it.
pub struct RedisStateStore {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStateStore {
    /// Validates the address only.
    pub fn new(host: &str, port: u16) -> Result<Self, StoreError> {
        let client = redis::Client::open(format!("redis://{host}:{port}/0"))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut cached = self.conn.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            StoreError::Unavailable(format!(
                "no connection within {}s",
                CONNECT_TIMEOUT.as_secs()
            ))
        })??;
        tracing::debug!("Opened state store connection");
        *cached = Some(conn.clone());
        Ok(conn)
    }

    /// Forget the cached connection when `err` means it is gone.
    async fn check<T>(&self, result: redis::RedisResult<T>) -> Result<T, StoreError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
                    self.conn.lock().await.take();
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        self.check(result).await?;
        Ok(())
    }

    async fn archived_count(&self, day: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<Option<String>> = conn.get(day).await;
        let value = self.check(result).await?;
        value.map(|v| parse_count(day, &v)).transpose()
    }

    async fn record_archived(
        &self,
        day: &str,
        count: u64,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result = conn
            .set_ex::<_, _, ()>(day, count.to_string(), ttl.as_secs())
            .await;
        self.check(result).await
    }
}

pub(crate) fn parse_count(day: &str, value: &str) -> Result<u64, StoreError> {
    value
        .trim()
        .parse()
        .map_err(|_| StoreError::CorruptValue {
            key: day.to_string(),
            value: value.to_string(),
        })
}
