//! Event source: cursor-paginated retrieval of the full event stream
//!
//! - **stripe**: production client for `GET /v1/events`
//! - **retry**: bounded exponential backoff for connectivity failures

mod retry;
mod stripe;

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};

use crate::error::SourceError;
use crate::event::{Event, EventPage};

pub use retry::RetryPolicy;
pub use stripe::StripeEventSource;

/// Events requested per page
pub const PAGE_SIZE: u32 = 100;

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch one page of at most `limit` events following the event with id
    /// `starting_after` (or the newest events when `None`).
    async fn fetch_page(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<EventPage, SourceError>;
}

/// Lazily walk every page of `source`, yielding events in source order.
///
/// Each call starts from the beginning of the stream. Transient failures are
/// retried per `retry`; any other error ends the stream with that error.
pub fn fetch_events<'a>(
    source: &'a dyn EventSource,
    retry: &'a RetryPolicy,
) -> impl Stream<Item = Result<Event, SourceError>> + 'a {
    // State: `None` once the last page has been seen, otherwise the cursor.
    stream::try_unfold(Some(None::<String>), move |cursor| async move {
        let Some(cursor) = cursor else {
            return Ok(None);
        };

        let page = retry
            .run(|| source.fetch_page(PAGE_SIZE, cursor.as_deref()))
            .await?;
        page.validate()?;

        let next = page.next_cursor().map(|id| Some(id.to_string()));
        if page.has_more && next.is_none() {
            tracing::warn!("Event source reported more pages but returned no events");
        }
        tracing::debug!(events = page.data.len(), has_more = page.has_more, "Fetched event page");

        Ok(Some((page.data, next)))
    })
    .map_ok(|events| stream::iter(events.into_iter().map(Ok)))
    .try_flatten()
}
