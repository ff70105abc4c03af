//! Stripe event source via REST API (no SDK dependency)

use std::time::Duration;

use async_trait::async_trait;

use super::EventSource;
use crate::error::SourceError;
use crate::event::EventPage;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Longest error body kept for diagnostics
const MAX_ERROR_BODY: usize = 512;

/// `GET {base_url}/v1/events` with the secret key as basic-auth user
pub struct StripeEventSource {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeEventSource {
    pub fn new(secret_key: &str, base_url: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SourceError::from_reqwest)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    fn events_url(&self) -> String {
        format!("{}/v1/events", self.base_url)
    }
}

#[async_trait]
impl EventSource for StripeEventSource {
    async fn fetch_page(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<EventPage, SourceError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let resp = self
            .client
            .get(self.events_url())
            .basic_auth(&self.secret_key, None::<&str>)
            .query(&query)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<EventPage>()
            .await
            .map_err(SourceError::from_reqwest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let source = StripeEventSource::new("sk_test", "https://api.stripe.com/").unwrap();
        assert_eq!(source.events_url(), "https://api.stripe.com/v1/events");
    }
}
