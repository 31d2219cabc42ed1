//! Feed retrieval.
//!
//! [`FeedFetcher`] is the transport seam: the HTTP implementation is used in
//! production, tests plug in in-memory feeds. [`fetch`] wraps any fetcher
//! with the per-source timeout and collapses every failure to an empty list.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::constants::USER_AGENT;
use crate::error::{FetchError, FetchResult};
use crate::event::RawCalendarEvent;
use crate::ics::parse_feed;
use crate::source::CalendarSource;

pub trait FeedFetcher: Send + Sync + 'static {
    /// Retrieve and parse one feed.
    fn fetch_feed(
        &self,
        source: &CalendarSource,
    ) -> impl Future<Output = FetchResult<Vec<RawCalendarEvent>>> + Send;
}

/// Fetches ICS feeds over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(request_timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(HttpFeedFetcher { client })
    }
}

impl FeedFetcher for HttpFeedFetcher {
    async fn fetch_feed(&self, source: &CalendarSource) -> FetchResult<Vec<RawCalendarEvent>> {
        let url = source
            .fetch_url()
            .ok_or_else(|| FetchError::InvalidUrl(source.url.clone()))?;

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_feed(&body, &source.name)
    }
}

/// Fetch one source, never failing.
///
/// Network errors, bad statuses, parse errors and timeouts are logged and
/// reported as "no events" so one broken feed cannot sink the aggregate.
pub async fn fetch<F: FeedFetcher>(
    fetcher: &F,
    source: &CalendarSource,
    limit: Duration,
) -> Vec<RawCalendarEvent> {
    let result = timeout(limit, fetcher.fetch_feed(source))
        .await
        .unwrap_or_else(|_| Err(FetchError::Timeout(limit.as_secs())));

    match result {
        Ok(events) => {
            tracing::debug!(calendar = %source.name, count = events.len(), "Fetched calendar");
            events
        }
        Err(e) => {
            tracing::warn!(calendar = %source.name, error = %e, "Error fetching calendar");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_FETCH_TIMEOUT;

    struct StaticFetcher(FetchResult<&'static str>);

    impl FeedFetcher for StaticFetcher {
        async fn fetch_feed(&self, source: &CalendarSource) -> FetchResult<Vec<RawCalendarEvent>> {
            match &self.0 {
                Ok(body) => parse_feed(body, &source.name),
                Err(_) => Err(FetchError::Status(500)),
            }
        }
    }

    struct SlowFetcher;

    impl FeedFetcher for SlowFetcher {
        async fn fetch_feed(&self, _source: &CalendarSource) -> FetchResult<Vec<RawCalendarEvent>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    fn source() -> CalendarSource {
        CalendarSource::new("Home", "https://example.com/home.ics")
    }

    #[tokio::test]
    async fn test_fetch_returns_parsed_events() {
        let fetcher = StaticFetcher(Ok("BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:a\r\n\
DTSTART:20240108T150000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n"));

        let events = fetch(&fetcher, &source(), Duration::from_secs(10)).await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_empty() {
        let fetcher = StaticFetcher(Err(FetchError::Status(500)));
        assert!(fetch(&fetcher, &source(), Duration::from_secs(10)).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_malformed_feed_is_empty() {
        let fetcher = StaticFetcher(Ok("<html>oops</html>"));
        assert!(fetch(&fetcher, &source(), Duration::from_secs(10)).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_is_empty() {
        let events = fetch(&SlowFetcher, &source(), Duration::from_secs(10)).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_bad_url() -> FetchResult<()> {
        let fetcher = HttpFeedFetcher::new(DEFAULT_FETCH_TIMEOUT)?;
        let result = fetcher
            .fetch_feed(&CalendarSource::new("Broken", "::not a url::"))
            .await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
        Ok(())
    }
}
