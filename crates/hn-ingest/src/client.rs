//! Remote source client
//!
//! Bounded-retry HTTP fetches against the top-stories list endpoint and the
//! templated per-item endpoint. Exhausted retries degrade to an empty list or
//! an absent item; they are never returned as errors. Each failed attempt is
//! traced and written to the [`ErrorLog`].

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{IngestConfig, ItemUrlTemplate, RetryPolicy};
use crate::error_log::ErrorLog;
use crate::models::{FetchedStory, HnItem};

/// Failure of a single fetch attempt.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// What a fetch is for; prefixes diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    TopStories,
    Story(i64),
}

impl FetchScope {
    pub fn story_id(self) -> Option<i64> {
        match self {
            FetchScope::TopStories => None,
            FetchScope::Story(id) => Some(id),
        }
    }
}

impl fmt::Display for FetchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchScope::TopStories => write!(f, "[topstories]"),
            FetchScope::Story(id) => write!(f, "[story {}]", id),
        }
    }
}

/// HTTP client for the news source.
#[derive(Debug, Clone)]
pub struct HnClient {
    http: reqwest::Client,
    top_stories_url: String,
    item_url: ItemUrlTemplate,
    retry: RetryPolicy,
}

impl HnClient {
    pub fn new(config: &IngestConfig) -> Result<Self, FetchError> {
        reqwest::Url::parse(&config.top_stories_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", config.top_stories_url, e)))?;
        reqwest::Url::parse(&config.item_url.render(0))
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", config.item_url.as_str(), e)))?;

        let http = reqwest::Client::builder()
            .timeout(config.retry.request_timeout)
            .user_agent(concat!("hn-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            top_stories_url: config.top_stories_url.clone(),
            item_url: config.item_url.clone(),
            retry: config.retry,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch the current top-story ids, in source order.
    ///
    /// Returns an empty list when every attempt failed.
    pub async fn fetch_top_ids(&self, errors: &dyn ErrorLog) -> Vec<i64> {
        let url = self.top_stories_url.as_str();
        self.with_retry(FetchScope::TopStories, errors, || self.get_json::<Vec<i64>>(url))
            .await
            .unwrap_or_default()
    }

    /// Fetch one item. `None` when retries are exhausted, when the source
    /// has no such item, or when the item is not a story.
    #[tracing::instrument(skip(self, errors))]
    pub async fn fetch_item(&self, id: i64, errors: &dyn ErrorLog) -> Option<FetchedStory> {
        let url = self.item_url.render(id);
        let item = self
            .with_retry(FetchScope::Story(id), errors, || self.get_item(&url))
            .await?;

        match item {
            Some(item) => item.into_story(),
            None => {
                debug!("Item is missing or not a story; skipped");
                None
            },
        }
    }

    /// Run `op` up to `max_retries` times. Every failed attempt is traced and
    /// logged with the backoff computed for it; the wait is only slept when
    /// another attempt follows.
    async fn with_retry<T, F, Fut>(
        &self,
        scope: FetchScope,
        errors: &dyn ErrorLog,
        mut op: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max = self.retry.max_retries;

        for attempt in 0..max {
            let error = match op().await {
                Ok(value) => return Some(value),
                Err(e) => e,
            };

            let wait = self.retry.backoff(attempt);
            let last = attempt + 1 == max;
            let message = retry_message(scope, attempt + 1, max, &error, wait, last);

            warn!("{}", message);
            errors.log_error(scope.story_id(), &message).await;

            if !last {
                tokio::time::sleep(wait).await;
            }
        }

        None
    }

    /// A story-typed body that fails to decode is an error; any other
    /// well-formed body is `Ok(None)`.
    async fn get_item(&self, url: &str) -> Result<Option<HnItem>, FetchError> {
        let value: serde_json::Value = self.get_json(url).await?;
        Ok(HnItem::from_value(value)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn retry_message(
    scope: FetchScope,
    attempt: u32,
    max: u32,
    error: &FetchError,
    wait: std::time::Duration,
    last: bool,
) -> String {
    if last {
        format!(
            "{} Attempt {}/{} failed: {}; backoff {:?}, no retries left",
            scope, attempt, max, error, wait
        )
    } else {
        format!(
            "{} Attempt {}/{} failed: {}; backoff {:?}, retrying",
            scope, attempt, max, error, wait
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error_log::RecordingErrorLog;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer, max_retries: u32) -> HnClient {
        let mut config = IngestConfig::new(
            format!("{}/topstories.json", server.uri()),
            format!("{}/item/{{}}.json", server.uri()),
        )
        .unwrap();
        config.retry = RetryPolicy {
            max_retries,
            backoff_factor: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
        };
        HnClient::new(&config).unwrap()
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(FetchScope::TopStories.to_string(), "[topstories]");
        assert_eq!(FetchScope::Story(42).to_string(), "[story 42]");
        assert_eq!(FetchScope::TopStories.story_id(), None);
        assert_eq!(FetchScope::Story(42).story_id(), Some(42));
    }

    #[test]
    fn test_new_rejects_invalid_urls() {
        let config = IngestConfig::new("not a url", "https://hn.example/item/{}.json").unwrap();
        assert!(matches!(HnClient::new(&config), Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_top_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([3, 1, 2])))
            .expect(1)
            .mount(&server)
            .await;

        let errors = RecordingErrorLog::new();
        let ids = client_for(&server, 5).await.fetch_top_ids(&errors).await;

        assert_eq!(ids, vec![3, 1, 2]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_top_ids_exhausted_returns_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(503))
            .expect(5)
            .mount(&server)
            .await;

        let errors = RecordingErrorLog::new();
        let client = client_for(&server, 5).await;
        let ids = client.fetch_top_ids(&errors).await;

        assert!(ids.is_empty());
        let records = errors.records();
        assert_eq!(records.len(), 5);
        for (attempt, (story_id, message)) in records.iter().enumerate() {
            assert_eq!(*story_id, None);
            assert!(message.starts_with("[topstories]"));
            let wait = client.retry_policy().backoff(attempt as u32);
            assert!(
                message.contains(&format!("backoff {:?}", wait)),
                "unexpected message: {}",
                message
            );
        }
        assert!(records[4].1.ends_with("no retries left"));
    }

    #[tokio::test]
    async fn test_fetch_item_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/8863.json"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/8863.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 8863,
                "type": "story",
                "by": "dhouston",
                "score": 111,
                "descendants": 71,
                "time": 1175714200,
                "title": "My YC app: Dropbox - Throw away your USB drive"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let errors = RecordingErrorLog::new();
        let story = client_for(&server, 5)
            .await
            .fetch_item(8863, &errors)
            .await
            .unwrap();

        assert_eq!(story.author, "dhouston");
        assert_eq!(story.score, Some(111));
        let records = errors.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|(id, m)| *id == Some(8863) && m.contains("500")));
    }

    #[tokio::test]
    async fn test_fetch_item_malformed_body_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/5.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .expect(3)
            .mount(&server)
            .await;

        let errors = RecordingErrorLog::new();
        let story = client_for(&server, 3).await.fetch_item(5, &errors).await;

        assert!(story.is_none());
        assert_eq!(errors.len(), 3);
        assert!(errors.records()[0].1.contains("Malformed response body"));
    }

    #[tokio::test]
    async fn test_fetch_item_non_story_is_absent_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/2921983.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 2921983,
                "type": "comment",
                "by": "norvig",
                "parent": 2921506,
                "text": "Aw shucks",
                "time": 1314211127
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/99.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(&server)
            .await;

        let errors = RecordingErrorLog::new();
        let client = client_for(&server, 5).await;

        assert!(client.fetch_item(2921983, &errors).await.is_none());
        assert!(client.fetch_item(99, &errors).await.is_none());
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_item_malformed_non_story_is_absent_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "type": "poll",
                "score": "n/a",
                "by": "x"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let errors = RecordingErrorLog::new();
        let story = client_for(&server, 5).await.fetch_item(1, &errors).await;

        assert!(story.is_none());
        assert!(errors.is_empty());
    }

    fn offline_client(backoff_factor: Duration, max_retries: u32) -> HnClient {
        let mut config = IngestConfig::new(
            "http://127.0.0.1:9/topstories.json",
            "http://127.0.0.1:9/item/{}.json",
        )
        .unwrap();
        config.retry = RetryPolicy {
            max_retries,
            backoff_factor,
            request_timeout: Duration::from_secs(10),
        };
        HnClient::new(&config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_sleeps_exponential_backoff_between_attempts() {
        let client = offline_client(Duration::from_secs(1), 5);
        let errors = RecordingErrorLog::new();
        let mut calls = 0u32;
        let started = tokio::time::Instant::now();

        let result: Option<()> = client
            .with_retry(FetchScope::TopStories, &errors, || {
                calls += 1;
                async { Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)) }
            })
            .await;

        assert!(result.is_none());
        assert_eq!(calls, 5);
        assert_eq!(errors.len(), 5);
        // 1 + 2 + 4 + 8 seconds; nothing after the last attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_waiting_once_an_attempt_succeeds() {
        let client = offline_client(Duration::from_secs(1), 5);
        let errors = RecordingErrorLog::new();
        let mut calls = 0u32;
        let started = tokio::time::Instant::now();

        let result = client
            .with_retry(FetchScope::Story(7), &errors, || {
                calls += 1;
                let outcome = if calls < 3 {
                    Err(FetchError::Status(StatusCode::BAD_GATEWAY))
                } else {
                    Ok(calls)
                };
                async move { outcome }
            })
            .await;

        assert_eq!(result, Some(3));
        assert_eq!(errors.len(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
