// # Twitter Client
//
// This crate provides the Twitter v1.1 implementations of the platform
// traits used by the link mirroring system.
//
// ## Capabilities
//
// - `IdentityResolver`: `POST users/lookup.json` (screen name -> numeric id)
// - `HistorySearch`: `GET search/tweets.json` (`q`, `count`, `max_id`)
// - `StreamSource`: `POST statuses/filter.json` on the streaming host (`follow`)
// - `MirrorAction`: `POST statuses/retweet/:id.json`
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (Platform Client)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTPS API calls to the platform's endpoints only
// - ✅ Parse platform-specific responses
// - ✅ Spawn one reader task per open stream (ends when the stream is dropped)
//
// **Forbidden Capabilities** (enforced by code review):
// - ❌ Implement retry or reconnect logic (owned by LiveConsumer)
// - ❌ Access the link store (owned by UrlRegistry)
// - ❌ Decide what gets mirrored (owned by Classifier)
//
// ## Security Requirements
//
// - Secrets NEVER appear in logs
// - Secrets MUST be provided via environment variables only
// - Client MUST fail fast if any credential is empty
//
// ## Error Mapping
//
// | Status        | REST call              | Stream open                 |
// |---------------|------------------------|-----------------------------|
// | 401, 403      | `Error::Authentication`| `Error::Authentication`     |
// | 404           | `Error::NotFound`      | `Error::NotFound`           |
// | 420, 429      | `Error::RateLimited`   | `Error::Stream` (reconnect) |
// | 5xx           | `Error::Provider`      | `Error::Stream` (reconnect) |

mod oauth;
mod stream;

pub use oauth::{Credentials, Signer};

use async_trait::async_trait;
use linkmirror_core::traits::{
    HistorySearch, IdentityResolver, IncomingPost, LineStream, MirrorAction, MirrorOutcome,
    StreamSource,
};
use linkmirror_core::{Error, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// REST API base URL
pub const API_BASE: &str = "https://api.twitter.com/1.1";

/// Streaming API base URL
pub const STREAM_API_BASE: &str = "https://stream.twitter.com/1.1";

/// Default HTTP timeout for REST requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout for the streaming endpoint
const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "twitter";

#[derive(Debug, Deserialize)]
struct LookupUser {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    statuses: Vec<IncomingPost>,
}

/// Twitter platform client
///
/// # Trust Level: Untrusted
///
/// Single-shot calls only. Reconnects and backoff are owned by
/// `LiveConsumer`.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform lookups, searches and the live stream as usual
/// - Log the retweet it would have made
/// - **NOT** actually retweet anything
pub struct TwitterClient {
    signer: Signer,

    /// Client for REST calls, with a total timeout
    client: reqwest::Client,

    /// Client for the long-lived stream, with a connect timeout only
    stream_client: reqwest::Client,

    api_base: String,
    stream_base: String,

    dry_run: bool,
}

impl std::fmt::Debug for TwitterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterClient")
            .field("signer", &self.signer)
            .field("api_base", &self.api_base)
            .field("stream_base", &self.stream_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl TwitterClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// - `Error::Config` if any credential is empty
    /// - `Error::Http` if the HTTP client cannot be built
    pub fn new(credentials: Credentials, dry_run: bool) -> Result<Self> {
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let stream_client = reqwest::Client::builder()
            .connect_timeout(STREAM_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build stream client: {}", e)))?;

        Ok(Self {
            signer: Signer::new(credentials),
            client,
            stream_client,
            api_base: API_BASE.to_string(),
            stream_base: STREAM_API_BASE.to_string(),
            dry_run,
        })
    }

    /// Point the client at different hosts
    pub fn with_base_urls(mut self, api_base: impl Into<String>, stream_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.stream_base = stream_base.into();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Signed GET with query parameters
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let auth = self.signer.authorization("GET", url, query)?;
        let full_url = if query.is_empty() {
            url.to_string()
        } else {
            format!("{}?{}", url, oauth::encode_pairs(query))
        };

        self.client
            .get(&full_url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))
    }

    /// Signed form POST
    ///
    /// `send_error` maps a failure to reach the host.
    async fn post(
        &self,
        client: &reqwest::Client,
        url: &str,
        form: &[(&str, &str)],
        send_error: impl FnOnce(String) -> Error + Send,
    ) -> Result<reqwest::Response> {
        let auth = self.signer.authorization("POST", url, form)?;

        client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(oauth::encode_pairs(form))
            .send()
            .await
            .map_err(|e| send_error(format!("HTTP request failed: {}", e)))
    }

    /// Read an error response into the matching error
    async fn rest_error(response: reqwest::Response, context: &str) -> Error {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        rest_error_for_status(status, &body, context)
    }
}

/// Map a failed REST status to an error
fn rest_error_for_status(status: StatusCode, body: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid credentials or insufficient permissions. Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, status)),
        420 | 429 => Error::rate_limited(format!(
            "{}: rate limit exceeded. Status: {}",
            context, status
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!("{}: server error (transient): {} - {}", context, status, body),
        ),
        _ => Error::provider(PROVIDER, format!("{}: {} - {}", context, status, body)),
    }
}

/// Map a failed stream-open status to an error
///
/// Throttling and server errors are reconnectable; everything else is fatal.
fn stream_error_for_status(status: StatusCode, body: &str) -> Error {
    match status.as_u16() {
        420 | 429 => Error::stream(format!("Stream throttled. Status: {}", status)),
        500..=599 => Error::stream(format!("Stream server error: {} - {}", status, body)),
        _ => rest_error_for_status(status, body, "Stream connect failed"),
    }
}

#[async_trait]
impl IdentityResolver for TwitterClient {
    async fn resolve(&self, handle: &str) -> Result<Option<u64>> {
        let url = format!("{}/users/lookup.json", self.api_base);
        tracing::debug!(handle, "Looking up account id");

        let response = self
            .post(&self.client, &url, &[("screen_name", handle)], Error::Http)
            .await?;

        // No matching users is reported as 404
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rest_error(response, "Account lookup failed").await);
        }

        let users: Vec<LookupUser> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        Ok(users.first().map(|user| user.id))
    }
}

#[async_trait]
impl HistorySearch for TwitterClient {
    async fn search(
        &self,
        query: &str,
        max_id: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<IncomingPost>> {
        let url = format!("{}/search/tweets.json", self.api_base);
        let count = page_size.to_string();
        let max_id = max_id.map(|id| id.to_string());

        let mut params = vec![("q", query), ("count", count.as_str())];
        if let Some(ref max_id) = max_id {
            params.push(("max_id", max_id.as_str()));
        }

        tracing::debug!(query, max_id = ?max_id, "Searching history");

        let response = self.get(&url, &params).await?;
        if !response.status().is_success() {
            return Err(Self::rest_error(response, "History search failed").await);
        }

        let page: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        Ok(page.statuses)
    }
}

#[async_trait]
impl StreamSource for TwitterClient {
    async fn open(&self, user_id: u64) -> Result<LineStream> {
        let url = format!("{}/statuses/filter.json", self.stream_base);
        let follow = user_id.to_string();

        tracing::info!(user_id, "Opening filtered stream");

        let response = self
            .post(
                &self.stream_client,
                &url,
                &[("follow", follow.as_str())],
                Error::Stream,
            )
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(stream_error_for_status(status, &body));
        }

        Ok(stream::into_lines(response))
    }
}

#[async_trait]
impl MirrorAction for TwitterClient {
    async fn mirror(&self, post_id: &str) -> Result<MirrorOutcome> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would retweet {}", post_id);
            return Ok(MirrorOutcome::DryRun {
                post_id: post_id.to_string(),
            });
        }

        let url = format!("{}/statuses/retweet/{}.json", self.api_base, post_id);
        let response = self
            .post(&self.client, &url, &[], Error::Http)
            .await?;

        if !response.status().is_success() {
            return Err(Self::rest_error(response, "Retweet failed").await);
        }

        tracing::info!("Retweeted {}", post_id);
        Ok(MirrorOutcome::Mirrored {
            post_id: post_id.to_string(),
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
