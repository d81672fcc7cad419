use std::sync::Arc;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::error::{Result, ScienceError};

pub const USER_AGENT: &str = concat!("biblioscope/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// HTTP client that spaces requests by a minimum interval, honours
/// `Retry-After` on 429 responses and retries transport errors with
/// exponential backoff.
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
    service: String,
}

impl RateLimitedClient {
    pub fn new(service: &str, min_interval: Duration, max_retries: u32, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
            service: service.to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Send the request built by `build`, retrying as configured, and return
    /// the successful response.
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            match build(&self.client).send().await {
                Ok(r) if r.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok())
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    if attempt >= self.max_retries {
                        return Err(ScienceError::RateLimit(self.service.clone(), wait));
                    }
                    tracing::warn!(service = %self.service, wait, "rate limited, waiting");
                    sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(ScienceError::ApiError(
                        self.service.clone(),
                        format!("HTTP {status} for {url}: {}", truncate(&body, 200)),
                    ));
                }
                Ok(r) => return Ok(r),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ScienceError::Http(e));
                    }
                    let backoff = 2u64.pow(attempt);
                    tracing::debug!(service = %self.service, attempt, error = %e, "request failed, retrying");
                    sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// GET a URL. Returns `Ok(None)` on 404.
    pub async fn get_optional(&self, url: &str) -> Result<Option<String>> {
        match self.get(url).await {
            Ok(body) => Ok(Some(body)),
            Err(ScienceError::ApiError(_, msg)) if msg.starts_with("HTTP 404") => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        let resp = self.send_with_retry(url, |c| c.get(url)).await?;
        resp.text().await.map_err(ScienceError::Http)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get(url).await?;
        serde_json::from_str(&text).map_err(|e| ScienceError::Parse(e.to_string()))
    }

    pub async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R> {
        let resp = self.send_with_retry(url, |c| c.post(url).json(body)).await?;
        let text = resp.text().await.map_err(ScienceError::Http)?;
        serde_json::from_str(&text).map_err(|e| ScienceError::Parse(e.to_string()))
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
