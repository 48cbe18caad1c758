//! Rate-limited, retrying HTTP client (C2, spec §4.2).
//!
//! The per-origin token bucket is grounded on
//! `extraction::crawlers::rate_limited::RateLimitedCrawler` (the `governor`
//! crate, `Quota::per_second(..).allow_burst(..)`); the retry loop's shape
//! follows `extraction::ingestors::http::HttpIngestor`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use rand::Rng;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::HttpError;
use crate::http::robots::RobotsRegistry;
use crate::http::security::UrlGuard;

type OriginLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

const RETRYABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];
const MAX_REDIRECTS: usize = 5;

/// Per-call parameters threaded through one fetch (spec §4.2 "context").
#[derive(Clone)]
pub struct FetchContext {
    pub cancellation: CancellationToken,
    pub rate_override: Option<(f64, u32)>,
}

impl Default for FetchContext {
    fn default() -> Self {
        FetchContext {
            cancellation: CancellationToken::new(),
            rate_override: None,
        }
    }
}

/// Result of a successful fetch (spec §4.2 contract: `(status, headers,
/// body)`).
pub struct FetchResponse {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    pub body: bytes::Bytes,
}

pub struct RateLimitedClient {
    http: reqwest::Client,
    robots: Arc<RobotsRegistry>,
    guard: UrlGuard,
    user_agent: String,
    retry_count: u32,
    backoff_base: Duration,
    default_quota: (f64, u32),
    limiters: RwLock<HashMap<String, Arc<OriginLimiter>>>,
}

impl RateLimitedClient {
    pub fn new(
        robots: Arc<RobotsRegistry>,
        user_agent: String,
        retry_count: u32,
        backoff_base: Duration,
        request_timeout: Duration,
        default_rps: f64,
        default_burst: u32,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::custom(|attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    return attempt.error("too many redirects");
                }
                let original_scheme = attempt.previous()[0].scheme();
                if attempt.url().scheme() != original_scheme {
                    return attempt.error("redirect changed scheme");
                }
                attempt.follow()
            }))
            .build()
            .expect("client builder config is static and valid");

        RateLimitedClient {
            http,
            robots,
            guard: UrlGuard::new(),
            user_agent,
            retry_count,
            backoff_base,
            default_quota: (default_rps, default_burst),
            limiters: RwLock::new(HashMap::new()),
        }
    }

    fn origin_of(url: &url::Url) -> String {
        format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or(""),
            url.port().map(|p| format!(":{p}")).unwrap_or_default()
        )
    }

    async fn limiter_for(&self, origin: &str, ctx: &FetchContext) -> Arc<OriginLimiter> {
        if let Some(limiter) = self.limiters.read().await.get(origin) {
            return limiter.clone();
        }
        let (rps, burst) = ctx.rate_override.unwrap_or(self.default_quota);
        let quota = Quota::per_second(NonZeroU32::new(rps.max(1.0).round() as u32).unwrap())
            .allow_burst(NonZeroU32::new(burst.max(1)).unwrap());
        let limiter = Arc::new(RateLimiter::direct(quota));
        self.limiters.write().await.insert(origin.to_string(), limiter.clone());
        limiter
    }

    /// `get(url, context)` per spec §4.2's algorithm.
    #[instrument(skip(self, ctx), fields(url = %url))]
    pub async fn get(&self, url: &str, ctx: &FetchContext) -> Result<FetchResponse, HttpError> {
        self.guard.validate(url).map_err(HttpError::Security)?;
        let parsed = url::Url::parse(url).map_err(|e| HttpError::Security(e.into()))?;
        let origin = Self::origin_of(&parsed);

        let mut attempt: u32 = 0;
        loop {
            if ctx.cancellation.is_cancelled() {
                return Err(HttpError::Cancelled { url: url.to_string() });
            }

            let limiter = self.limiter_for(&origin, ctx).await;
            tokio::select! {
                _ = limiter.until_ready() => {}
                _ = ctx.cancellation.cancelled() => {
                    return Err(HttpError::Cancelled { url: url.to_string() });
                }
            }

            if !self.robots.is_allowed(url, &self.user_agent).await {
                return Err(HttpError::Denied { url: url.to_string() });
            }

            let request = self
                .http
                .get(url)
                .header(reqwest::header::USER_AGENT, &self.user_agent);

            let outcome = request.send().await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let headers = response.headers().clone();
                        let body = response.bytes().await.map_err(|e| HttpError::Transport {
                            url: url.to_string(),
                            source: e,
                        })?;
                        return Ok(FetchResponse { status: status.as_u16(), headers, body });
                    }

                    if !RETRYABLE_STATUSES.contains(&status.as_u16()) || attempt >= self.retry_count {
                        return Err(HttpError::HttpStatus { url: url.to_string(), status: status.as_u16() });
                    }

                    let retry_after = parse_retry_after(response.headers());
                    debug!(attempt, status = status.as_u16(), "retrying after status");
                    self.sleep_before_retry(attempt, retry_after, ctx).await?;
                }
                Err(err) => {
                    if err.is_timeout() {
                        if attempt >= self.retry_count {
                            return Err(HttpError::Timeout { url: url.to_string() });
                        }
                    } else if attempt >= self.retry_count {
                        return Err(HttpError::Transport { url: url.to_string(), source: err });
                    } else {
                        warn!(attempt, error = %err, "transport error, retrying");
                    }
                    self.sleep_before_retry(attempt, None, ctx).await?;
                }
            }

            attempt += 1;
        }
    }

    async fn sleep_before_retry(
        &self,
        attempt: u32,
        retry_after: Option<Duration>,
        ctx: &FetchContext,
    ) -> Result<(), HttpError> {
        let delay = retry_after.unwrap_or_else(|| jittered_backoff(self.backoff_base, attempt));
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = ctx.cancellation.cancelled() => Err(HttpError::Cancelled { url: String::new() }),
        }
    }
}

/// `base * 2^attempt` with full jitter, matching spec §4.2's backoff law.
fn jittered_backoff(base: Duration, attempt: u32) -> Duration {
    let cap = Duration::from_secs(60);
    let exp = base.saturating_mul(1u32 << attempt.min(10));
    let bounded = exp.min(cap);
    let mut rng = rand::thread_rng();
    Duration::from_secs_f64(rng.gen_range(0.0..=bounded.as_secs_f64().max(0.001)))
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    let now = chrono::Utc::now();
    let delta = when.with_timezone(&chrono::Utc) - now;
    delta.to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_bounded_by_cap() {
        let d = jittered_backoff(Duration::from_millis(500), 20);
        assert!(d <= Duration::from_secs(60));
    }

    #[test]
    fn backoff_grows_with_attempt_bound() {
        // attempt 0 upper bound << attempt 5 upper bound
        let small = jittered_backoff(Duration::from_millis(10), 0);
        assert!(small <= Duration::from_millis(10));
    }
}
