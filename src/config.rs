//! Process configuration, loaded once at startup (SPEC_FULL §2 "Ambient
//! stack: configuration"). Mirrors `server::config::Config::from_env`:
//! `dotenvy::dotenv()` followed by plain `std::env::var` reads, each wrapped
//! with `anyhow::Context` for an actionable startup error.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::models::QueryTemplate;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub run_now: bool,
    pub user_agent: String,
    pub http_retry_count: u32,
    pub http_backoff_base: Duration,
    pub http_request_timeout: Duration,
    pub rate_limit_rps: f64,
    pub rate_limit_burst: u32,
    pub worker_count: usize,
    pub job_stale: Duration,
    pub daily_tick_at: (u32, u32),
    pub run_timeout: Duration,
    pub max_errors_per_scraper: u32,
    /// Query templates handed to any scraper whose own `default_queries()`
    /// is empty (spec §4.5 step 2). Loaded from `DEFAULT_SEARCH_QUERIES`, a
    /// comma-separated keyword list.
    pub default_queries: Vec<QueryTemplate>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let listen_addr = env_or("LISTEN_ADDR", "0.0.0.0:8081")
            .parse()
            .context("LISTEN_ADDR must be a valid socket address")?;

        let run_now = env_or("RUN_NOW", "false")
            .parse()
            .context("RUN_NOW must be a boolean")?;

        let user_agent = env_or(
            "USER_AGENT",
            "JobAggregatorBot/1.0 (+https://example.invalid/bot)",
        );

        let http_retry_count = env_or("HTTP_RETRY_COUNT", "3")
            .parse()
            .context("HTTP_RETRY_COUNT must be an integer")?;

        let http_backoff_base = Duration::from_millis(
            env_or("HTTP_BACKOFF_BASE_MS", "500")
                .parse()
                .context("HTTP_BACKOFF_BASE_MS must be an integer")?,
        );

        let http_request_timeout = Duration::from_secs(
            env_or("HTTP_REQUEST_TIMEOUT_SECS", "20")
                .parse()
                .context("HTTP_REQUEST_TIMEOUT_SECS must be an integer")?,
        );

        let rate_limit_rps = env_or("RATE_LIMIT_RPS", "1.0")
            .parse()
            .context("RATE_LIMIT_RPS must be a number")?;

        let rate_limit_burst = env_or("RATE_LIMIT_BURST", "3")
            .parse()
            .context("RATE_LIMIT_BURST must be an integer")?;

        let worker_count = env_or("WORKER_COUNT", "5")
            .parse()
            .context("WORKER_COUNT must be an integer")?;

        let job_stale = Duration::from_secs(
            env_or("JOB_STALE_DAYS", "7")
                .parse::<u64>()
                .context("JOB_STALE_DAYS must be an integer")?
                * 86_400,
        );

        let daily_tick_at = parse_hh_mm(&env_or("DAILY_TICK_AT", "02:00"))
            .context("DAILY_TICK_AT must be HH:MM")?;

        let run_timeout = Duration::from_secs(
            env_or("RUN_TIMEOUT_SECS", "1800")
                .parse()
                .context("RUN_TIMEOUT_SECS must be an integer")?,
        );

        let max_errors_per_scraper = env_or("MAX_ERRORS_PER_SCRAPER", "20")
            .parse()
            .context("MAX_ERRORS_PER_SCRAPER must be an integer")?;

        let default_queries = parse_query_list(&env_or(
            "DEFAULT_SEARCH_QUERIES",
            "software engineer,backend engineer,rust engineer",
        ));

        Ok(Config {
            database_url,
            listen_addr,
            run_now,
            user_agent,
            http_retry_count,
            http_backoff_base,
            http_request_timeout,
            rate_limit_rps,
            rate_limit_burst,
            worker_count,
            job_stale,
            daily_tick_at,
            run_timeout,
            max_errors_per_scraper,
            default_queries,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a comma-separated keyword list into query templates, skipping
/// blank entries.
fn parse_query_list(raw: &str) -> Vec<QueryTemplate> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|keyword| QueryTemplate { keyword: keyword.to_string(), ..Default::default() })
        .collect()
}

fn parse_hh_mm(s: &str) -> Result<(u32, u32)> {
    let (h, m) = s.split_once(':').context("expected HH:MM")?;
    Ok((h.parse().context("hour must be an integer")?, m.parse().context("minute must be an integer")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hh_mm() {
        assert_eq!(parse_hh_mm("02:00").unwrap(), (2, 0));
        assert_eq!(parse_hh_mm("23:59").unwrap(), (23, 59));
    }

    #[test]
    fn rejects_malformed_hh_mm() {
        assert!(parse_hh_mm("0200").is_err());
    }

    #[test]
    fn parses_comma_separated_queries() {
        let queries = parse_query_list("rust engineer, backend engineer ,,senior rust");
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].keyword, "rust engineer");
        assert_eq!(queries[2].keyword, "senior rust");
    }

    #[test]
    fn blank_query_list_yields_no_queries() {
        assert!(parse_query_list("").is_empty());
        assert!(parse_query_list("  , ,").is_empty());
    }
}
