//! Scheduler (C5, spec §4.5): owns the run lifecycle, query fan-out, worker
//! pool, write pipeline, staleness sweep, daily tick, and trigger-now.
//!
//! The lifecycle/shutdown shape is grounded on
//! `server::kernel::jobs::runner::JobRunner` (an `AtomicBool` exclusion flag
//! plus a poll loop), generalized from "one poller" to "fan out across a
//! worker pool, then seal a run record" and from an `AtomicBool` shutdown
//! flag to a [`tokio_util::sync::CancellationToken`] so cancellation can
//! propagate into in-flight HTTP waits (spec §5).

pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AggregatorError;
use crate::http::RateLimitedClient;
use crate::models::{QueryTemplate, RunStatus, ScrapeRun};
use crate::repository::JobRepository;
use crate::scraper::Scraper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduling,
    Running,
    Finalizing,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    pub default_queries: Vec<QueryTemplate>,
    pub job_stale: Duration,
    pub daily_tick_at: (u32, u32),
    pub run_timeout: Duration,
    pub max_errors_per_scraper: u32,
    pub max_records_per_scraper_run: usize,
    pub max_pages_per_scraper_run: usize,
}

pub struct Scheduler {
    repo: Arc<dyn JobRepository>,
    scrapers: Vec<Arc<dyn Scraper>>,
    client: Arc<RateLimitedClient>,
    config: SchedulerConfig,
    is_running: Arc<AtomicBool>,
    state: Arc<RwLock<SchedulerState>>,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        scrapers: Vec<Arc<dyn Scraper>>,
        client: Arc<RateLimitedClient>,
        config: SchedulerConfig,
    ) -> Self {
        Scheduler {
            repo,
            scrapers,
            client,
            config,
            is_running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Handle used by `main` to wire `tokio::signal::ctrl_c()` to scheduler
    /// shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// `idle → (trigger) → scheduling`. Rejects with `AlreadyRunning` and
    /// never queues if a run is already non-idle (spec §4.5).
    pub async fn trigger_now(self: &Arc<Self>) -> Result<Uuid, AggregatorError> {
        if self.is_running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(AggregatorError::AlreadyRunning);
        }

        let run_id = Uuid::now_v7();
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.execute_run(run_id).await;
        });
        Ok(run_id)
    }

    /// A single logical timer fires at `dailyTickAt`; skipped and logged if
    /// the scheduler isn't idle (spec §4.5 "Daily tick").
    pub async fn run_daily_tick(self: &Arc<Self>) {
        match self.trigger_now().await {
            Ok(run_id) => info!(%run_id, "daily tick started a run"),
            Err(_) => warn!("daily tick skipped: a run is already in progress"),
        }
    }

    async fn execute_run(self: Arc<Self>, run_id: Uuid) {
        *self.state.write().await = SchedulerState::Scheduling;

        let started_at = Utc::now();
        let mut run = ScrapeRun::new(run_id, started_at);
        if let Err(err) = self.repo.record_run(&run).await {
            warn!(%run_id, error = %err, "failed to record run start");
        }

        let run_cancel = self.shutdown.child_token();
        let timeout_token = run_cancel.clone();
        let run_timeout = self.config.run_timeout;
        let timeout_guard = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(run_timeout) => timeout_token.cancel(),
                _ = timeout_token.cancelled() => {}
            }
        });

        *self.state.write().await = SchedulerState::Running;

        let scrapers = self.scrapers.clone();
        let outcome = worker::fan_out(
            &scrapers,
            &self.config.default_queries,
            self.client.clone(),
            self.repo.clone(),
            self.config.worker_count,
            self.config.max_records_per_scraper_run,
            self.config.max_pages_per_scraper_run,
            run_cancel.clone(),
        )
        .await;

        timeout_guard.abort();

        *self.state.write().await = SchedulerState::Finalizing;

        let cancelled = run_cancel.is_cancelled();

        let stale_count = if cancelled {
            None
        } else {
            match self.repo.mark_stale(Utc::now() - self.config.job_stale).await {
                Ok(count) => Some(count),
                Err(err) => {
                    warn!(%run_id, error = %err, "staleness sweep failed");
                    None
                }
            }
        };

        let any_scraper_over_cap = outcome
            .per_source
            .values()
            .any(|counts| counts.errors as u32 > self.config.max_errors_per_scraper);

        run.status = Some(if cancelled {
            RunStatus::Failed
        } else if outcome.repository_unavailable {
            RunStatus::Failed
        } else if any_scraper_over_cap {
            RunStatus::Partial
        } else {
            RunStatus::Ok
        });

        run.ended_at = Some(Utc::now());
        run.per_source = outcome.per_source;
        run.error_summary = match run.status {
            Some(RunStatus::Failed) if cancelled => Some("cancelled".to_string()),
            Some(RunStatus::Failed) => Some("repository unavailable".to_string()),
            Some(RunStatus::Partial) => Some("one or more scrapers exceeded their error cap".to_string()),
            _ => None,
        };

        if let Err(err) = self.repo.record_run(&run).await {
            warn!(%run_id, error = %err, "failed to seal run");
        }

        info!(%run_id, status = ?run.status, stale_count = ?stale_count, "run finished");

        *self.state.write().await = SchedulerState::Idle;
        self.is_running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_state_starts_idle() {
        assert_eq!(SchedulerState::Idle, SchedulerState::Idle);
    }
}
