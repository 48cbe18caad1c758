//! Process entrypoint: load configuration, connect to Postgres, run
//! migrations, build the scraper set, wire the scheduler, and serve the
//! admin HTTP surface. Mirrors `server::server::main`'s orchestration order
//! (`tracing_subscriber` init → `Config::from_env` → connect pool → run
//! migrations → build app → bind → serve), extended with a
//! `tokio::signal::ctrl_c()` listener wired to the scheduler's
//! cancellation token and a `tokio-cron-scheduler` daily tick.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use jobwatch::admin::{self, AppState};
use jobwatch::config::Config;
use jobwatch::http::{RateLimitedClient, RobotsRegistry};
use jobwatch::repository::{JobRepository, PostgresRepository};
use jobwatch::scheduler::{Scheduler, SchedulerConfig};
use jobwatch::scraper::generic::GenericCareerPageScraper;
use jobwatch::scraper::indexed_api::IndexedApiScraper;
use jobwatch::scraper::search_result::SearchResultScraper;
use jobwatch::scraper::Scraper;

const ROBOTS_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);
const ROBOTS_FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
const DEFAULT_MAX_RECORDS_PER_RUN: usize = 300;
const DEFAULT_MAX_PAGES_PER_RUN: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,jobwatch=debug,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting job aggregation engine");

    let config = Config::from_env().context("failed to load configuration")?;

    tracing::info!("connecting to database");
    let repository = PostgresRepository::connect(&config.database_url).await.context("failed to connect to database")?;
    repository.run_migrations().await.context("failed to run migrations")?;
    let repo: Arc<dyn JobRepository> = Arc::new(repository);
    tracing::info!("database ready");

    let robots = Arc::new(RobotsRegistry::new(reqwest::Client::new(), ROBOTS_CACHE_TTL, ROBOTS_FETCH_TIMEOUT));
    let client = Arc::new(RateLimitedClient::new(
        robots,
        config.user_agent.clone(),
        config.http_retry_count,
        config.http_backoff_base,
        config.http_request_timeout,
        config.rate_limit_rps,
        config.rate_limit_burst,
    ));

    let scrapers = build_scraper_set(&repo).await?;

    let scheduler_config = SchedulerConfig {
        worker_count: config.worker_count,
        default_queries: config.default_queries.clone(),
        job_stale: config.job_stale,
        daily_tick_at: config.daily_tick_at,
        run_timeout: config.run_timeout,
        max_errors_per_scraper: config.max_errors_per_scraper,
        max_records_per_scraper_run: DEFAULT_MAX_RECORDS_PER_RUN,
        max_pages_per_scraper_run: DEFAULT_MAX_PAGES_PER_RUN,
    };

    let scheduler = Arc::new(Scheduler::new(repo.clone(), scrapers, client, scheduler_config));

    let shutdown = scheduler.shutdown_token();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });

    if config.run_now {
        tracing::info!("RUN_NOW set, triggering an initial run");
        if let Err(err) = scheduler.trigger_now().await {
            tracing::warn!(error = %err, "initial run could not be started");
        }
    }

    let daily_scheduler = spawn_daily_tick(scheduler.clone(), config.daily_tick_at).await?;

    let state = AppState { repo, scheduler, started_at: Instant::now(), version: env!("CARGO_PKG_VERSION") };
    let app = admin::router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await.context("failed to bind admin listener")?;
    tracing::info!(addr = %config.listen_addr, "admin surface listening");

    axum::serve(listener, app).await.context("admin server error")?;

    daily_scheduler.shutdown().await.ok();

    Ok(())
}

async fn build_scraper_set(repo: &Arc<dyn JobRepository>) -> Result<Vec<Arc<dyn Scraper>>> {
    let mut scrapers: Vec<Arc<dyn Scraper>> = vec![
        Arc::new(IndexedApiScraper::new(
            "greenhouse",
            "https://boards-api.greenhouse.io/v1/boards/search/jobs",
            "jobs",
            jobwatch::models::FieldPaths {
                external_id: Some("id".into()),
                title: "title".into(),
                company: Some("company.name".into()),
                location: "location.name".into(),
                apply_url: "absolute_url".into(),
                posted_at: Some("updated_at".into()),
                description: Some("content".into()),
            },
        )),
        Arc::new(SearchResultScraper::new("indeed-like", "https://www.indeed.com/jobs")),
    ];

    let career_pages = repo.list_career_pages().await.context("failed to load career-page configurations")?;
    for config in career_pages {
        scrapers.push(Arc::new(GenericCareerPageScraper::new(config)));
    }

    Ok(scrapers)
}

async fn spawn_daily_tick(scheduler: Arc<Scheduler>, tick_at: (u32, u32)) -> Result<JobScheduler> {
    let cron_scheduler = JobScheduler::new().await.context("failed to build cron scheduler")?;
    let (hour, minute) = tick_at;
    let expression = format!("0 {minute} {hour} * * *");

    let job = Job::new_async(expression.as_str(), move |_uuid, _l| {
        let scheduler = scheduler.clone();
        Box::pin(async move {
            scheduler.run_daily_tick().await;
        })
    })
    .context("failed to build daily tick job")?;

    cron_scheduler.add(job).await.context("failed to register daily tick job")?;
    cron_scheduler.start().await.context("failed to start cron scheduler")?;
    Ok(cron_scheduler)
}
