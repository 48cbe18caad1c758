//! Admin HTTP surface handlers (C6, spec §6). Depends only on C4 (via
//! [`AppState::repo`]) and C5 (via [`AppState::scheduler`]).

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::admin::envelope::{ApiError, Envelope, Meta};
use crate::admin::extract::{ValidatedPath, ValidatedQuery};
use crate::error::AggregatorError;
use crate::models::{CareerPageConfig, Posting, PostingFilter, ScrapeRun, Stats};
use crate::repository::JobRepository;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn JobRepository>,
    pub scheduler: Arc<Scheduler>,
    pub started_at: Instant,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub running: bool,
    pub version: &'static str,
    pub uptime_secs: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<Envelope<HealthData>> {
    Json(Envelope::ok(HealthData {
        status: "ok",
        running: state.scheduler.is_running(),
        version: state.version,
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Envelope<Stats>>, ApiError> {
    let stats = state.repo.stats().await.map_err(AggregatorError::from)?;
    Ok(Json(Envelope::ok(stats)))
}

#[derive(serde::Deserialize)]
pub struct RunsQuery {
    limit: Option<u32>,
}

pub async fn runs(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<RunsQuery>,
) -> Result<Json<Envelope<Vec<ScrapeRun>>>, ApiError> {
    let limit = q.limit.unwrap_or(20).min(200);
    let runs = state.repo.list_runs(limit).await.map_err(AggregatorError::from)?;
    Ok(Json(Envelope::ok(runs)))
}

#[derive(Serialize)]
pub struct TriggerAccepted {
    run_id: Uuid,
}

pub async fn trigger(State(state): State<AppState>) -> Result<(StatusCode, Json<Envelope<TriggerAccepted>>), ApiError> {
    let run_id = state.scheduler.trigger_now().await?;
    Ok((StatusCode::ACCEPTED, Json(Envelope::ok(TriggerAccepted { run_id }))))
}

pub async fn jobs(
    State(state): State<AppState>,
    ValidatedQuery(filter): ValidatedQuery<PostingFilter>,
) -> Result<Json<Envelope<Vec<Posting>>>, ApiError> {
    let page = filter.page.unwrap_or(1).max(1);
    let page_size = filter.page_size.unwrap_or(20).min(100);
    let (postings, total) = state.repo.search_postings(&filter).await.map_err(AggregatorError::from)?;
    Ok(Json(Envelope::ok_with_meta(postings, Meta { total, page, page_size })))
}

pub async fn job_detail(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<Json<Envelope<Posting>>, ApiError> {
    let posting = state.repo.get_posting(id).await.map_err(AggregatorError::from)?.ok_or(AggregatorError::NotFound)?;
    Ok(Json(Envelope::ok(posting)))
}

pub async fn career_pages(State(state): State<AppState>) -> Result<Json<Envelope<Vec<CareerPageConfig>>>, ApiError> {
    let pages = state.repo.list_career_pages().await.map_err(AggregatorError::from)?;
    Ok(Json(Envelope::ok(pages)))
}
