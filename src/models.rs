//! Core data model (spec §3): postings, career-page configurations, scrape
//! runs, and the query templates that drive scrapers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    OnSite,
    Remote,
    Hybrid,
    Unknown,
}

impl Default for LocationType {
    fn default() -> Self {
        LocationType::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Lead,
    Executive,
    Unknown,
}

impl Default for ExperienceLevel {
    fn default() -> Self {
        ExperienceLevel::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingStatus {
    Active,
    Expired,
    Filled,
}

/// Output of a scraper before it has been assigned identity or a fingerprint
/// (spec §4.3: "uniform record").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostingRecord {
    pub source: String,
    pub external_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location: String,
    pub location_type: Option<LocationType>,
    pub experience_level: Option<ExperienceLevel>,
    pub employment_type: Option<String>,
    pub description: Option<String>,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: Option<String>,
    pub apply_url: String,
    pub posted_at: Option<DateTime<Utc>>,
}

/// A persisted posting (spec §3 "Posting (Job)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    pub id: Uuid,
    pub fingerprint: Fingerprint,
    pub source: String,
    pub external_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location: String,
    pub location_type: LocationType,
    pub experience_level: ExperienceLevel,
    pub employment_type: Option<String>,
    pub description: Option<String>,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: Option<String>,
    pub apply_url: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub status: PostingStatus,
}

/// Result of one `upsertPosting` call (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// How [`CareerPageConfig`] should be scraped (spec §3 "Career-page
/// configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtractionMode {
    Api {
        endpoint: String,
        list_field: String,
        field_paths: FieldPaths,
    },
    Html {
        job_container_selector: String,
        title_selector: String,
        location_selector: String,
        apply_link_selector: String,
        posted_date_selector: Option<String>,
        next_page_selector: Option<String>,
    },
}

/// Dotted-path selectors used by the API extraction mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldPaths {
    pub external_id: Option<String>,
    pub title: String,
    pub company: Option<String>,
    pub location: String,
    pub apply_url: String,
    pub posted_at: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerPageConfig {
    pub id: Uuid,
    pub company_name: String,
    pub base_url: String,
    pub rate_limit_override: Option<RateLimitOverride>,
    pub mode: ExtractionMode,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitOverride {
    pub requests_per_second: f64,
    pub burst: u32,
}

/// A keyword query, fed to a scraper to drive one enumeration (spec §3
/// "Search query template").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryTemplate {
    pub keyword: String,
    pub location_type: Option<LocationType>,
    pub experience: Option<ExperienceLevel>,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Partial,
    Failed,
}

/// Per-source counters accumulated during one run (spec §3 "Scrape run").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SourceCounts {
    pub found: u64,
    pub new: u64,
    pub updated: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub per_source: std::collections::BTreeMap<String, SourceCounts>,
    pub status: Option<RunStatus>,
    pub error_summary: Option<String>,
}

impl ScrapeRun {
    pub fn new(id: Uuid, started_at: DateTime<Utc>) -> Self {
        ScrapeRun {
            id,
            started_at,
            ended_at: None,
            per_source: std::collections::BTreeMap::new(),
            status: None,
            error_summary: None,
        }
    }
}

/// Aggregate counters returned by `stats()` (spec §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub active_by_source: std::collections::BTreeMap<String, u64>,
}

/// Filters recognized by `GET /admin/jobs` (spec §6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostingFilter {
    pub q: Option<String>,
    pub company: Option<String>,
    pub location_type: Option<LocationType>,
    pub experience: Option<ExperienceLevel>,
    pub status: Option<PostingStatus>,
    pub posted_after: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
