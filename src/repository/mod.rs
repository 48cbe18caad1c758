//! Job repository interface (C4, spec §4.4): the persistence contract the
//! scheduler depends on. The physical backing store is a collaborator
//! concern; only [`postgres`] is shipped here.

pub mod postgres;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RepositoryResult;
use crate::models::{CareerPageConfig, Posting, PostingFilter, PostingRecord, ScrapeRun, Stats, UpsertOutcome};

pub use postgres::PostgresRepository;

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Atomic upsert by fingerprint (spec §4.4). On insert: assign UUID, set
    /// `first_seen_at = last_seen_at = now`, status `active`. On conflict:
    /// update `last_seen_at = now`, overwrite description and any field
    /// non-empty in `record`; an `expired` posting transitions back to
    /// `active`.
    async fn upsert_posting(&self, record: &PostingRecord) -> RepositoryResult<(Posting, UpsertOutcome)>;

    /// Set status `expired` for `active` postings whose `last_seen_at <
    /// older_than`. Returns the number of rows affected.
    async fn mark_stale(&self, older_than: DateTime<Utc>) -> RepositoryResult<u64>;

    async fn list_career_pages(&self) -> RepositoryResult<Vec<CareerPageConfig>>;

    async fn record_run(&self, run: &ScrapeRun) -> RepositoryResult<()>;

    async fn list_runs(&self, limit: u32) -> RepositoryResult<Vec<ScrapeRun>>;

    async fn stats(&self) -> RepositoryResult<Stats>;

    async fn get_posting(&self, id: Uuid) -> RepositoryResult<Option<Posting>>;

    async fn search_postings(&self, filter: &PostingFilter) -> RepositoryResult<(Vec<Posting>, u64)>;
}
