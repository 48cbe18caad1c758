//! Hand-rolled in-memory [`JobRepository`] test double, in the style of
//! `extraction::testing::MockAI`: plain `Mutex`-guarded state and a direct
//! trait impl rather than a mocking-framework macro.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{RepositoryError, RepositoryResult};
use crate::fingerprint::Fingerprint;
use crate::models::{
    CareerPageConfig, Posting, PostingFilter, PostingRecord, PostingStatus, ScrapeRun, Stats, UpsertOutcome,
};

use super::JobRepository;

#[derive(Default)]
pub struct MockJobRepository {
    postings: Mutex<HashMap<Fingerprint, Posting>>,
    runs: Mutex<Vec<ScrapeRun>>,
    career_pages: Mutex<Vec<CareerPageConfig>>,
    remaining_upsert_failures: Mutex<usize>,
}

impl MockJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next `n` calls to `upsert_posting` to fail, simulating an
    /// unreachable database.
    pub fn failing_upserts(self, n: usize) -> Self {
        *self.remaining_upsert_failures.lock().unwrap() = n;
        self
    }

    pub fn with_career_pages(self, pages: Vec<CareerPageConfig>) -> Self {
        *self.career_pages.lock().unwrap() = pages;
        self
    }

    pub fn posting_count(&self) -> usize {
        self.postings.lock().unwrap().len()
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn upsert_posting(&self, record: &PostingRecord) -> RepositoryResult<(Posting, UpsertOutcome)> {
        {
            let mut remaining = self.remaining_upsert_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RepositoryError::Database(sqlx::Error::RowNotFound));
            }
        }

        let fingerprint = Fingerprint::compute(
            &record.source,
            record.external_id.as_deref(),
            &record.title,
            &record.company,
            &record.location,
        );

        let mut postings = self.postings.lock().unwrap();
        let now = Utc::now();
        let outcome = if let Some(existing) = postings.get_mut(&fingerprint) {
            existing.last_seen_at = now;
            existing.description = record.description.clone();
            existing.status = PostingStatus::Active;
            UpsertOutcome::Updated
        } else {
            let posting = Posting {
                id: Uuid::nil(),
                fingerprint,
                source: record.source.clone(),
                external_id: record.external_id.clone(),
                title: record.title.clone(),
                company: record.company.clone(),
                location: record.location.clone(),
                location_type: record.location_type.unwrap_or_default(),
                experience_level: record.experience_level.unwrap_or_default(),
                employment_type: record.employment_type.clone(),
                description: record.description.clone(),
                required_skills: record.required_skills.clone(),
                preferred_skills: record.preferred_skills.clone(),
                salary_min: record.salary_min,
                salary_max: record.salary_max,
                salary_currency: record.salary_currency.clone(),
                apply_url: record.apply_url.clone(),
                first_seen_at: now,
                last_seen_at: now,
                posted_at: record.posted_at,
                status: PostingStatus::Active,
            };
            postings.insert(fingerprint, posting);
            UpsertOutcome::Created
        };

        Ok((postings.get(&fingerprint).cloned().unwrap(), outcome))
    }

    async fn mark_stale(&self, older_than: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut postings = self.postings.lock().unwrap();
        let mut count = 0u64;
        for posting in postings.values_mut() {
            if posting.status == PostingStatus::Active && posting.last_seen_at < older_than {
                posting.status = PostingStatus::Expired;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_career_pages(&self) -> RepositoryResult<Vec<CareerPageConfig>> {
        Ok(self.career_pages.lock().unwrap().clone())
    }

    async fn record_run(&self, run: &ScrapeRun) -> RepositoryResult<()> {
        let mut runs = self.runs.lock().unwrap();
        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => runs.push(run.clone()),
        }
        Ok(())
    }

    async fn list_runs(&self, limit: u32) -> RepositoryResult<Vec<ScrapeRun>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn stats(&self) -> RepositoryResult<Stats> {
        let postings = self.postings.lock().unwrap();
        let mut active_by_source: BTreeMap<String, u64> = BTreeMap::new();
        for posting in postings.values() {
            if posting.status == PostingStatus::Active {
                *active_by_source.entry(posting.source.clone()).or_insert(0) += 1;
            }
        }
        Ok(Stats { total: postings.len() as u64, active_by_source })
    }

    async fn get_posting(&self, id: Uuid) -> RepositoryResult<Option<Posting>> {
        Ok(self.postings.lock().unwrap().values().find(|p| p.id == id).cloned())
    }

    async fn search_postings(&self, _filter: &PostingFilter) -> RepositoryResult<(Vec<Posting>, u64)> {
        let postings: Vec<Posting> = self.postings.lock().unwrap().values().cloned().collect();
        let total = postings.len() as u64;
        Ok((postings, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(suffix: &str) -> PostingRecord {
        PostingRecord {
            source: "mock".into(),
            external_id: Some(suffix.to_string()),
            title: "Engineer".into(),
            company: "Acme".into(),
            location: "Remote".into(),
            apply_url: format!("https://acme.example/{suffix}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let repo = MockJobRepository::new();
        let (_, first) = repo.upsert_posting(&sample_record("1")).await.unwrap();
        assert_eq!(first, UpsertOutcome::Created);

        let (_, second) = repo.upsert_posting(&sample_record("1")).await.unwrap();
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(repo.posting_count(), 1);
    }

    #[tokio::test]
    async fn failing_upserts_exhausts_then_recovers() {
        let repo = MockJobRepository::new().failing_upserts(2);
        assert!(repo.upsert_posting(&sample_record("1")).await.is_err());
        assert!(repo.upsert_posting(&sample_record("1")).await.is_err());
        assert!(repo.upsert_posting(&sample_record("1")).await.is_ok());
    }

    #[tokio::test]
    async fn mark_stale_only_affects_old_active_postings() {
        let repo = MockJobRepository::new();
        repo.upsert_posting(&sample_record("1")).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(60);
        let affected = repo.mark_stale(cutoff).await.unwrap();
        assert_eq!(affected, 1);

        let affected_again = repo.mark_stale(cutoff).await.unwrap();
        assert_eq!(affected_again, 0, "already-expired postings are not recounted");
    }
}
