//! PostgreSQL-backed [`JobRepository`] (spec §4.4, §6 persisted state
//! layout). Raw `sqlx::query`/`query_as` calls, matching
//! `extraction::stores::postgres::PostgresStore` and
//! `intelligent-crawler::storage::postgres`'s `INSERT ... ON CONFLICT`
//! upsert style.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::{
    CareerPageConfig, ExperienceLevel, LocationType, Posting, PostingFilter, PostingRecord, PostingStatus,
    RunStatus, ScrapeRun, SourceCounts, Stats, UpsertOutcome,
};

use super::JobRepository;

pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(PostgresRepository { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(sqlx::Error::Migrate(Box::new(e))))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn location_type_str(lt: LocationType) -> &'static str {
    match lt {
        LocationType::OnSite => "on_site",
        LocationType::Remote => "remote",
        LocationType::Hybrid => "hybrid",
        LocationType::Unknown => "unknown",
    }
}

fn location_type_from_str(s: &str) -> LocationType {
    match s {
        "on_site" => LocationType::OnSite,
        "remote" => LocationType::Remote,
        "hybrid" => LocationType::Hybrid,
        _ => LocationType::Unknown,
    }
}

fn experience_str(e: ExperienceLevel) -> &'static str {
    match e {
        ExperienceLevel::Entry => "entry",
        ExperienceLevel::Mid => "mid",
        ExperienceLevel::Senior => "senior",
        ExperienceLevel::Lead => "lead",
        ExperienceLevel::Executive => "executive",
        ExperienceLevel::Unknown => "unknown",
    }
}

fn experience_from_str(s: &str) -> ExperienceLevel {
    match s {
        "entry" => ExperienceLevel::Entry,
        "mid" => ExperienceLevel::Mid,
        "senior" => ExperienceLevel::Senior,
        "lead" => ExperienceLevel::Lead,
        "executive" => ExperienceLevel::Executive,
        _ => ExperienceLevel::Unknown,
    }
}

fn status_str(s: PostingStatus) -> &'static str {
    match s {
        PostingStatus::Active => "active",
        PostingStatus::Expired => "expired",
        PostingStatus::Filled => "filled",
    }
}

fn status_from_str(s: &str) -> PostingStatus {
    match s {
        "expired" => PostingStatus::Expired,
        "filled" => PostingStatus::Filled,
        _ => PostingStatus::Active,
    }
}

fn posting_from_row(row: &sqlx::postgres::PgRow) -> Result<Posting, RepositoryError> {
    let fingerprint_hex: String = row.try_get("fingerprint")?;
    let fingerprint = crate::fingerprint::Fingerprint::from_hex(&fingerprint_hex)
        .map_err(|_| RepositoryError::Database(sqlx::Error::Decode("invalid fingerprint hex".into())))?;

    Ok(Posting {
        id: row.try_get("id")?,
        fingerprint,
        source: row.try_get("source")?,
        external_id: row.try_get("external_id")?,
        title: row.try_get("title")?,
        company: row.try_get("company")?,
        location: row.try_get("location")?,
        location_type: location_type_from_str(row.try_get::<String, _>("location_type")?.as_str()),
        experience_level: experience_from_str(row.try_get::<String, _>("experience_level")?.as_str()),
        employment_type: row.try_get("employment_type")?,
        description: row.try_get("description")?,
        required_skills: row.try_get::<Vec<String>, _>("required_skills")?,
        preferred_skills: row.try_get::<Vec<String>, _>("preferred_skills")?,
        salary_min: row.try_get("salary_min")?,
        salary_max: row.try_get("salary_max")?,
        salary_currency: row.try_get("salary_currency")?,
        apply_url: row.try_get("apply_url")?,
        first_seen_at: row.try_get("first_seen_at")?,
        last_seen_at: row.try_get("last_seen_at")?,
        posted_at: row.try_get("posted_at")?,
        status: status_from_str(row.try_get::<String, _>("status")?.as_str()),
    })
}

#[async_trait]
impl JobRepository for PostgresRepository {
    #[instrument(skip(self, record), fields(source = %record.source))]
    async fn upsert_posting(&self, record: &PostingRecord) -> Result<(Posting, UpsertOutcome), RepositoryError> {
        let fingerprint = crate::fingerprint::Fingerprint::compute(
            &record.source,
            record.external_id.as_deref(),
            &record.title,
            &record.company,
            &record.location,
        );
        let now = Utc::now();
        let id = Uuid::now_v7();
        let location_type = location_type_str(record.location_type.unwrap_or_default());
        let experience_level = experience_str(record.experience_level.unwrap_or_default());

        let row = sqlx::query(
            r#"
            INSERT INTO postings (
                id, fingerprint, source, external_id, title, company, location,
                location_type, experience_level, employment_type, description,
                required_skills, preferred_skills, salary_min, salary_max, salary_currency,
                apply_url, first_seen_at, last_seen_at, posted_at, status
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18, $19, 'active'
            )
            ON CONFLICT (fingerprint) DO UPDATE SET
                last_seen_at = EXCLUDED.last_seen_at,
                description = CASE WHEN EXCLUDED.description IS NOT NULL AND EXCLUDED.description <> '' THEN EXCLUDED.description ELSE postings.description END,
                title = CASE WHEN EXCLUDED.title <> '' THEN EXCLUDED.title ELSE postings.title END,
                company = CASE WHEN EXCLUDED.company <> '' THEN EXCLUDED.company ELSE postings.company END,
                location = CASE WHEN EXCLUDED.location <> '' THEN EXCLUDED.location ELSE postings.location END,
                location_type = CASE WHEN EXCLUDED.location_type <> 'unknown' THEN EXCLUDED.location_type ELSE postings.location_type END,
                experience_level = CASE WHEN EXCLUDED.experience_level <> 'unknown' THEN EXCLUDED.experience_level ELSE postings.experience_level END,
                employment_type = COALESCE(EXCLUDED.employment_type, postings.employment_type),
                required_skills = CASE WHEN array_length(EXCLUDED.required_skills, 1) > 0 THEN EXCLUDED.required_skills ELSE postings.required_skills END,
                preferred_skills = CASE WHEN array_length(EXCLUDED.preferred_skills, 1) > 0 THEN EXCLUDED.preferred_skills ELSE postings.preferred_skills END,
                salary_min = COALESCE(EXCLUDED.salary_min, postings.salary_min),
                salary_max = COALESCE(EXCLUDED.salary_max, postings.salary_max),
                salary_currency = COALESCE(EXCLUDED.salary_currency, postings.salary_currency),
                apply_url = CASE WHEN EXCLUDED.apply_url <> '' THEN EXCLUDED.apply_url ELSE postings.apply_url END,
                posted_at = COALESCE(EXCLUDED.posted_at, postings.posted_at),
                status = CASE WHEN postings.status = 'expired' THEN 'active' ELSE postings.status END
            RETURNING
                id, fingerprint, source, external_id, title, company, location,
                location_type, experience_level, employment_type, description,
                required_skills, preferred_skills, salary_min, salary_max, salary_currency,
                apply_url, first_seen_at, last_seen_at, posted_at, status,
                (xmax = 0) AS inserted
            "#,
        )
        .bind(id)
        .bind(fingerprint.to_hex())
        .bind(&record.source)
        .bind(&record.external_id)
        .bind(&record.title)
        .bind(&record.company)
        .bind(&record.location)
        .bind(location_type)
        .bind(experience_level)
        .bind(&record.employment_type)
        .bind(&record.description)
        .bind(&record.required_skills)
        .bind(&record.preferred_skills)
        .bind(record.salary_min)
        .bind(record.salary_max)
        .bind(&record.salary_currency)
        .bind(&record.apply_url)
        .bind(now)
        .bind(record.posted_at)
        .fetch_one(&self.pool)
        .await?;

        let inserted: bool = row.try_get("inserted")?;
        let posting = posting_from_row(&row)?;
        let outcome = if inserted { UpsertOutcome::Created } else { UpsertOutcome::Updated };
        Ok((posting, outcome))
    }

    async fn mark_stale(&self, older_than: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE postings SET status = 'expired' WHERE status = 'active' AND last_seen_at < $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_career_pages(&self) -> Result<Vec<CareerPageConfig>, RepositoryError> {
        let rows = sqlx::query("SELECT id, company_name, base_url, rate_limit_override, mode, active FROM career_pages WHERE active = true")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let mode_json: serde_json::Value = row.try_get("mode")?;
                let mode = serde_json::from_value(mode_json)
                    .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))?;
                let rate_limit_json: Option<serde_json::Value> = row.try_get("rate_limit_override")?;
                let rate_limit_override = rate_limit_json
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))?;

                Ok(CareerPageConfig {
                    id: row.try_get("id")?,
                    company_name: row.try_get("company_name")?,
                    base_url: row.try_get("base_url")?,
                    rate_limit_override,
                    mode,
                    active: row.try_get("active")?,
                })
            })
            .collect()
    }

    async fn record_run(&self, run: &ScrapeRun) -> Result<(), RepositoryError> {
        let per_source = serde_json::to_value(&run.per_source)
            .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))?;
        let status = run.status.map(|s| match s {
            RunStatus::Ok => "ok",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        });

        sqlx::query(
            r#"
            INSERT INTO scrape_runs (id, started_at, ended_at, per_source, status, error_summary)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                ended_at = EXCLUDED.ended_at,
                per_source = EXCLUDED.per_source,
                status = EXCLUDED.status,
                error_summary = EXCLUDED.error_summary
            "#,
        )
        .bind(run.id)
        .bind(run.started_at)
        .bind(run.ended_at)
        .bind(per_source)
        .bind(status)
        .bind(&run.error_summary)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_runs(&self, limit: u32) -> Result<Vec<ScrapeRun>, RepositoryError> {
        let clamped = limit.min(200);
        let rows = sqlx::query(
            "SELECT id, started_at, ended_at, per_source, status, error_summary FROM scrape_runs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(clamped as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let per_source_json: serde_json::Value = row.try_get("per_source")?;
                let per_source: std::collections::BTreeMap<String, SourceCounts> = serde_json::from_value(per_source_json)
                    .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))?;
                let status: Option<String> = row.try_get("status")?;
                Ok(ScrapeRun {
                    id: row.try_get("id")?,
                    started_at: row.try_get("started_at")?,
                    ended_at: row.try_get("ended_at")?,
                    per_source,
                    status: status.map(|s| match s.as_str() {
                        "partial" => RunStatus::Partial,
                        "failed" => RunStatus::Failed,
                        _ => RunStatus::Ok,
                    }),
                    error_summary: row.try_get("error_summary")?,
                })
            })
            .collect()
    }

    async fn stats(&self) -> Result<Stats, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT count(*) FROM postings").fetch_one(&self.pool).await?;
        let rows = sqlx::query("SELECT source, count(*) AS n FROM postings WHERE status = 'active' GROUP BY source")
            .fetch_all(&self.pool)
            .await?;

        let mut active_by_source = std::collections::BTreeMap::new();
        for row in rows {
            let source: String = row.try_get("source")?;
            let n: i64 = row.try_get("n")?;
            active_by_source.insert(source, n as u64);
        }

        Ok(Stats { total: total as u64, active_by_source })
    }

    async fn get_posting(&self, id: Uuid) -> Result<Option<Posting>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM postings WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(posting_from_row).transpose()
    }

    async fn search_postings(&self, filter: &PostingFilter) -> Result<(Vec<Posting>, u64), RepositoryError> {
        let page = filter.page.unwrap_or(1).max(1);
        let page_size = filter.page_size.unwrap_or(20).min(100).max(1);
        let offset = (page - 1) as i64 * page_size as i64;

        let status = filter.status.map(status_str).unwrap_or("active");
        let location_type = filter.location_type.map(location_type_str);
        let experience = filter.experience.map(experience_str);

        let rows = sqlx::query(
            r#"
            SELECT * FROM postings
            WHERE status = $1
              AND ($2::text IS NULL OR company = $2)
              AND ($3::text IS NULL OR location_type = $3)
              AND ($4::text IS NULL OR experience_level = $4)
              AND ($5::timestamptz IS NULL OR posted_at >= $5)
              AND ($6::text IS NULL OR title ILIKE '%' || $6 || '%')
            ORDER BY last_seen_at DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(status)
        .bind(&filter.company)
        .bind(location_type)
        .bind(experience)
        .bind(filter.posted_after)
        .bind(&filter.q)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let postings = rows.iter().map(posting_from_row).collect::<Result<Vec<_>, _>>()?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT count(*) FROM postings
            WHERE status = $1
              AND ($2::text IS NULL OR company = $2)
              AND ($3::text IS NULL OR location_type = $3)
              AND ($4::text IS NULL OR experience_level = $4)
              AND ($5::timestamptz IS NULL OR posted_at >= $5)
              AND ($6::text IS NULL OR title ILIKE '%' || $6 || '%')
            "#,
        )
        .bind(status)
        .bind(&filter.company)
        .bind(location_type)
        .bind(experience)
        .bind(filter.posted_after)
        .bind(&filter.q)
        .fetch_one(&self.pool)
        .await?;

        Ok((postings, total as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experience_round_trips_through_its_string_form() {
        for level in [
            ExperienceLevel::Entry,
            ExperienceLevel::Mid,
            ExperienceLevel::Senior,
            ExperienceLevel::Lead,
            ExperienceLevel::Executive,
            ExperienceLevel::Unknown,
        ] {
            assert_eq!(experience_from_str(experience_str(level)), level);
        }
    }

    #[test]
    fn location_type_round_trips_through_its_string_form() {
        for lt in [LocationType::OnSite, LocationType::Remote, LocationType::Hybrid, LocationType::Unknown] {
            assert_eq!(location_type_from_str(location_type_str(lt)), lt);
        }
    }

    #[test]
    fn unknown_status_string_falls_back_to_active() {
        assert_eq!(status_from_str("bogus"), PostingStatus::Active);
        assert_eq!(status_from_str("expired"), PostingStatus::Expired);
    }
}
