//! Scraper abstraction (C3, spec §4.3): "run one search query against one
//! source and yield normalized postings" as a lazy, finite, non-restartable
//! sequence.
//!
//! Grounded on `extraction::traits::ingestor`/`crawlers::crawler`'s
//! trait-object producer pattern, using `async-stream` for the lazy
//! sequence the way the teacher's `async-stream` dependency is described in
//! its own `Cargo.toml` comment ("for streaming scraper results").

pub mod generic;
pub mod indexed_api;
pub mod search_result;

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::ScrapeResult;
use crate::experience;
use crate::http::client::{FetchContext, RateLimitedClient};
use crate::models::{PostingRecord, QueryTemplate};
use crate::text;

/// The lazy finite sequence a scraper emits for one query. Items already
/// inside the stream are either a successfully extracted record or a
/// per-record extraction error (spec §4.3 tie-breaks); the stream simply
/// ends when the source is exhausted, a hard cap is hit, or a terminal
/// fetch error occurs.
pub type RecordStream<'a> = BoxStream<'a, ScrapeResult<PostingRecord>>;

/// Per-run context handed to every scraper invocation.
#[derive(Clone)]
pub struct ScrapeContext {
    pub client: Arc<RateLimitedClient>,
    pub cancellation: CancellationToken,
    /// Hard cap on total emitted records for this run (spec §4.3, default
    /// 250-300, source-specific).
    pub max_records: usize,
    /// Hard cap on pages fetched for this run.
    pub max_pages: usize,
}

impl ScrapeContext {
    pub fn fetch_context(&self) -> FetchContext {
        FetchContext {
            cancellation: self.cancellation.clone(),
            rate_override: None,
        }
    }

    /// Same as [`Self::fetch_context`] but with a per-source rate override
    /// (spec §3 `CareerPageConfig.rate_limit_override`), used by the generic
    /// career-page scraper.
    pub fn fetch_context_with_rate(&self, rate_override: Option<(f64, u32)>) -> FetchContext {
        FetchContext {
            cancellation: self.cancellation.clone(),
            rate_override,
        }
    }
}

/// A source-specific extractor. `name()` is persisted as the posting's
/// `source` tag.
pub trait Scraper: Send + Sync {
    fn name(&self) -> &str;

    /// Queries specific to this source; empty means "use the scheduler's
    /// default query list" (spec §4.5).
    fn default_queries(&self) -> Vec<QueryTemplate> {
        Vec::new()
    }

    fn run<'a>(&'a self, query: QueryTemplate, ctx: ScrapeContext) -> RecordStream<'a>;
}

/// Shape common to all three variants: normalize text, drop records missing
/// a required field (spec §4.3 tie-breaks), and infer experience level when
/// the source didn't report one.
pub fn finalize(mut record: PostingRecord) -> Result<PostingRecord, String> {
    record.title = text::normalize(&record.title);
    record.company = text::normalize(&record.company);
    record.location = text::normalize(&record.location);
    if let Some(description) = &record.description {
        record.description = Some(text::normalize(description));
    }

    if record.title.is_empty() || record.company.is_empty() {
        return Err("missing title or company".to_string());
    }
    if record.apply_url.is_empty() {
        return Err("missing apply_url".to_string());
    }

    if record.experience_level.is_none() {
        record.experience_level = Some(experience::infer(&record.title, record.description.as_deref()));
    }

    Ok(record)
}

/// Walk a dotted path (`"data.jobs"`, `"location.name"`) through a JSON
/// value. Used by the indexed-API variant and the generic scraper's API
/// mode, both of which are configured with dotted-path field selectors
/// (spec §4.3.a, §3 "Career-page configuration" API mode).
pub fn json_path<'v>(value: &'v serde_json::Value, path: &str) -> Option<&'v serde_json::Value> {
    path.split('.').filter(|s| !s.is_empty()).try_fold(value, |current, segment| current.get(segment))
}

/// Coerce a JSON scalar to a string for field extraction; objects/arrays
/// yield `None` since they are never valid leaf values for a posting field.
pub fn json_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_record() -> PostingRecord {
        PostingRecord {
            source: "test".into(),
            title: "  Senior   Engineer ".into(),
            company: "Acme".into(),
            location: "Remote".into(),
            apply_url: "https://acme.example/jobs/1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn finalize_normalizes_and_infers_experience() {
        let record = finalize(base_record()).unwrap();
        assert_eq!(record.title, "Senior Engineer");
        assert!(record.experience_level.is_some());
    }

    #[test]
    fn finalize_drops_missing_title() {
        let mut record = base_record();
        record.title = "   ".into();
        assert!(finalize(record).is_err());
    }

    #[test]
    fn finalize_drops_missing_apply_url() {
        let mut record = base_record();
        record.apply_url = String::new();
        assert!(finalize(record).is_err());
    }

    #[test]
    fn json_path_walks_nested_objects() {
        let value = serde_json::json!({"data": {"jobs": [1, 2, 3]}});
        assert_eq!(json_path(&value, "data.jobs"), Some(&serde_json::json!([1, 2, 3])));
        assert_eq!(json_path(&value, "data.missing"), None);
    }

    #[test]
    fn json_as_string_coerces_scalars() {
        assert_eq!(json_as_string(&serde_json::json!("x")), Some("x".to_string()));
        assert_eq!(json_as_string(&serde_json::json!(42)), Some("42".to_string()));
        assert_eq!(json_as_string(&serde_json::json!([1, 2])), None);
    }
}
