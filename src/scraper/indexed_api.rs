//! Indexed-API source (spec §4.3.a): paginated GETs against a known search
//! endpoint, walking the JSON response with fixed field paths.

use async_stream::stream;

use crate::error::ScrapeError;
use crate::models::{FieldPaths, PostingRecord, QueryTemplate};
use crate::scraper::{finalize, json_as_string, json_path, RecordStream, Scraper, ScrapeContext};

/// Fixed field paths for one indexed-API source. Unlike the generic
/// scraper's configuration (spec §3), this is wired at construction time
/// rather than loaded from persistent state — the endpoint and shape are
/// known for this specific source.
pub struct IndexedApiScraper {
    name: String,
    base_url: String,
    list_field: String,
    field_paths: FieldPaths,
    page_size_param: &'static str,
    page_param: &'static str,
    query_param: &'static str,
    empty_page_threshold: usize,
}

impl IndexedApiScraper {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, list_field: impl Into<String>, field_paths: FieldPaths) -> Self {
        IndexedApiScraper {
            name: name.into(),
            base_url: base_url.into(),
            list_field: list_field.into(),
            field_paths,
            page_size_param: "per_page",
            page_param: "page",
            query_param: "q",
            empty_page_threshold: 1,
        }
    }

    fn page_url(&self, query: &QueryTemplate, page: u32) -> String {
        let mut url = url::Url::parse(&self.base_url).expect("base_url must be a valid absolute url at construction");
        url.query_pairs_mut()
            .append_pair(self.query_param, &query.keyword)
            .append_pair(self.page_param, &page.to_string())
            .append_pair(self.page_size_param, "50");
        url.to_string()
    }

    fn extract(&self, item: &serde_json::Value) -> Result<PostingRecord, String> {
        let get = |path: &str| json_path(item, path).and_then(json_as_string);

        let title = get(&self.field_paths.title).unwrap_or_default();
        let company = self
            .field_paths
            .company
            .as_deref()
            .and_then(get)
            .unwrap_or_default();
        let location = get(&self.field_paths.location).unwrap_or_default();
        let apply_url = get(&self.field_paths.apply_url).unwrap_or_default();
        let external_id = self.field_paths.external_id.as_deref().and_then(get);
        let posted_at = self
            .field_paths
            .posted_at
            .as_deref()
            .and_then(get)
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));
        let description = self.field_paths.description.as_deref().and_then(get);

        let record = PostingRecord {
            source: self.name.clone(),
            external_id,
            title,
            company,
            location,
            apply_url,
            posted_at,
            description,
            ..Default::default()
        };

        finalize(record)
    }
}

impl Scraper for IndexedApiScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, query: QueryTemplate, ctx: ScrapeContext) -> RecordStream<'a> {
        Box::pin(stream! {
            let max_pages = query.max_pages.unwrap_or(ctx.max_pages as u32).min(ctx.max_pages as u32);
            let mut emitted = 0usize;

            'pages: for page in 1..=max_pages.max(1) {
                if ctx.cancellation.is_cancelled() {
                    break;
                }

                let url = self.page_url(&query, page);
                let response = match ctx.client.get(&url, &ctx.fetch_context()).await {
                    Ok(resp) => resp,
                    Err(err) => {
                        yield Err(ScrapeError::Fetch(err));
                        break 'pages;
                    }
                };

                let parsed: serde_json::Value = match serde_json::from_slice(&response.body) {
                    Ok(v) => v,
                    Err(err) => {
                        yield Err(ScrapeError::Extraction { reason: format!("invalid json: {err}") });
                        break 'pages;
                    }
                };

                let items = match json_path(&parsed, &self.list_field).and_then(|v| v.as_array()) {
                    Some(items) => items,
                    None => break 'pages,
                };

                if items.is_empty() {
                    break 'pages;
                }

                for item in items {
                    if emitted >= ctx.max_records {
                        break 'pages;
                    }
                    match self.extract(item) {
                        Ok(record) => {
                            emitted += 1;
                            yield Ok(record);
                        }
                        Err(reason) => yield Err(ScrapeError::Extraction { reason }),
                    }
                }

                if items.len() < self.empty_page_threshold {
                    break 'pages;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> IndexedApiScraper {
        IndexedApiScraper::new(
            "greenhouse",
            "https://boards-api.example.com/v1/search",
            "jobs",
            FieldPaths {
                external_id: Some("id".into()),
                title: "title".into(),
                company: Some("company.name".into()),
                location: "location.name".into(),
                apply_url: "absolute_url".into(),
                posted_at: Some("updated_at".into()),
                description: Some("content".into()),
            },
        )
    }

    #[test]
    fn extracts_record_from_nested_json() {
        let item = serde_json::json!({
            "id": "123",
            "title": "Senior Engineer",
            "company": {"name": "Acme"},
            "location": {"name": "Remote"},
            "absolute_url": "https://acme.example/jobs/123",
            "updated_at": "2026-01-01T00:00:00Z",
            "content": "Build things."
        });

        let record = scraper().extract(&item).unwrap();
        assert_eq!(record.external_id.as_deref(), Some("123"));
        assert_eq!(record.title, "Senior Engineer");
        assert_eq!(record.company, "Acme");
        assert!(record.posted_at.is_some());
    }

    #[test]
    fn drops_record_missing_title() {
        let item = serde_json::json!({
            "id": "123",
            "company": {"name": "Acme"},
            "location": {"name": "Remote"},
            "absolute_url": "https://acme.example/jobs/123"
        });
        assert!(scraper().extract(&item).is_err());
    }
}
