//! Generic career-page source (spec §4.3.c): parameterized by a
//! [`CareerPageConfig`] loaded from persistent state. Two modes: an API mode
//! that walks a configured dotted JSON path, and an HTML mode that applies
//! configured CSS selectors, following a configured next-page link.

use async_stream::stream;
use scraper::{Html, Selector};

use crate::error::ScrapeError;
use crate::models::{CareerPageConfig, ExtractionMode, PostingRecord, QueryTemplate};
use crate::scraper::{finalize, json_as_string, json_path, RecordStream, Scraper, ScrapeContext};

pub struct GenericCareerPageScraper {
    config: CareerPageConfig,
}

impl GenericCareerPageScraper {
    pub fn new(config: CareerPageConfig) -> Self {
        GenericCareerPageScraper { config }
    }

    /// This source's rate-limit override, if the career-page configuration
    /// carries one (spec §3 `CareerPageConfig.rate_limit_override`).
    fn rate_override(&self) -> Option<(f64, u32)> {
        self.config.rate_limit_override.map(|r| (r.requests_per_second, r.burst))
    }

    fn extract_api_item(&self, source: &str, field_paths: &crate::models::FieldPaths, item: &serde_json::Value) -> Result<PostingRecord, String> {
        let get = |path: &str| json_path(item, path).and_then(json_as_string);

        let record = PostingRecord {
            source: source.to_string(),
            external_id: field_paths.external_id.as_deref().and_then(get),
            title: get(&field_paths.title).unwrap_or_default(),
            company: field_paths.company.as_deref().and_then(get).unwrap_or_default(),
            location: get(&field_paths.location).unwrap_or_default(),
            apply_url: get(&field_paths.apply_url).unwrap_or_default(),
            description: field_paths.description.as_deref().and_then(get),
            posted_at: field_paths
                .posted_at
                .as_deref()
                .and_then(get)
                .and_then(|raw| chrono::DateTime::parse_from_rfc3339(&raw).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc)),
            ..Default::default()
        };
        finalize(record)
    }

    fn extract_html_card(
        &self,
        source: &str,
        title_selector: &str,
        location_selector: &str,
        apply_link_selector: &str,
        posted_date_selector: Option<&str>,
        card: &scraper::ElementRef,
        page_url: &url::Url,
        company_name: &str,
    ) -> Result<PostingRecord, String> {
        let text_of = |selector_str: &str| -> Option<String> {
            let selector = Selector::parse(selector_str).ok()?;
            card.select(&selector).next().map(|el| el.text().collect::<String>())
        };

        let title = text_of(title_selector).unwrap_or_default();
        let location = text_of(location_selector).unwrap_or_default();
        let apply_url = Selector::parse(apply_link_selector)
            .ok()
            .and_then(|selector| card.select(&selector).next())
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
            .map(|resolved| resolved.to_string())
            .unwrap_or_default();
        let posted_at = posted_date_selector
            .and_then(text_of)
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));

        finalize(PostingRecord {
            source: source.to_string(),
            title,
            company: company_name.to_string(),
            location,
            apply_url,
            posted_at,
            ..Default::default()
        })
    }
}

impl Scraper for GenericCareerPageScraper {
    fn name(&self) -> &str {
        &self.config.company_name
    }

    fn run<'a>(&'a self, query: QueryTemplate, ctx: ScrapeContext) -> RecordStream<'a> {
        Box::pin(stream! {
            let source = self.config.company_name.clone();
            let max_pages = query.max_pages.unwrap_or(ctx.max_pages as u32).min(ctx.max_pages as u32).max(1);
            let mut emitted = 0usize;
            let rate_override = self.rate_override();

            match &self.config.mode {
                ExtractionMode::Api { endpoint, list_field, field_paths } => {
                    for page in 1..=max_pages {
                        if ctx.cancellation.is_cancelled() {
                            break;
                        }

                        let Ok(mut url) = url::Url::parse(endpoint) else {
                            yield Err(ScrapeError::Configuration { reason: "invalid endpoint url".to_string() });
                            break;
                        };
                        url.query_pairs_mut().append_pair("page", &page.to_string());

                        let response = match ctx.client.get(url.as_str(), &ctx.fetch_context_with_rate(rate_override)).await {
                            Ok(resp) => resp,
                            Err(err) => {
                                yield Err(ScrapeError::Fetch(err));
                                break;
                            }
                        };

                        let parsed: serde_json::Value = match serde_json::from_slice(&response.body) {
                            Ok(v) => v,
                            Err(err) => {
                                yield Err(ScrapeError::Extraction { reason: format!("invalid json: {err}") });
                                break;
                            }
                        };

                        let items = match json_path(&parsed, list_field).and_then(|v| v.as_array()) {
                            Some(items) if !items.is_empty() => items,
                            _ => break,
                        };

                        for item in items {
                            if emitted >= ctx.max_records {
                                break;
                            }
                            match self.extract_api_item(&source, field_paths, item) {
                                Ok(record) => {
                                    emitted += 1;
                                    yield Ok(record);
                                }
                                Err(reason) => yield Err(ScrapeError::Extraction { reason }),
                            }
                        }
                    }
                }
                ExtractionMode::Html {
                    job_container_selector,
                    title_selector,
                    location_selector,
                    apply_link_selector,
                    posted_date_selector,
                    next_page_selector,
                } => {
                    let mut current_url = self.config.base_url.clone();

                    for _ in 0..max_pages {
                        if ctx.cancellation.is_cancelled() {
                            break;
                        }

                        let response = match ctx.client.get(&current_url, &ctx.fetch_context_with_rate(rate_override)).await {
                            Ok(resp) => resp,
                            Err(err) => {
                                yield Err(ScrapeError::Fetch(err));
                                break;
                            }
                        };

                        let Ok(page_url) = url::Url::parse(&current_url) else { break };
                        let body = String::from_utf8_lossy(&response.body).into_owned();
                        let document = Html::parse_document(&body);

                        let Ok(container_selector) = Selector::parse(job_container_selector) else {
                            yield Err(ScrapeError::Configuration { reason: "invalid job_container_selector".to_string() });
                            break;
                        };
                        let cards: Vec<_> = document.select(&container_selector).collect();

                        if cards.is_empty() {
                            break;
                        }

                        for card in &cards {
                            if emitted >= ctx.max_records {
                                break;
                            }
                            match self.extract_html_card(
                                &source,
                                title_selector,
                                location_selector,
                                apply_link_selector,
                                posted_date_selector.as_deref(),
                                card,
                                &page_url,
                                &self.config.company_name,
                            ) {
                                Ok(record) => {
                                    emitted += 1;
                                    yield Ok(record);
                                }
                                Err(reason) => yield Err(ScrapeError::Extraction { reason }),
                            }
                        }

                        let Some(next_selector_str) = next_page_selector.as_deref() else { break };
                        let Ok(next_selector) = Selector::parse(next_selector_str) else { break };
                        let next_href = document
                            .select(&next_selector)
                            .next()
                            .and_then(|el| el.value().attr("href"))
                            .and_then(|href| page_url.join(href).ok());

                        match next_href {
                            Some(next) => current_url = next.to_string(),
                            None => break,
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionMode, FieldPaths, RateLimitOverride};
    use uuid::Uuid;

    fn html_config() -> CareerPageConfig {
        CareerPageConfig {
            id: Uuid::nil(),
            company_name: "Acme".to_string(),
            base_url: "https://acme.example/careers".to_string(),
            rate_limit_override: None::<RateLimitOverride>,
            active: true,
            mode: ExtractionMode::Html {
                job_container_selector: "div.job".to_string(),
                title_selector: "h3".to_string(),
                location_selector: ".loc".to_string(),
                apply_link_selector: "a".to_string(),
                posted_date_selector: None,
                next_page_selector: Some("a.next".to_string()),
            },
        }
    }

    #[test]
    fn api_field_paths_compose_with_dotted_path_helper() {
        let field_paths = FieldPaths {
            external_id: Some("id".into()),
            title: "title".into(),
            company: None,
            location: "loc".into(),
            apply_url: "url".into(),
            posted_at: None,
            description: None,
        };
        let scraper = GenericCareerPageScraper::new(html_config());
        let item = serde_json::json!({"id": "1", "title": "Engineer", "loc": "Remote", "url": "https://acme.example/1"});
        let record = scraper.extract_api_item("Acme", &field_paths, &item).unwrap();
        assert_eq!(record.title, "Engineer");
    }

    #[test]
    fn rate_override_is_none_when_config_has_none() {
        let scraper = GenericCareerPageScraper::new(html_config());
        assert_eq!(scraper.rate_override(), None);
    }

    #[test]
    fn rate_override_carries_config_values() {
        let mut config = html_config();
        config.rate_limit_override = Some(RateLimitOverride { requests_per_second: 0.5, burst: 2 });
        let scraper = GenericCareerPageScraper::new(config);
        assert_eq!(scraper.rate_override(), Some((0.5, 2)));
    }

    #[test]
    fn html_mode_stops_when_no_card_match() {
        let config = html_config();
        let scraper = GenericCareerPageScraper::new(config);
        assert_eq!(scraper.name(), "Acme");
    }
}
