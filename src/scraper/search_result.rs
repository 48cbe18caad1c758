//! Search-result source (spec §4.3.b): paginated GETs against an HTML
//! search page, walking repeating job-card containers with fixed CSS
//! selectors. Apply URLs are resolved to absolute form against the request
//! URL.

use async_stream::stream;
use scraper::{Html, Selector};

use crate::error::ScrapeError;
use crate::models::{PostingRecord, QueryTemplate};
use crate::scraper::{finalize, RecordStream, Scraper, ScrapeContext};

pub struct SearchResultScraper {
    name: String,
    search_url: String,
    card_selector: String,
    title_selector: String,
    company_selector: String,
    location_selector: String,
    apply_link_selector: String,
    posted_date_selector: Option<String>,
    offset_step: u32,
    min_cards_threshold: usize,
}

impl SearchResultScraper {
    pub fn new(name: impl Into<String>, search_url: impl Into<String>) -> Self {
        SearchResultScraper {
            name: name.into(),
            search_url: search_url.into(),
            card_selector: "div.job-card".into(),
            title_selector: "h2.job-title".into(),
            company_selector: "span.company-name".into(),
            location_selector: "span.job-location".into(),
            apply_link_selector: "a.job-link".into(),
            posted_date_selector: Some("span.posted-date".into()),
            offset_step: 15,
            min_cards_threshold: 1,
        }
    }

    fn page_url(&self, query: &QueryTemplate, offset: u32) -> String {
        let mut url = url::Url::parse(&self.search_url).expect("search_url must be a valid absolute url at construction");
        url.query_pairs_mut()
            .append_pair("q", &query.keyword)
            .append_pair("start", &offset.to_string());
        url.to_string()
    }

    fn extract_card(&self, card: &scraper::ElementRef, page_url: &url::Url) -> Result<PostingRecord, String> {
        let text_of = |selector_str: &str| -> Option<String> {
            let selector = Selector::parse(selector_str).ok()?;
            card.select(&selector).next().map(|el| el.text().collect::<String>())
        };

        let title = text_of(&self.title_selector).unwrap_or_default();
        let company = text_of(&self.company_selector).unwrap_or_default();
        let location = text_of(&self.location_selector).unwrap_or_default();

        let apply_url = Selector::parse(&self.apply_link_selector)
            .ok()
            .and_then(|selector| card.select(&selector).next())
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
            .map(|resolved| resolved.to_string())
            .unwrap_or_default();

        let posted_at = self
            .posted_date_selector
            .as_deref()
            .and_then(text_of)
            .and_then(|raw| dateparse::parse(&raw));

        finalize(PostingRecord {
            source: self.name.clone(),
            title,
            company,
            location,
            apply_url,
            posted_at,
            ..Default::default()
        })
    }
}

impl Scraper for SearchResultScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, query: QueryTemplate, ctx: ScrapeContext) -> RecordStream<'a> {
        Box::pin(stream! {
            let max_pages = query.max_pages.unwrap_or(ctx.max_pages as u32).min(ctx.max_pages as u32).max(1);
            let mut emitted = 0usize;

            'pages: for page_index in 0..max_pages {
                if ctx.cancellation.is_cancelled() {
                    break;
                }

                let offset = page_index * self.offset_step;
                let url_str = self.page_url(&query, offset);
                let Ok(page_url) = url::Url::parse(&url_str) else { break 'pages };

                let response = match ctx.client.get(&url_str, &ctx.fetch_context()).await {
                    Ok(resp) => resp,
                    Err(err) => {
                        yield Err(ScrapeError::Fetch(err));
                        break 'pages;
                    }
                };

                let body = String::from_utf8_lossy(&response.body).into_owned();
                let document = Html::parse_document(&body);
                let Ok(card_selector) = Selector::parse(&self.card_selector) else { break 'pages };
                let cards: Vec<_> = document.select(&card_selector).collect();

                if cards.len() < self.min_cards_threshold {
                    break 'pages;
                }

                for card in &cards {
                    if emitted >= ctx.max_records {
                        break 'pages;
                    }
                    match self.extract_card(card, &page_url) {
                        Ok(record) => {
                            emitted += 1;
                            yield Ok(record);
                        }
                        Err(reason) => yield Err(ScrapeError::Extraction { reason }),
                    }
                }
            }
        })
    }
}

/// Minimal date parser for scraped "posted X ago"/ISO fragments; unparseable
/// input becomes `None` per spec §4.3 ("Extracted date unparseable →
/// `posted_at` is null").
mod dateparse {
    use chrono::{DateTime, Utc};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_html() -> &'static str {
        r#"
        <html><body>
        <div class="job-card">
            <h2 class="job-title">Staff Engineer</h2>
            <span class="company-name">Acme</span>
            <span class="job-location">Remote</span>
            <a class="job-link" href="/jobs/42">Apply</a>
        </div>
        </body></html>
        "#
    }

    #[test]
    fn extracts_card_and_resolves_relative_apply_url() {
        let document = Html::parse_document(sample_html());
        let selector = Selector::parse("div.job-card").unwrap();
        let card = document.select(&selector).next().unwrap();
        let page_url = url::Url::parse("https://boards.example.com/search?q=rust").unwrap();

        let scraper = SearchResultScraper::new("indeed-like", "https://boards.example.com/search");
        let record = scraper.extract_card(&card, &page_url).unwrap();

        assert_eq!(record.title, "Staff Engineer");
        assert_eq!(record.company, "Acme");
        assert_eq!(record.apply_url, "https://boards.example.com/jobs/42");
    }

    #[test]
    fn unparseable_date_becomes_none() {
        assert_eq!(dateparse::parse("3 days ago"), None);
        assert!(dateparse::parse("2026-01-05").is_some());
    }
}
