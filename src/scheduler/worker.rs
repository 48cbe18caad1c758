//! Worker pool and write pipeline (spec §4.5 run algorithm steps 3-5).
//!
//! Fan-out over a bounded `tokio::sync::mpsc` task channel generalizes
//! `server::kernel::jobs::runner::JobRunner`'s single poll loop to N
//! concurrent workers; writes are serialized through one writer task to
//! keep the per-fingerprint upsert path simple (spec §5 "write operations
//! are serialized through a single writer").

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ScrapeError;
use crate::models::{QueryTemplate, SourceCounts, UpsertOutcome};
use crate::repository::JobRepository;
use crate::scraper::{Scraper, ScrapeContext};

const TASK_CHANNEL_CAPACITY: usize = 256;
const RECORD_CHANNEL_CAPACITY: usize = 256;
const CONSECUTIVE_REPOSITORY_ERROR_LIMIT: u32 = 5;

type Task = (Arc<dyn Scraper>, QueryTemplate);

struct RecordEvent {
    source: String,
    result: Result<crate::models::PostingRecord, ScrapeError>,
}

pub struct RunOutcome {
    pub per_source: BTreeMap<String, SourceCounts>,
    pub repository_unavailable: bool,
}

/// Resolve the effective query list for one scraper: its own
/// `default_queries()` if non-empty, else the scheduler's configured
/// default list (spec §4.5 step 2).
fn effective_queries(scraper: &dyn Scraper, scheduler_defaults: &[QueryTemplate]) -> Vec<QueryTemplate> {
    let own = scraper.default_queries();
    if own.is_empty() {
        scheduler_defaults.to_vec()
    } else {
        own
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn fan_out(
    scrapers: &[Arc<dyn Scraper>],
    default_queries: &[QueryTemplate],
    client: Arc<crate::http::RateLimitedClient>,
    repo: Arc<dyn JobRepository>,
    worker_count: usize,
    max_records: usize,
    max_pages: usize,
    cancellation: CancellationToken,
) -> RunOutcome {
    let (tasks_tx, tasks_rx) = mpsc::channel::<Task>(TASK_CHANNEL_CAPACITY);
    let (records_tx, records_rx) = mpsc::channel::<RecordEvent>(RECORD_CHANNEL_CAPACITY);

    for scraper in scrapers {
        for query in effective_queries(scraper.as_ref(), default_queries) {
            if tasks_tx.send((scraper.clone(), query)).await.is_err() {
                break;
            }
        }
    }
    drop(tasks_tx);

    let tasks_rx = Arc::new(Mutex::new(tasks_rx));
    let writer = tokio::spawn(writer_loop(records_rx, repo));

    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        workers.push(tokio::spawn(worker_loop(
            tasks_rx.clone(),
            records_tx.clone(),
            client.clone(),
            cancellation.clone(),
            max_records,
            max_pages,
        )));
    }
    drop(records_tx);

    for worker in workers {
        let _ = worker.await;
    }

    writer.await.unwrap_or(RunOutcome { per_source: BTreeMap::new(), repository_unavailable: true })
}

async fn worker_loop(
    tasks_rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    records_tx: mpsc::Sender<RecordEvent>,
    client: Arc<crate::http::RateLimitedClient>,
    cancellation: CancellationToken,
    max_records: usize,
    max_pages: usize,
) {
    loop {
        if cancellation.is_cancelled() {
            return;
        }

        let task = {
            let mut rx = tasks_rx.lock().await;
            rx.recv().await
        };
        let Some((scraper, query)) = task else {
            return;
        };

        let source = scraper.name().to_string();
        let ctx = ScrapeContext {
            client: client.clone(),
            cancellation: cancellation.clone(),
            max_records,
            max_pages,
        };

        let mut stream = scraper.run(query, ctx);
        while let Some(item) = stream.next().await {
            if cancellation.is_cancelled() {
                return;
            }
            if records_tx.send(RecordEvent { source: source.clone(), result: item }).await.is_err() {
                return;
            }
        }
    }
}

async fn writer_loop(mut records_rx: mpsc::Receiver<RecordEvent>, repo: Arc<dyn JobRepository>) -> RunOutcome {
    let mut per_source: BTreeMap<String, SourceCounts> = BTreeMap::new();
    let mut consecutive_repository_errors = 0u32;
    let mut repository_unavailable = false;

    while let Some(event) = records_rx.recv().await {
        let counts = per_source.entry(event.source.clone()).or_default();

        match event.result {
            Ok(record) => {
                counts.found += 1;
                if repository_unavailable {
                    counts.errors += 1;
                    continue;
                }
                match repo.upsert_posting(&record).await {
                    Ok((_, UpsertOutcome::Created)) => {
                        counts.new += 1;
                        consecutive_repository_errors = 0;
                    }
                    Ok((_, UpsertOutcome::Updated)) => {
                        counts.updated += 1;
                        consecutive_repository_errors = 0;
                    }
                    Err(err) => {
                        counts.errors += 1;
                        consecutive_repository_errors += 1;
                        warn!(source = %event.source, error = %err, "upsert failed");
                        if consecutive_repository_errors >= CONSECUTIVE_REPOSITORY_ERROR_LIMIT {
                            repository_unavailable = true;
                        }
                    }
                }
            }
            Err(_) => {
                counts.errors += 1;
            }
        }
    }

    RunOutcome { per_source, repository_unavailable }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_queries_prefers_scraper_defaults() {
        struct Dummy;
        impl Scraper for Dummy {
            fn name(&self) -> &str {
                "dummy"
            }
            fn default_queries(&self) -> Vec<QueryTemplate> {
                vec![QueryTemplate { keyword: "rust".into(), ..Default::default() }]
            }
            fn run<'a>(&'a self, _q: QueryTemplate, _ctx: ScrapeContext) -> crate::scraper::RecordStream<'a> {
                Box::pin(futures::stream::empty())
            }
        }

        let dummy = Dummy;
        let scheduler_defaults = vec![QueryTemplate { keyword: "other".into(), ..Default::default() }];
        let queries = effective_queries(&dummy, &scheduler_defaults);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].keyword, "rust");
    }

    fn posting_record(n: usize) -> crate::models::PostingRecord {
        crate::models::PostingRecord {
            source: "dummy".into(),
            external_id: Some(n.to_string()),
            title: "Engineer".into(),
            company: "Acme".into(),
            location: "Remote".into(),
            apply_url: format!("https://acme.example/{n}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn writer_loop_counts_created_and_updated() {
        let repo: Arc<dyn JobRepository> = Arc::new(crate::repository::mock::MockJobRepository::new());
        let (tx, rx) = mpsc::channel(8);

        tx.send(RecordEvent { source: "dummy".into(), result: Ok(posting_record(1)) }).await.unwrap();
        tx.send(RecordEvent { source: "dummy".into(), result: Ok(posting_record(1)) }).await.unwrap();
        tx.send(RecordEvent { source: "dummy".into(), result: Err(ScrapeError::Extraction { reason: "bad".into() }) })
            .await
            .unwrap();
        drop(tx);

        let outcome = writer_loop(rx, repo).await;
        let counts = outcome.per_source.get("dummy").unwrap();
        assert_eq!(counts.new, 1);
        assert_eq!(counts.updated, 1);
        assert_eq!(counts.errors, 1);
        assert!(!outcome.repository_unavailable);
    }

    #[tokio::test]
    async fn writer_loop_seals_repository_unavailable_after_consecutive_failures() {
        let repo: Arc<dyn JobRepository> =
            Arc::new(crate::repository::mock::MockJobRepository::new().failing_upserts(10));
        let (tx, rx) = mpsc::channel(16);

        for n in 0..(CONSECUTIVE_REPOSITORY_ERROR_LIMIT as usize + 2) {
            tx.send(RecordEvent { source: "dummy".into(), result: Ok(posting_record(n)) }).await.unwrap();
        }
        drop(tx);

        let outcome = writer_loop(rx, repo).await;
        assert!(outcome.repository_unavailable);
        let counts = outcome.per_source.get("dummy").unwrap();
        assert_eq!(counts.errors, CONSECUTIVE_REPOSITORY_ERROR_LIMIT as u64 + 2);
    }
}
