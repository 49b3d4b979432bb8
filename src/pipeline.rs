//! Scheduler: the main cycle that drives the Store, Validator,
//! Fetchers, Summarizer, Evaluator, and Embedder together on an
//! interval, bounded by a small worker pool.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::embedder::Embedder;
use crate::evaluator::Evaluator;
use crate::fetchers::{self, file::FileFetcher};
use crate::llm::LlmClient;
use crate::models::{Analysis, ContentItem, Priority, Source, SourceKind};
use crate::store::Store;
use crate::summarizer::Summarizer;

pub struct Pipeline {
    store: Store,
}

impl Pipeline {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Run cycles forever until `shutdown` is cancelled. A cycle is
    /// never itself timeout-bounded: a slow LLM call cannot abandon
    /// in-flight analysis.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            let config = match Config::load() {
                Ok(c) => c,
                Err(e) => {
                    error!(error = %e, "failed to load config; sleeping before retry");
                    sleep(Duration::from_secs(30)).await;
                    continue;
                }
            };

            tokio::select! {
                _ = self.run_cycle(&config, &shutdown) => {}
                _ = shutdown.cancelled() => {
                    info!("shutdown requested; stopping before next cycle");
                    return;
                }
            }

            if shutdown.is_cancelled() {
                return;
            }

            tokio::select! {
                _ = sleep(Duration::from_secs(config.daemon.fetch_interval_minutes * 60)) => {}
                _ = shutdown.cancelled() => return,
            }
        }
    }

    async fn run_cycle(&self, config: &Config, shutdown: &CancellationToken) {
        info!("starting fetch cycle");
        let sources = match self.store.list_sources(true).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to list sources");
                return;
            }
        };

        let llm_client = match LlmClient::new(&config.llm) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to construct llm client; skipping analysis this cycle");
                return;
            }
        };
        let summarizer = Arc::new(Summarizer::new(llm_client.clone()));
        let evaluator = Arc::new(Evaluator::new(llm_client.clone()));
        let embedder = Arc::new(Embedder::new(llm_client, self.store.clone()));

        let semaphore = Arc::new(Semaphore::new(config.daemon.worker_pool));
        let mut handles = Vec::with_capacity(sources.len());

        for source in sources {
            if shutdown.is_cancelled() {
                break;
            }
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let summarizer = summarizer.clone();
            let evaluator = evaluator.clone();
            let embedder = embedder.clone();
            let context = config.context.clone();
            let max_items = config.daemon.max_items_per_feed;
            let max_days_lookback = config.daemon.max_days_lookback;
            let shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closes");
                process_source(&store, &summarizer, &evaluator, &embedder, &source, max_items, max_days_lookback, &context, &shutdown).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "source worker task panicked");
            }
        }

        match self.store.cleanup_orphaned_vectors().await {
            Ok(n) if n > 0 => info!(orphans_removed = n, "reconciled orphaned vectors"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "orphan reconciliation failed"),
        }
        info!("fetch cycle complete");
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_source(
    store: &Store,
    summarizer: &Summarizer,
    evaluator: &Evaluator,
    embedder: &Embedder,
    source: &Source,
    max_items: u32,
    max_days_lookback: i64,
    user_context: &str,
    shutdown: &CancellationToken,
) {
    let fetcher = fetchers::fetcher_for(source.kind);
    let records = match fetcher.fetch(source, max_items, max_days_lookback).await {
        Ok(r) => r,
        Err(e) => {
            warn!(source_id = %source.id, url = %source.url, error = %e, "fetch failed");
            let _ = store.mark_source_fetched(&source.id, false, Some(&e.to_string())).await;
            return;
        }
    };

    for record in records {
        if shutdown.is_cancelled() {
            break;
        }
        match store.exists(&source.id, &record.external_id).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "dedup check failed; skipping item");
                continue;
            }
        }

        let summary = match summarizer.summarize(&record.title, &record.url, &record.content, source.kind).await {
            Ok(s) => s,
            Err(e) => {
                warn!(source_id = %source.id, external_id = %record.external_id, error = %e, "summarization failed; skipping item");
                continue;
            }
        };

        let evaluation = match evaluator.evaluate(&record.title, &record.url, &summary.reading_summary, user_context).await {
            Ok(e) => e,
            Err(e) => {
                warn!(source_id = %source.id, external_id = %record.external_id, error = %e, "evaluation failed; skipping item");
                continue;
            }
        };

        let diff = if source.kind == SourceKind::File {
            previous_file_content(store, &source.id, &record.url)
                .await
                .filter(|previous| previous != &record.content)
                .map(|previous| FileFetcher::diff(&previous, &record.content))
        } else {
            None
        };

        let mut item = ContentItem::new(&source.id, &record.external_id, &record.title, &record.url);
        item.content = Some(record.content);
        item.summary = Some(summary.summary);
        item.reading_summary = Some(summary.reading_summary.clone());
        item.priority = Some(evaluation.priority);
        item.published_at = record.published_at;
        item.fetched_at = Some(chrono::Utc::now());
        item.analysis = Some(Analysis {
            entities: summary.entities,
            patterns: summary.patterns,
            alpha_insights: summary.alpha_insights,
            metrics: record.metrics,
            matched_interests: evaluation.matched_interests,
            reasoning: evaluation.reasoning,
            diff,
        });

        let item_id = match store.insert_item(&item).await {
            Ok(id) => id,
            Err(e) => {
                warn!(source_id = %source.id, external_id = %record.external_id, error = %e, "insert failed; skipping item");
                continue;
            }
        };

        if item.priority != Some(Priority::None) {
            embedder
                .embed_item(&item_id, item.reading_summary.as_deref(), item.summary.as_deref())
                .await;
        }
    }

    if let Err(e) = store.mark_source_fetched(&source.id, true, None).await {
        warn!(source_id = %source.id, error = %e, "failed to record successful fetch");
    }
}

async fn previous_file_content(store: &Store, source_id: &str, url: &str) -> Option<String> {
    match store.latest_content_for_url(source_id, url).await {
        Ok(content) => content,
        Err(e) => {
            warn!(source_id, url, error = %e, "failed to look up previous file content; skipping diff");
            None
        }
    }
}

