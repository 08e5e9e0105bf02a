//! # Crawl Orchestrator
//!
//! Runs one task per target URL with bounded concurrency. Each task scrapes
//! its page and persists the result inside a single time budget. A failing,
//! timed-out or panicking task only affects its own URL.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::scraper_driver::ScraperDriver;
use crate::domain::{ErrorKind, RunSummary, UrlOutcome};
use crate::infrastructure::config::ScraperConfig;
use crate::infrastructure::review_store::ReviewStore;
use crate::infrastructure::scrape_error::ScrapeError;

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Product pages processed at the same time
    pub max_concurrent_pages: usize,

    /// Budget for scrape + persist of one URL, counted from when it starts running
    pub task_timeout: Duration,
}

impl OrchestratorConfig {
    pub fn from_scraper(config: &ScraperConfig) -> Self {
        Self {
            max_concurrent_pages: config.max_concurrent_pages.max(1),
            task_timeout: config.task_timeout(),
        }
    }
}

/// Coordinates the driver and the store across all target URLs
pub struct CrawlOrchestrator {
    driver: Arc<ScraperDriver>,
    store: ReviewStore,
    config: OrchestratorConfig,
    cancellation_token: CancellationToken,
}

impl CrawlOrchestrator {
    pub fn new(driver: ScraperDriver, store: ReviewStore, config: OrchestratorConfig) -> Self {
        Self {
            driver: Arc::new(driver),
            store,
            config,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Token that stops every pending and running task when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Crawl every URL and report one outcome per URL, in input order
    pub async fn run(&self, urls: &[String]) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Starting run {} for {} URLs (concurrency {}, task timeout {:?})",
            run_id,
            urls.len(),
            self.config.max_concurrent_pages,
            self.config.task_timeout
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_pages.max(1)));
        let mut tasks = JoinSet::new();

        for (index, url) in urls.iter().enumerate() {
            let task = UrlTask {
                url: url.clone(),
                driver: Arc::clone(&self.driver),
                store: self.store.clone(),
                semaphore: Arc::clone(&semaphore),
                token: self.cancellation_token.clone(),
                timeout: self.config.task_timeout,
            };

            tasks.spawn(async move {
                let url = task.url.clone();
                // Inner spawn turns a panic into a JoinError we can still attribute to this URL
                let outcome = match tokio::spawn(task.run()).await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_panic() => {
                        error!("[{}] Task panicked", url);
                        UrlOutcome::Failed {
                            url,
                            kind: ErrorKind::Internal,
                            message: "task panicked".to_string(),
                        }
                    }
                    Err(e) => UrlOutcome::Failed {
                        url,
                        kind: ErrorKind::Cancelled,
                        message: e.to_string(),
                    },
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<UrlOutcome>> = vec![None; urls.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!("Orchestrator task failed to join: {}", e),
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| UrlOutcome::Failed {
                    url: url.clone(),
                    kind: ErrorKind::Internal,
                    message: "task did not report an outcome".to_string(),
                })
            })
            .collect();

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        log_summary(&summary);
        summary
    }
}

/// Everything one URL task owns
struct UrlTask {
    url: String,
    driver: Arc<ScraperDriver>,
    store: ReviewStore,
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
    timeout: Duration,
}

impl UrlTask {
    async fn run(self) -> UrlOutcome {
        let permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            return failed(self.url, &ScrapeError::Cancelled);
        };

        let started = Instant::now();
        let work = async {
            let scraped = self.driver.scrape(&self.url).await?;
            let report = self.store.persist_scrape(&scraped).await?;
            Ok::<_, ScrapeError>((scraped, report))
        };

        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ScrapeError::Cancelled),
            timed = tokio::time::timeout(self.timeout, work) => {
                timed.unwrap_or_else(|_| Err(ScrapeError::TimedOut(self.timeout.as_secs())))
            }
        };

        match result {
            Ok((scraped, report)) => UrlOutcome::Done {
                url: self.url,
                product_id: report.product.id,
                product_key: report.product.product_key,
                reviews_seen: scraped.reviews.len(),
                reviews_inserted: report.reviews_inserted,
                pages_visited: scraped.pages_visited,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => failed(self.url, &e),
        }
    }
}

fn failed(url: String, error: &ScrapeError) -> UrlOutcome {
    UrlOutcome::Failed {
        url,
        kind: error.kind(),
        message: error.to_string(),
    }
}

fn log_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match outcome {
            UrlOutcome::Done {
                url,
                product_key,
                reviews_seen,
                reviews_inserted,
                pages_visited,
                elapsed_ms,
                ..
            } => info!(
                "DONE   {} [{}] reviews: {} seen, {} new, pages: {}, {} ms",
                url, product_key, reviews_seen, reviews_inserted, pages_visited, elapsed_ms
            ),
            UrlOutcome::Failed { url, kind, message } => {
                warn!("FAILED {} [{}] {}", url, kind, message)
            }
        }
    }
    info!(
        "Run {} finished: {} succeeded, {} failed, {} new reviews",
        summary.run_id,
        summary.succeeded(),
        summary.failed(),
        summary.reviews_inserted()
    );
}
