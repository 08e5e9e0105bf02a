//! Per-URL crawl results and the run summary built from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::product::{ProductRecord, ProductRef};
use super::review::ReviewRecord;

/// Everything the driver gathered for one product page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub product: ProductRecord,
    /// Deduplicated by natural key, in first-seen order
    pub reviews: Vec<ReviewRecord>,
    pub pages_visited: u32,
}

/// What a single persist call wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistReport {
    pub product: ProductRef,
    pub reviews_inserted: usize,
    pub reviews_updated: usize,
}

/// Failure category surfaced to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network, DNS or timeout while reaching the page
    Navigation,
    /// The primary content selector never appeared
    ContentTimeout,
    /// The page is not recognizable as a product page
    Parse,
    /// Database write or read failure
    Storage,
    /// Browser process could not be launched or driven
    Browser,
    /// The whole task exceeded its time budget
    TimedOut,
    /// Shutdown was requested before the task finished
    Cancelled,
    /// The task panicked
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::ContentTimeout => "content_timeout",
            Self::Parse => "parse",
            Self::Storage => "storage",
            Self::Browser => "browser",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome for one target URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UrlOutcome {
    Done {
        url: String,
        product_id: i64,
        product_key: String,
        reviews_seen: usize,
        reviews_inserted: usize,
        pages_visited: u32,
        elapsed_ms: u64,
    },
    Failed {
        url: String,
        kind: ErrorKind,
        message: String,
    },
}

impl UrlOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Done { url, .. } | Self::Failed { url, .. } => url,
        }
    }

    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Done { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Outcomes of one orchestrator run, in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<UrlOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when every URL reached `Done`
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(UrlOutcome::is_done)
    }

    pub fn reviews_inserted(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                UrlOutcome::Done { reviews_inserted, .. } => *reviews_inserted,
                UrlOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn outcome_for(&self, url: &str) -> Option<&UrlOutcome> {
        self.outcomes.iter().find(|o| o.url() == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(url: &str, inserted: usize) -> UrlOutcome {
        UrlOutcome::Done {
            url: url.to_string(),
            product_id: 1,
            product_key: "K".to_string(),
            reviews_seen: inserted,
            reviews_inserted: inserted,
            pages_visited: 1,
            elapsed_ms: 10,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcomes: vec![
                done("https://a", 3),
                UrlOutcome::Failed {
                    url: "https://b".to_string(),
                    kind: ErrorKind::Navigation,
                    message: "dns".to_string(),
                },
                done("https://c", 2),
            ],
        };

        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_success());
        assert_eq!(summary.reviews_inserted(), 5);
        assert_eq!(
            summary.outcome_for("https://b").and_then(UrlOutcome::error_kind),
            Some(ErrorKind::Navigation)
        );
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(UrlOutcome::Failed {
            url: "https://b".to_string(),
            kind: ErrorKind::ContentTimeout,
            message: "selector".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "content_timeout");
    }
}
