//! review-crawler - product and review scraper
//!
//! Renders product pages in a headless browser, parses product details and
//! paginated customer reviews, and upserts them into a local SQLite file.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CrawlOrchestrator, OrchestratorConfig, ScraperDriver};
pub use domain::{RunSummary, UrlOutcome};
pub use infrastructure::{AppConfig, ConfigManager, ReviewStore};
