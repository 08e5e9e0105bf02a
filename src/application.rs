//! Application layer
//!
//! The per-URL scrape driver and the orchestrator that runs it across all
//! target URLs.

pub mod orchestrator;
pub mod scraper_driver;

pub use orchestrator::{CrawlOrchestrator, OrchestratorConfig};
pub use scraper_driver::{DriverPhase, ScraperDriver};
