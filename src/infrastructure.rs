//! Infrastructure layer: configuration, logging, the browser seam, HTML
//! parsing and the SQLite store.

pub mod browser;
pub mod config;
pub mod database_connection;
pub mod logging;
pub mod parsing;
pub mod retry;
pub mod review_store;
pub mod scrape_error;
pub mod stealth;

// Re-export commonly used items
pub use browser::{BrowserLauncher, ChromeLauncher, PageSession};
pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use logging::{init_logging, init_logging_with_config};
pub use parsing::{PageContext, ParsedPage, ProductPageParser};
pub use retry::RetryPolicy;
pub use review_store::{ReviewStore, StoreCounts};
pub use scrape_error::{ParseError, ScrapeError, StorageError};
pub use stealth::StealthProfile;
