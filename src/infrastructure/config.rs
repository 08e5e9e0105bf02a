//! Configuration infrastructure
//!
//! Settings are layered in this order, later sources winning:
//! 1. Built-in defaults (the `defaults` module below)
//! 2. Config files: the `--config` path if given, otherwise
//!    `<user config dir>/review-crawler/config.toml` and then
//!    `./review_crawler.toml`, both optional
//! 3. Environment variables such as `REVIEW_CRAWLER__SCRAPER__HEADLESS=false`

use anyhow::{Context, Result, ensure};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "REVIEW_CRAWLER";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Targets, timeouts, retries and pagination limits
    pub scraper: ScraperConfig,

    /// CSS selectors for product, review and dialog elements
    pub selectors: SelectorConfig,

    /// Anti-automation settings handed to the browser
    pub stealth: StealthConfig,

    /// Local database settings
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Scraping behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Product pages to crawl
    pub target_urls: Vec<String>,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Total load attempts (navigation + content wait) per URL
    pub retry_count: u32,

    /// Base delay between load attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Backoff strategy between attempts
    pub retry_backoff: BackoffStrategy,

    /// Upper bound for exponential backoff in milliseconds
    pub max_retry_delay_ms: u64,

    /// Navigation timeout in milliseconds
    pub navigation_timeout_ms: u64,

    /// Wait for the primary content selector in milliseconds
    pub content_timeout_ms: u64,

    /// Wait for the reviews container after opening the reviews tab
    pub reviews_timeout_ms: u64,

    /// Hard cap on review pages visited per product
    pub max_review_pages: u32,

    /// Random pause between review pages, lower bound
    pub pagination_delay_min_ms: u64,

    /// Random pause between review pages, upper bound
    pub pagination_delay_max_ms: u64,

    /// Product pages crawled at the same time
    pub max_concurrent_pages: usize,

    /// Overall budget for one URL (scrape + persist) in seconds
    pub task_timeout_secs: u64,
}

/// How the delay grows between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

/// CSS selectors. Each field lists fallbacks; the first one that matches wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub product: ProductSelectors,
    pub reviews: ReviewSelectors,
    pub dialogs: DialogSelectors,
}

/// Selectors on the product part of the page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSelectors {
    /// Mandatory anchor; a page without it is not a product page
    pub title: Vec<String>,
    pub brand: Vec<String>,
    /// Elements whose text holds the displayed price
    pub price: Vec<String>,
    pub availability: Vec<String>,
    /// Element carrying the aggregate rating in its title, class or text
    pub rating: Vec<String>,
    pub rating_count: Vec<String>,
    /// Bullet items joined into the description
    pub description_items: Vec<String>,
    /// Tab that reveals the reviews section
    pub reviews_tab: Vec<String>,
}

/// Selectors inside the reviews section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSelectors {
    pub container: Vec<String>,
    pub item: Vec<String>,
    pub author: Vec<String>,
    /// Icon whose class carries `rating-N`
    pub rating: Vec<String>,
    pub title: Vec<String>,
    pub body: Vec<String>,
    pub date: Vec<String>,
    pub helpful: Vec<String>,
    pub verified_badge: Vec<String>,
    pub next_page: Vec<String>,
}

/// Close buttons of promotional overlays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogSelectors {
    pub close_buttons: Vec<String>,
}

/// Anti-automation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StealthConfig {
    /// One is picked at random for every page session
    pub user_agents: Vec<String>,

    /// Extra Chrome command-line flags
    pub extra_args: Vec<String>,

    /// Inject the navigator/webdriver evasion script before navigation
    pub evasion_script_enabled: bool,

    pub window_width: u32,
    pub window_height: u32,

    /// Value for `--lang` and `navigator.languages`
    pub locale: String,
}

/// Local database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file path or `sqlite:` URL
    pub database_path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Write JSON lines to the log file
    pub json_format: bool,

    /// Directory for log files
    pub log_dir: String,

    /// Log file name prefix, e.g. "scraper" -> scraper.2026-10-15.log
    pub file_prefix: String,

    /// File rotation period
    pub rotation: LogRotation,

    /// Number of rotated files to keep
    pub max_files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            target_urls: vec![defaults::TARGET_URL.to_string()],
            headless: defaults::HEADLESS,
            retry_count: defaults::RETRY_COUNT,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
            retry_backoff: BackoffStrategy::Fixed,
            max_retry_delay_ms: defaults::MAX_RETRY_DELAY_MS,
            navigation_timeout_ms: defaults::NAVIGATION_TIMEOUT_MS,
            content_timeout_ms: defaults::CONTENT_TIMEOUT_MS,
            reviews_timeout_ms: defaults::REVIEWS_TIMEOUT_MS,
            max_review_pages: defaults::MAX_REVIEW_PAGES,
            pagination_delay_min_ms: defaults::PAGINATION_DELAY_MIN_MS,
            pagination_delay_max_ms: defaults::PAGINATION_DELAY_MAX_MS,
            max_concurrent_pages: defaults::MAX_CONCURRENT_PAGES,
            task_timeout_secs: defaults::TASK_TIMEOUT_SECS,
        }
    }
}

impl ScraperConfig {
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub const fn content_timeout(&self) -> Duration {
        Duration::from_millis(self.content_timeout_ms)
    }

    pub const fn reviews_timeout(&self) -> Duration {
        Duration::from_millis(self.reviews_timeout_ms)
    }

    pub const fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

impl Default for ProductSelectors {
    fn default() -> Self {
        Self {
            title: strings(&["h1.product-title", "h1[itemprop='name']"]),
            brand: strings(&["div.seller-store-link strong", "[itemprop='brand']"]),
            price: strings(&[
                "div.form-option-item.is-selected strong",
                "div.price-current",
                "li.price-current",
                "[itemprop='price']",
            ]),
            availability: strings(&["div.product-inventory strong", "div.product-inventory"]),
            rating: strings(&["div.product-rating > i.rating", "[itemprop='ratingValue']"]),
            rating_count: strings(&["div.product-rating > span.item-rating-num", "[itemprop='reviewCount']"]),
            description_items: strings(&["div.product-bullets ul li"]),
            reviews_tab: strings(&["div.tab-nav[data-nav='Reviews']"]),
        }
    }
}

impl Default for ReviewSelectors {
    fn default() -> Self {
        Self {
            container: strings(&["div.comments"]),
            item: strings(&["div.comments-cell"]),
            author: strings(&["div.comments-name"]),
            rating: strings(&["i[class^='rating rating-']"]),
            title: strings(&["span.comments-title-content"]),
            body: strings(&["div.comments-content"]),
            date: strings(&["div.comments-title > span.comments-text"]),
            helpful: strings(&["div.comments-helpful"]),
            verified_badge: strings(&["div.comments-verified-owner"]),
            next_page: strings(&["a.paginations-next:not(.is-disabled)"]),
        }
    }
}

impl Default for DialogSelectors {
    fn default() -> Self {
        Self {
            close_buttons: strings(&["[aria-label='close']"]),
        }
    }
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            user_agents: strings(defaults::USER_AGENTS),
            extra_args: strings(defaults::STEALTH_ARGS),
            evasion_script_enabled: true,
            window_width: defaults::WINDOW_WIDTH,
            window_height: defaults::WINDOW_HEIGHT,
            locale: defaults::LOCALE.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: defaults::DATABASE_PATH.to_string(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
            busy_timeout_ms: defaults::DB_BUSY_TIMEOUT_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            json_format: defaults::LOG_JSON_FORMAT,
            log_dir: defaults::LOG_DIR.to_string(),
            file_prefix: defaults::LOG_FILE_PREFIX.to_string(),
            rotation: LogRotation::Daily,
            max_files: defaults::LOG_MAX_FILES,
        }
    }
}

impl AppConfig {
    /// Reject settings that would make a run meaningless or loop forever
    pub fn validate(&self) -> Result<()> {
        let s = &self.scraper;
        ensure!(s.retry_count >= 1, "scraper.retry_count must be at least 1");
        ensure!(s.max_review_pages >= 1, "scraper.max_review_pages must be at least 1");
        ensure!(s.max_concurrent_pages >= 1, "scraper.max_concurrent_pages must be at least 1");
        ensure!(s.task_timeout_secs >= 1, "scraper.task_timeout_secs must be at least 1");
        ensure!(
            s.pagination_delay_min_ms <= s.pagination_delay_max_ms,
            "scraper.pagination_delay_min_ms ({}) exceeds pagination_delay_max_ms ({})",
            s.pagination_delay_min_ms,
            s.pagination_delay_max_ms
        );
        ensure!(
            !self.selectors.product.title.is_empty(),
            "selectors.product.title needs at least one selector"
        );
        ensure!(
            !self.stealth.user_agents.is_empty(),
            "stealth.user_agents must list at least one user agent"
        );
        ensure!(self.storage.max_connections >= 1, "storage.max_connections must be at least 1");
        Ok(())
    }
}

/// Loads the layered configuration
pub struct ConfigManager {
    explicit_path: Option<PathBuf>,
}

impl ConfigManager {
    pub const fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Per-user configuration directory
    pub fn get_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("review-crawler"))
    }

    /// Files consulted when no explicit path was given, lowest priority first
    pub fn default_locations() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = Self::get_config_dir() {
            paths.push(dir.join("config.toml"));
        }
        paths.push(PathBuf::from("review_crawler.toml"));
        paths
    }

    pub fn load(&self) -> Result<AppConfig> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&AppConfig::default()).context("Failed to serialize default configuration")?,
        );

        match &self.explicit_path {
            Some(path) => {
                ensure!(path.exists(), "Configuration file not found: {}", path.display());
                builder = builder.add_source(File::from(path.as_path()).required(true));
            }
            None => {
                for path in Self::default_locations() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scraper.target_urls")
                .with_list_parse_key("stealth.user_agents")
                .with_list_parse_key("stealth.extra_args")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Configuration has invalid values")?;

        config.validate()?;
        Ok(config)
    }

    /// Where `load` read its values from, for logging once the subscriber is up
    pub fn source_description(&self) -> String {
        match &self.explicit_path {
            Some(path) => format!("{} + environment", path.display()),
            None => {
                let found: Vec<String> = Self::default_locations()
                    .into_iter()
                    .filter(|path| path.exists())
                    .map(|path| path.display().to_string())
                    .collect();
                if found.is_empty() {
                    "defaults + environment".to_string()
                } else {
                    format!("defaults + {} + environment", found.join(" + "))
                }
            }
        }
    }

    /// Load from a single file on top of the defaults, ignoring the environment
    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let config: AppConfig = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::from(path).required(true))
            .build()
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?
            .try_deserialize()
            .context("Configuration has invalid values")?;
        config.validate()?;
        Ok(config)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Default configuration values
pub mod defaults {
    /// Product page crawled when nothing else is configured
    pub const TARGET_URL: &str = "https://www.newegg.com/amd-ryzen-7-9000-series-ryzen-7-9800x3d-granite-ridge-zen-5-socket-am5-desktop-cpu-processor/p/N82E16819113877";

    pub const HEADLESS: bool = true;

    /// Default load attempts per URL
    pub const RETRY_COUNT: u32 = 3;

    /// Default delay between attempts
    pub const RETRY_DELAY_MS: u64 = 5000;

    pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

    pub const NAVIGATION_TIMEOUT_MS: u64 = 90_000;

    pub const CONTENT_TIMEOUT_MS: u64 = 45_000;

    pub const REVIEWS_TIMEOUT_MS: u64 = 30_000;

    pub const MAX_REVIEW_PAGES: u32 = 50;

    pub const PAGINATION_DELAY_MIN_MS: u64 = 1000;

    pub const PAGINATION_DELAY_MAX_MS: u64 = 2000;

    pub const MAX_CONCURRENT_PAGES: usize = 2;

    pub const TASK_TIMEOUT_SECS: u64 = 600;

    pub const WINDOW_WIDTH: u32 = 1920;

    pub const WINDOW_HEIGHT: u32 = 1080;

    pub const LOCALE: &str = "en-US";

    pub const DATABASE_PATH: &str = "data/products.db";

    pub const DB_MAX_CONNECTIONS: u32 = 4;

    pub const DB_BUSY_TIMEOUT_MS: u64 = 5000;

    // Log configuration defaults
    pub const LOG_LEVEL: &str = "info";

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = true;

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_DIR: &str = "logs";

    pub const LOG_FILE_PREFIX: &str = "scraper";

    pub const LOG_MAX_FILES: usize = 7;

    /// Rotated per page session
    pub const USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0",
    ];

    pub const STEALTH_ARGS: &[&str] = &[
        "--disable-blink-features=AutomationControlled",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-default-apps",
        "--disable-popup-blocking",
        "--disable-extensions",
        "--disable-background-networking",
        "--disable-sync",
        "--disable-translate",
        "--metrics-recording-only",
        "--mute-audio",
        "--no-pings",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scraper.retry_count, defaults::RETRY_COUNT);
        assert!(!config.stealth.user_agents.is_empty());
    }

    #[test]
    fn test_source_description_names_explicit_file() {
        let manager = ConfigManager::new(Some(PathBuf::from("/etc/review-crawler/prod.toml")));
        assert_eq!(
            manager.source_description(),
            "/etc/review-crawler/prod.toml + environment"
        );
        assert!(ConfigManager::new(None).source_description().starts_with("defaults + "));
    }

    #[test]
    fn test_inverted_pagination_delay_is_rejected() {
        let mut config = AppConfig::default();
        config.scraper.pagination_delay_min_ms = 5000;
        config.scraper.pagination_delay_max_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_user_agents_are_rejected() {
        let mut config = AppConfig::default();
        config.stealth.user_agents.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[scraper]
target_urls = ["https://shop.example.com/p/ITEM1234"]
headless = false
max_review_pages = 3
retry_backoff = "exponential"

[storage]
database_path = "tmp/test.db"
"#
        )
        .unwrap();

        let config = ConfigManager::load_file(file.path()).unwrap();
        assert_eq!(config.scraper.target_urls, vec!["https://shop.example.com/p/ITEM1234"]);
        assert!(!config.scraper.headless);
        assert_eq!(config.scraper.max_review_pages, 3);
        assert_eq!(config.scraper.retry_backoff, BackoffStrategy::Exponential);
        assert_eq!(config.storage.database_path, "tmp/test.db");
        // Untouched sections keep their defaults
        assert_eq!(config.scraper.retry_count, defaults::RETRY_COUNT);
        assert_eq!(config.logging.file_prefix, defaults::LOG_FILE_PREFIX);
        assert!(!config.selectors.product.title.is_empty());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let manager = ConfigManager::new(Some(PathBuf::from("/definitely/not/here.toml")));
        assert!(manager.load().is_err());
    }
}
