//! Context handed to the parser alongside the page markup

use chrono::{DateTime, Utc};

use crate::domain::derive_product_key;

/// Where and when a page snapshot was taken
#[derive(Debug, Clone)]
pub struct PageContext {
    /// URL the page was requested with
    pub url: String,

    /// Identity key derived from `url`
    pub product_key: String,

    /// Timestamp recorded on the product
    pub scraped_at: DateTime<Utc>,
}

impl PageContext {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            product_key: derive_product_key(url),
            scraped_at: Utc::now(),
        }
    }

    /// Pin the scrape timestamp, mainly for reproducible tests
    pub fn with_scraped_at(mut self, scraped_at: DateTime<Utc>) -> Self {
        self.scraped_at = scraped_at;
        self
    }
}
