//! Browser seam
//!
//! The driver only needs "open a page, navigate, wait for a selector, read
//! the DOM, click". These traits keep the browser engine swappable; the
//! production implementation lives in [`chrome`], tests script their own.

pub mod chrome;

pub use chrome::ChromeLauncher;

use async_trait::async_trait;
use std::time::Duration;

use crate::infrastructure::scrape_error::ScrapeError;
use crate::infrastructure::stealth::StealthProfile;

/// Starts an isolated page context for one URL
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open_page(&self, profile: &StealthProfile) -> Result<Box<dyn PageSession>, ScrapeError>;
}

/// One rendered page. Dropping a session must release its browser resources.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate and wait for the load to settle
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// `Ok(false)` when the selector did not appear within `timeout`
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScrapeError>;

    /// Current DOM serialized as HTML
    async fn content(&mut self) -> Result<String, ScrapeError>;

    /// Click the first match; `Ok(false)` when nothing matches
    async fn click(&mut self, selector: &str) -> Result<bool, ScrapeError>;

    async fn is_present(&mut self, selector: &str) -> Result<bool, ScrapeError>;

    async fn close(&mut self) -> Result<(), ScrapeError>;
}
