//! headless_chrome-backed browser sessions
//!
//! headless_chrome is synchronous, so every call runs on the blocking pool.
//! Each session owns its own Chrome process; dropping the session kills it.

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{BrowserLauncher, PageSession};
use crate::infrastructure::scrape_error::ScrapeError;
use crate::infrastructure::stealth::StealthProfile;

/// Launches one Chrome process per page session
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
    /// Chrome is torn down after this long without protocol traffic
    idle_timeout: Duration,
}

impl ChromeLauncher {
    pub const fn new(headless: bool, idle_timeout: Duration) -> Self {
        Self { headless, idle_timeout }
    }
}

async fn blocking<T, F>(op: F) -> Result<T, ScrapeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ScrapeError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| ScrapeError::Internal(format!("browser task failed: {e}")))?
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn open_page(&self, profile: &StealthProfile) -> Result<Box<dyn PageSession>, ScrapeError> {
        let headless = self.headless;
        let idle_timeout = self.idle_timeout;
        let profile = profile.clone();

        let (browser, tab) = blocking(move || {
            let args: Vec<&OsStr> = profile.launch_args.iter().map(OsStr::new).collect();
            let options = LaunchOptions::default_builder()
                .headless(headless)
                .sandbox(false)
                .window_size(Some(profile.window_size))
                .idle_browser_timeout(idle_timeout)
                .args(args)
                .build()
                .map_err(|e| ScrapeError::browser(format!("invalid launch options: {e}")))?;

            let browser = Browser::new(options)
                .map_err(|e| ScrapeError::browser(format!("failed to launch Chrome: {e}")))?;
            let tab = browser
                .new_tab()
                .map_err(|e| ScrapeError::browser(format!("failed to open tab: {e}")))?;

            if !profile.user_agent.is_empty() {
                tab.set_user_agent(&profile.user_agent, Some(&profile.locale), None)
                    .map_err(ScrapeError::browser)?;
            }

            if let Some(script) = profile.evasion_script {
                tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
                    source: script,
                    world_name: None,
                    include_command_line_api: None,
                    run_immediately: None,
                })
                .map_err(ScrapeError::browser)?;
            }

            Ok((browser, tab))
        })
        .await?;

        debug!("Opened Chrome page session (headless: {})", headless);
        Ok(Box::new(ChromePage {
            browser: Some(browser),
            tab,
        }))
    }
}

/// A tab plus the process that hosts it
pub struct ChromePage {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

#[async_trait]
impl PageSession for ChromePage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        blocking(move || {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| ScrapeError::navigation(&url, e))
        })
        .await
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let selector = selector.to_string();
        blocking(move || match tab.wait_for_element_with_custom_timeout(&selector, timeout) {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!("Selector '{}' not found: {}", selector, e);
                Ok(false)
            }
        })
        .await
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        let tab = Arc::clone(&self.tab);
        blocking(move || tab.get_content().map_err(ScrapeError::browser)).await
    }

    async fn click(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let selector = selector.to_string();
        blocking(move || match tab.find_element(&selector) {
            Ok(element) => element
                .scroll_into_view()
                .and_then(|el| el.click())
                .map(|_| true)
                .map_err(|e| ScrapeError::browser(format!("click on '{selector}' failed: {e}"))),
            Err(_) => Ok(false),
        })
        .await
    }

    async fn is_present(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let selector = selector.to_string();
        blocking(move || Ok(tab.find_element(&selector).is_ok())).await
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };
        let tab = Arc::clone(&self.tab);
        blocking(move || {
            if let Err(e) = tab.close(true) {
                warn!("Failed to close tab cleanly: {}", e);
            }
            // Dropping the last Browser handle terminates the Chrome process
            drop(browser);
            Ok(())
        })
        .await
    }
}
