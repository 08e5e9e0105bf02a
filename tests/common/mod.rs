//! Scripted in-memory browser for driver and orchestrator tests
#![allow(dead_code)]

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use review_crawler_lib::infrastructure::config::AppConfig;
use review_crawler_lib::infrastructure::{BrowserLauncher, PageSession, ScrapeError, StealthProfile};

/// How one URL behaves in the fake browser
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    /// Review pages in order; the first one also carries the product markup
    pub pages: Vec<String>,
    /// This many navigations fail before one succeeds
    pub nav_failures: usize,
    /// Primary content never appears
    pub content_missing: bool,
    /// Clicking "next" on these page indexes does nothing the first time
    pub stale_next_on: HashSet<usize>,
    /// After "next" is clicked the old review list stays on screen for one more read
    pub late_render: bool,
    /// Navigation never completes
    pub hang: bool,
    /// Navigation panics
    pub panic: bool,
}

#[derive(Default)]
struct UrlState {
    navigations: usize,
    stale_consumed: HashSet<usize>,
}

/// Browser double that serves scripted pages and counts sessions
#[derive(Clone, Default)]
pub struct FakeBrowser {
    scripts: Arc<HashMap<String, PageScript>>,
    state: Arc<Mutex<HashMap<String, UrlState>>>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeBrowser {
    pub fn new(scripts: impl IntoIterator<Item = (String, PageScript)>) -> Self {
        Self {
            scripts: Arc::new(scripts.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn navigations(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .get(url)
            .map_or(0, |s| s.navigations)
    }

    pub fn open_sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn open_page(&self, _profile: &StealthProfile) -> Result<Box<dyn PageSession>, ScrapeError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            browser: self.clone(),
            url: None,
            page: 0,
            lagging: None,
            closed: false,
        }))
    }
}

struct FakeSession {
    browser: FakeBrowser,
    url: Option<String>,
    page: usize,
    /// Page still rendered while `page` loads
    lagging: Option<usize>,
    closed: bool,
}

impl FakeSession {
    fn script(&self) -> Option<&PageScript> {
        self.url.as_ref().and_then(|u| self.browser.scripts.get(u))
    }

    fn current_html(&self) -> String {
        self.script()
            .and_then(|s| s.pages.get(self.lagging.unwrap_or(self.page)))
            .cloned()
            .unwrap_or_default()
    }

    fn matches(&self, selector: &str) -> bool {
        let Ok(selector) = Selector::parse(selector) else {
            return false;
        };
        let document = Html::parse_document(&self.current_html());
        let found = document.select(&selector).next().is_some();
        found
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if !self.closed {
            self.browser.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        let script = self
            .browser
            .scripts
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::navigation(url, "net::ERR_NAME_NOT_RESOLVED"))?;

        let attempt = {
            let mut state = self.browser.state.lock().unwrap();
            let entry = state.entry(url.to_string()).or_default();
            entry.navigations += 1;
            entry.navigations
        };

        if script.panic {
            panic!("scripted panic while navigating to {url}");
        }
        if script.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if attempt <= script.nav_failures {
            return Err(ScrapeError::navigation(url, "net::ERR_TIMED_OUT"));
        }

        self.url = Some(url.to_string());
        self.page = 0;
        self.lagging = None;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> Result<bool, ScrapeError> {
        if self.script().is_some_and(|s| s.content_missing) {
            return Ok(false);
        }
        Ok(self.matches(selector))
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        let html = self.current_html();
        self.lagging = None;
        Ok(html)
    }

    async fn click(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        if !self.matches(selector) {
            return Ok(false);
        }
        if selector.contains("paginations-next") {
            let url = self.url.clone().unwrap_or_default();
            let stale = self.script().is_some_and(|s| s.stale_next_on.contains(&self.page));
            let mut state = self.browser.state.lock().unwrap();
            let entry = state.entry(url).or_default();
            if stale && entry.stale_consumed.insert(self.page) {
                // First click lands on a stale control, page stays put
                return Ok(true);
            }
            if self.script().is_some_and(|s| s.late_render) {
                self.lagging = Some(self.page);
            }
            self.page += 1;
        }
        Ok(true)
    }

    async fn is_present(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        Ok(self.matches(selector))
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        if !self.closed {
            self.closed = true;
            self.browser.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// One review as it appears in markup
pub struct FakeReview<'a> {
    pub name: &'a str,
    pub rating: u8,
    pub body: &'a str,
}

/// Product page markup with a reviews section and optional next-page control
pub fn product_page(title: &str, price: &str, reviews: &[FakeReview<'_>], has_next: bool) -> String {
    let mut html = format!(
        r#"<html><body>
<h1 class="product-title">{title}</h1>
<div class="seller-store-link"><strong>Acme</strong></div>
<div class="form-option-item is-selected"><strong>{price}</strong></div>
<div class="tab-nav" data-nav="Reviews">Reviews</div>
<div class="comments">"#
    );
    for review in reviews {
        html.push_str(&format!(
            r#"<div class="comments-cell">
  <div class="comments-name">{}</div>
  <div class="comments-title"><i class="rating rating-{}"></i><span class="comments-text">1/15/2025 10:00:00 AM</span></div>
  <div class="comments-content">{}</div>
</div>"#,
            review.name, review.rating, review.body
        ));
    }
    html.push_str("</div>");
    if has_next {
        html.push_str(r##"<a class="paginations-next" href="#">Next</a>"##);
    }
    html.push_str("</body></html>");
    html
}

/// Paginated product with `per_page[i]` distinct reviews on page i
pub fn paginated_pages(title: &str, per_page: &[usize]) -> Vec<String> {
    let mut counter = 0;
    let last = per_page.len().saturating_sub(1);
    per_page
        .iter()
        .enumerate()
        .map(|(i, count)| {
            let bodies: Vec<String> = (0..*count)
                .map(|_| {
                    counter += 1;
                    format!("Review number {counter} for {title}")
                })
                .collect();
            let names: Vec<String> = (0..*count).map(|j| format!("buyer-{i}-{j}")).collect();
            let reviews: Vec<FakeReview<'_>> = bodies
                .iter()
                .zip(&names)
                .map(|(body, name)| FakeReview {
                    name: name.as_str(),
                    rating: 4,
                    body: body.as_str(),
                })
                .collect();
            product_page(title, "$99.99", &reviews, i < last)
        })
        .collect()
}

/// Defaults with every wait and delay shrunk for tests
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.scraper.retry_count = 3;
    config.scraper.retry_delay_ms = 0;
    config.scraper.navigation_timeout_ms = 100;
    config.scraper.content_timeout_ms = 100;
    config.scraper.reviews_timeout_ms = 100;
    config.scraper.pagination_delay_min_ms = 0;
    config.scraper.pagination_delay_max_ms = 0;
    config.scraper.task_timeout_secs = 10;
    config.scraper.max_concurrent_pages = 2;
    config
}
