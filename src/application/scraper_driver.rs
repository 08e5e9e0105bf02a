//! Per-URL scrape driver
//!
//! Moves one product page through
//! `Init -> Navigated -> ContentReady -> (ParsingPage | Paginating)* -> Done | Failed`
//! and always closes the page session on the way out.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::{ReviewRecord, ReviewSet, ScrapeResult};
use crate::infrastructure::browser::{BrowserLauncher, PageSession};
use crate::infrastructure::config::{AppConfig, DialogSelectors, ScraperConfig, StealthConfig};
use crate::infrastructure::parsing::{PageContext, ProductPageParser};
use crate::infrastructure::retry::RetryPolicy;
use crate::infrastructure::scrape_error::{ParseError, ScrapeError};
use crate::infrastructure::stealth::StealthProfile;

/// Where a scrape currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Init,
    Navigated,
    ContentReady,
    /// Reading review page N (1-based)
    ParsingPage(u32),
    /// Moving from review page N to N + 1
    Paginating(u32),
    Done,
    Failed,
}

impl fmt::Display for DriverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Navigated => f.write_str("navigated"),
            Self::ContentReady => f.write_str("content_ready"),
            Self::ParsingPage(n) => write!(f, "parsing_page({n})"),
            Self::Paginating(n) => write!(f, "paginating({n})"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Clicks tried per review page before pagination is considered stuck
const NEXT_PAGE_ATTEMPTS: u32 = 2;

/// Pause between DOM reads while waiting for the next review page
const REVIEW_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn enter(url: &str, phase: DriverPhase) {
    debug!("[{}] -> {}", url, phase);
}

/// CSS selector group matching any of the fallbacks
fn selector_group(selectors: &[String]) -> String {
    selectors.join(", ")
}

/// Identity of the review list currently shown: a digest of its review keys,
/// or of the whole markup when the page has no readable reviews
fn review_fingerprint(reviews: &[ReviewRecord], html: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    if reviews.is_empty() {
        hasher.update(html.as_bytes());
    } else {
        for review in reviews {
            hasher.update(review.review_key.as_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Reviews parsed from one DOM read
struct ReviewSnapshot {
    reviews: Vec<ReviewRecord>,
    fingerprint: String,
}

/// Selectors the driver waits on or clicks, pre-joined
#[derive(Debug, Clone)]
struct InteractionSelectors {
    primary_content: String,
    reviews_tab: Vec<String>,
    reviews_container: String,
    review_item: String,
    next_page: Vec<String>,
    dialogs: DialogSelectors,
}

/// Drives one browser page per URL and hands parsed records back
pub struct ScraperDriver {
    launcher: Arc<dyn BrowserLauncher>,
    parser: ProductPageParser,
    scraper: ScraperConfig,
    stealth: StealthConfig,
    selectors: InteractionSelectors,
    retry: RetryPolicy,
}

impl ScraperDriver {
    pub fn new(config: &AppConfig, launcher: Arc<dyn BrowserLauncher>) -> Result<Self, ParseError> {
        let s = &config.selectors;
        Ok(Self {
            launcher,
            parser: ProductPageParser::new(s)?,
            scraper: config.scraper.clone(),
            stealth: config.stealth.clone(),
            selectors: InteractionSelectors {
                primary_content: selector_group(&s.product.title),
                reviews_tab: s.product.reviews_tab.clone(),
                reviews_container: selector_group(&s.reviews.container),
                review_item: selector_group(&s.reviews.item),
                next_page: s.reviews.next_page.clone(),
                dialogs: s.dialogs.clone(),
            },
            retry: RetryPolicy::from_config(&config.scraper),
        })
    }

    /// Scrape one product page with its paginated reviews
    pub async fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        enter(url, DriverPhase::Init);
        let profile = StealthProfile::random(&self.stealth);
        let mut session = self.launcher.open_page(&profile).await?;

        let result = self.drive(session.as_mut(), url).await;

        if let Err(e) = session.close().await {
            warn!("[{}] Failed to close page session: {}", url, e);
        }

        match &result {
            Ok(scraped) => {
                enter(url, DriverPhase::Done);
                info!(
                    "[{}] Scraped '{}' with {} reviews over {} pages",
                    url,
                    scraped.product.title,
                    scraped.reviews.len(),
                    scraped.pages_visited
                );
            }
            Err(e) => {
                enter(url, DriverPhase::Failed);
                error!("[{}] Scrape failed ({}): {}", url, e.kind(), e);
            }
        }
        result
    }

    async fn drive(&self, session: &mut dyn PageSession, url: &str) -> Result<ScrapeResult, ScrapeError> {
        self.load_with_retry(session, url).await?;
        enter(url, DriverPhase::ContentReady);

        self.dismiss_dialogs(session, url).await;

        let html = session.content().await?;
        let product = self.parser.parse_product(&html, &PageContext::new(url))?;
        debug!("[{}] Parsed product '{}'", url, product.title);

        self.open_reviews_tab(session, url).await;

        let (reviews, pages_visited) = self.collect_reviews(session, url).await?;
        Ok(ScrapeResult {
            product,
            reviews: reviews.into_vec(),
            pages_visited,
        })
    }

    /// Navigation plus the primary content wait, retried as one unit
    async fn load_with_retry(&self, session: &mut dyn PageSession, url: &str) -> Result<(), ScrapeError> {
        let mut attempt = 1;
        loop {
            match self.load_once(session, url).await {
                Ok(()) => return Ok(()),
                Err(e) => match self.retry.retry_delay(attempt, &e) {
                    Some(delay) => {
                        warn!(
                            "[{}] Load attempt {}/{} failed: {}. Retrying in {:?}",
                            url, attempt, self.retry.max_attempts, e, delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        if e.is_retryable() {
                            error!("[{}] Giving up after {} load attempts", url, attempt);
                        }
                        return Err(e);
                    }
                },
            }
        }
    }

    async fn load_once(&self, session: &mut dyn PageSession, url: &str) -> Result<(), ScrapeError> {
        session.navigate(url, self.scraper.navigation_timeout()).await?;
        enter(url, DriverPhase::Navigated);

        let timeout = self.scraper.content_timeout();
        if session
            .wait_for_selector(&self.selectors.primary_content, timeout)
            .await?
        {
            Ok(())
        } else {
            Err(ScrapeError::content_timeout(
                &self.selectors.primary_content,
                timeout.as_millis() as u64,
            ))
        }
    }

    /// Close promotional overlays; failures here never fail the scrape
    async fn dismiss_dialogs(&self, session: &mut dyn PageSession, url: &str) {
        for selector in &self.selectors.dialogs.close_buttons {
            match session.click(selector).await {
                Ok(true) => debug!("[{}] Dismissed dialog via '{}'", url, selector),
                Ok(false) => {}
                Err(e) => debug!("[{}] Could not dismiss dialog '{}': {}", url, selector, e),
            }
        }
    }

    async fn open_reviews_tab(&self, session: &mut dyn PageSession, url: &str) {
        for selector in &self.selectors.reviews_tab {
            match session.click(selector).await {
                Ok(true) => {
                    let appeared = session
                        .wait_for_selector(&self.selectors.reviews_container, self.scraper.reviews_timeout())
                        .await
                        .unwrap_or(false);
                    if !appeared {
                        warn!("[{}] Reviews container did not appear after opening the tab", url);
                    }
                    return;
                }
                Ok(false) => {}
                Err(e) => warn!("[{}] Clicking reviews tab '{}' failed: {}", url, selector, e),
            }
        }
        debug!("[{}] No reviews tab found, reading reviews in place", url);
    }

    async fn collect_reviews(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<(ReviewSet, u32), ScrapeError> {
        let mut reviews = ReviewSet::new();
        let mut page = 0;
        let mut current = self.snapshot(&session.content().await?);

        loop {
            page += 1;
            enter(url, DriverPhase::ParsingPage(page));

            let seen = current.reviews.len();
            let fingerprint = current.fingerprint;
            let added = reviews.merge(current.reviews);
            info!("[{}] Review page {}: {} reviews, {} new", url, page, seen, added);

            if page >= self.scraper.max_review_pages {
                if self.next_page_present(session).await {
                    warn!(
                        "[{}] Stopping at the review page cap ({}); more pages remain",
                        url, self.scraper.max_review_pages
                    );
                }
                break;
            }

            match self.advance_page(session, url, page, &fingerprint).await? {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok((reviews, page))
    }

    /// Click "next" and wait until the review list differs from `fingerprint`.
    /// A click that leaves the list unchanged is retried once; `None` ends pagination.
    async fn advance_page(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        page: u32,
        fingerprint: &str,
    ) -> Result<Option<ReviewSnapshot>, ScrapeError> {
        for attempt in 1..=NEXT_PAGE_ATTEMPTS {
            if !self.click_next_page(session, url).await? {
                debug!("[{}] No next-page control, pagination finished", url);
                return Ok(None);
            }
            enter(url, DriverPhase::Paginating(page));

            tokio::time::sleep(self.pagination_pause()).await;

            if let Some(next) = self.wait_for_new_reviews(session, fingerprint).await? {
                return Ok(Some(next));
            }
            warn!(
                "[{}] Reviews did not change after clicking next on page {} (attempt {}/{})",
                url, page, attempt, NEXT_PAGE_ATTEMPTS
            );
        }
        warn!("[{}] Pagination stuck on page {}, stopping", url, page);
        Ok(None)
    }

    /// Poll the DOM until it shows a review list other than `fingerprint`, bounded by the reviews timeout
    async fn wait_for_new_reviews(
        &self,
        session: &mut dyn PageSession,
        fingerprint: &str,
    ) -> Result<Option<ReviewSnapshot>, ScrapeError> {
        let deadline = Instant::now() + self.scraper.reviews_timeout();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if session
                .wait_for_selector(&self.selectors.review_item, remaining)
                .await?
            {
                let snapshot = self.snapshot(&session.content().await?);
                if snapshot.fingerprint != fingerprint {
                    return Ok(Some(snapshot));
                }
            }
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::time::sleep(REVIEW_POLL_INTERVAL.min(remaining)).await;
        }
    }

    fn snapshot(&self, html: &str) -> ReviewSnapshot {
        let reviews = self.parser.parse_reviews(html);
        let fingerprint = review_fingerprint(&reviews, html);
        ReviewSnapshot { reviews, fingerprint }
    }

    async fn next_page_present(&self, session: &mut dyn PageSession) -> bool {
        for selector in &self.selectors.next_page {
            if session.is_present(selector).await.unwrap_or(false) {
                return true;
            }
        }
        false
    }

    async fn click_next_page(&self, session: &mut dyn PageSession, url: &str) -> Result<bool, ScrapeError> {
        for selector in &self.selectors.next_page {
            if session.click(selector).await? {
                debug!("[{}] Clicked next page via '{}'", url, selector);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn pagination_pause(&self) -> Duration {
        let min = self.scraper.pagination_delay_min_ms;
        let max = self.scraper.pagination_delay_max_ms.max(min);
        Duration::from_millis(fastrand::u64(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(DriverPhase::ParsingPage(2).to_string(), "parsing_page(2)");
        assert_eq!(DriverPhase::ContentReady.to_string(), "content_ready");
    }

    #[test]
    fn test_fingerprint_follows_review_keys() {
        let review = |body: &str| {
            ReviewRecord::from_fields(crate::domain::ReviewFields {
                body: body.to_string(),
                ..Default::default()
            })
        };
        let page_one = vec![review("first"), review("second")];
        let page_two = vec![review("third")];

        assert_eq!(
            review_fingerprint(&page_one, "<html>a</html>"),
            review_fingerprint(&page_one, "<html>b</html>")
        );
        assert_ne!(
            review_fingerprint(&page_one, "<html></html>"),
            review_fingerprint(&page_two, "<html></html>")
        );
        assert_ne!(review_fingerprint(&[], "<p>a</p>"), review_fingerprint(&[], "<p>b</p>"));
    }

    #[test]
    fn test_selector_group_joins_fallbacks() {
        let group = selector_group(&["h1.a".to_string(), "h1[itemprop='name']".to_string()]);
        assert_eq!(group, "h1.a, h1[itemprop='name']");
    }
}
