//! Product page parser
//!
//! Turns a rendered product page into a [`ProductRecord`] and the reviews
//! visible on it. Every selector field holds fallbacks tried in order; the
//! first one that yields a non-empty value wins. Only the title is required.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::context::PageContext;
use super::field_extractors::{
    clean_text, detect_currency, parse_count, parse_price, parse_rating, parse_review_date,
    rating_from_class,
};
use super::{ContextualParser, ParsedPage};
use crate::domain::{Availability, ProductRecord, ReviewFields, ReviewRecord};
use crate::infrastructure::config::SelectorConfig;
use crate::infrastructure::scrape_error::ParseError;

/// A compiled fallback list that remembers its source strings for error messages
#[derive(Debug, Clone)]
struct SelectorChain {
    sources: Vec<String>,
    compiled: Vec<Selector>,
}

impl SelectorChain {
    fn compile(field: &str, sources: &[String]) -> Result<Self, ParseError> {
        let compiled = sources
            .iter()
            .map(|s| Selector::parse(s).map_err(|e| ParseError::invalid_selector(field, s, e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sources: sources.to_vec(),
            compiled,
        })
    }

    /// First element matched by the first selector that matches anything
    fn first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.compiled.iter().find_map(|sel| scope.select(sel).next())
    }

    /// All elements of the first selector that matches anything
    fn all<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.compiled
            .iter()
            .map(|sel| scope.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    /// First non-blank text across all selectors
    fn text(&self, scope: ElementRef<'_>) -> Option<String> {
        self.compiled
            .iter()
            .flat_map(|sel| scope.select(sel))
            .find_map(|el| element_text(&el))
    }
}

fn element_text(el: &ElementRef<'_>) -> Option<String> {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Parser for product pages with compiled selectors
#[derive(Debug, Clone)]
pub struct ProductPageParser {
    title: SelectorChain,
    brand: SelectorChain,
    price: SelectorChain,
    availability: SelectorChain,
    rating: SelectorChain,
    rating_count: SelectorChain,
    description_items: SelectorChain,

    review_container: SelectorChain,
    review_item: SelectorChain,
    review_author: SelectorChain,
    review_rating: SelectorChain,
    review_title: SelectorChain,
    review_body: SelectorChain,
    review_date: SelectorChain,
    review_helpful: SelectorChain,
    review_verified: SelectorChain,
}

impl ProductPageParser {
    /// Compile all selectors; an invalid selector is a configuration error
    pub fn new(selectors: &SelectorConfig) -> Result<Self, ParseError> {
        let p = &selectors.product;
        let r = &selectors.reviews;
        Ok(Self {
            title: SelectorChain::compile("product.title", &p.title)?,
            brand: SelectorChain::compile("product.brand", &p.brand)?,
            price: SelectorChain::compile("product.price", &p.price)?,
            availability: SelectorChain::compile("product.availability", &p.availability)?,
            rating: SelectorChain::compile("product.rating", &p.rating)?,
            rating_count: SelectorChain::compile("product.rating_count", &p.rating_count)?,
            description_items: SelectorChain::compile("product.description_items", &p.description_items)?,

            review_container: SelectorChain::compile("reviews.container", &r.container)?,
            review_item: SelectorChain::compile("reviews.item", &r.item)?,
            review_author: SelectorChain::compile("reviews.author", &r.author)?,
            review_rating: SelectorChain::compile("reviews.rating", &r.rating)?,
            review_title: SelectorChain::compile("reviews.title", &r.title)?,
            review_body: SelectorChain::compile("reviews.body", &r.body)?,
            review_date: SelectorChain::compile("reviews.date", &r.date)?,
            review_helpful: SelectorChain::compile("reviews.helpful", &r.helpful)?,
            review_verified: SelectorChain::compile("reviews.verified_badge", &r.verified_badge)?,
        })
    }

    /// Parse product fields from page markup
    pub fn parse_product(&self, html: &str, ctx: &PageContext) -> Result<ProductRecord, ParseError> {
        let document = Self::document(html)?;
        self.parse_with_context(&document, ctx)
    }

    /// Parse the reviews visible in the markup. Never fails; unusable items are skipped.
    pub fn parse_reviews(&self, html: &str) -> Vec<ReviewRecord> {
        if html.trim().is_empty() {
            return Vec::new();
        }
        self.extract_reviews(&Html::parse_document(html))
    }

    /// Product and reviews from one snapshot
    pub fn parse_page(&self, html: &str, ctx: &PageContext) -> Result<ParsedPage, ParseError> {
        let document = Self::document(html)?;
        let product = self.parse_with_context(&document, ctx)?;
        let reviews = self.extract_reviews(&document);
        Ok(ParsedPage { product, reviews })
    }

    fn document(html: &str) -> Result<Html, ParseError> {
        if html.trim().is_empty() {
            return Err(ParseError::EmptyDocument);
        }
        Ok(Html::parse_document(html))
    }

    /// Price from the first candidate whose text parses to a number; a
    /// candidate showing a currency marker beats one that does not.
    fn extract_price(&self, root: ElementRef<'_>) -> (Option<f64>, Option<String>, Option<String>) {
        let candidates: Vec<String> = self
            .price
            .compiled
            .iter()
            .flat_map(|sel| root.select(sel))
            .filter_map(|el| element_text(&el))
            .filter(|text| parse_price(text).is_some())
            .collect();

        let chosen = candidates
            .iter()
            .find(|text| detect_currency(text).is_some())
            .or_else(|| candidates.first());

        match chosen {
            Some(text) => (
                parse_price(text),
                detect_currency(text).map(str::to_string),
                Some(text.clone()),
            ),
            None => (None, None, None),
        }
    }

    fn extract_rating(&self, root: ElementRef<'_>) -> Option<f64> {
        let el = self.rating.first(root)?;
        let attrs = el.value();
        ["title", "aria-label", "content", "data-rating"]
            .iter()
            .filter_map(|name| attrs.attr(name))
            .find_map(parse_rating)
            .or_else(|| attrs.attr("class").and_then(rating_from_class).map(f64::from))
            .or_else(|| element_text(&el).as_deref().and_then(parse_rating))
    }

    fn extract_description(&self, root: ElementRef<'_>) -> Option<String> {
        let lines: Vec<String> = self
            .description_items
            .all(root)
            .iter()
            .filter_map(element_text)
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    fn extract_reviews(&self, document: &Html) -> Vec<ReviewRecord> {
        let root = document.root_element();
        let scope = self.review_container.first(root).unwrap_or(root);

        let items = self.review_item.all(scope);
        let mut reviews = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match self.extract_review(item) {
                Some(review) => reviews.push(review),
                None => debug!("Skipping review item {} without a body", index),
            }
        }
        reviews
    }

    fn extract_review(&self, item: ElementRef<'_>) -> Option<ReviewRecord> {
        let body = self.review_body.text(item)?;

        let rating = self.review_rating.first(item).and_then(|el| {
            el.value()
                .attr("class")
                .and_then(rating_from_class)
                .or_else(|| el.value().attr("title").and_then(parse_rating).map(|r| r.round() as u8))
        });
        let date_raw = self.review_date.text(item);

        Some(ReviewRecord::from_fields(ReviewFields {
            reviewer_name: self.review_author.text(item),
            rating,
            title: self.review_title.text(item),
            body,
            review_date: date_raw.as_deref().and_then(parse_review_date),
            date_raw,
            helpful_votes: self.review_helpful.text(item).as_deref().and_then(parse_count),
            verified_buyer: self.review_verified.first(item).is_some(),
        }))
    }
}

impl ContextualParser for ProductPageParser {
    type Output = ProductRecord;
    type Context = PageContext;

    fn parse_with_context(&self, html: &Html, ctx: &Self::Context) -> Result<Self::Output, ParseError> {
        let root = html.root_element();

        let title = self
            .title
            .text(root)
            .ok_or_else(|| ParseError::unrecognized_page(&self.title.sources))?;
        debug!("Parsing product '{}' from {}", title, ctx.url);

        let (price, currency, price_text) = self.extract_price(root);
        let availability = self
            .availability
            .text(root)
            .map(|text| Availability::classify(&text))
            .unwrap_or_default();

        Ok(ProductRecord {
            product_key: ctx.product_key.clone(),
            url: ctx.url.clone(),
            title,
            brand: self.brand.text(root),
            price,
            currency,
            price_text,
            availability,
            rating: self.extract_rating(root),
            rating_count: self.rating_count.text(root).as_deref().and_then(parse_count),
            description: self.extract_description(root),
            scraped_at: ctx.scraped_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <h1 class="product-title">  AMD Ryzen 7 9800X3D
     Desktop Processor </h1>
  <div class="seller-store-link"><strong>AMD</strong></div>
  <div class="form-option-item is-selected"><strong>Box</strong><strong>$479.00</strong></div>
  <div class="product-inventory"><strong>In stock.</strong></div>
  <div class="product-rating"><i class="rating rating-5" title="4.8 out of 5 eggs"></i>
    <span class="item-rating-num">(1,484)</span></div>
  <div class="product-bullets"><ul><li>8 cores</li><li> CES 2025 Innovation Award </li></ul></div>
  <div class="comments">
    <div class="comments-cell">
      <div class="comments-name">Jane D.</div>
      <div class="comments-verified-owner">Verified Owner</div>
      <div class="comments-title"><i class="rating rating-5"></i>
        <span class="comments-title-content">Fast</span>
        <span class="comments-text">10/12/2024 7:45:02 AM</span></div>
      <div class="comments-content">Great chip, runs cool.</div>
      <div class="comments-helpful">12 people found this helpful</div>
    </div>
    <div class="comments-cell">
      <div class="comments-name">Anonymous</div>
      <div class="comments-content">   </div>
    </div>
    <div class="comments-cell">
      <div class="comments-title"><i class="rating rating-2"></i></div>
      <div class="comments-content">Arrived late.</div>
    </div>
  </div>
</body></html>
"#;

    fn parser() -> ProductPageParser {
        ProductPageParser::new(&SelectorConfig::default()).unwrap()
    }

    fn ctx() -> PageContext {
        PageContext::new("https://www.newegg.com/amd-ryzen-7-9800x3d/p/N82E16819113877")
    }

    #[test]
    fn test_parse_full_product() {
        let product = parser().parse_product(PAGE, &ctx()).unwrap();
        assert_eq!(product.product_key, "N82E16819113877");
        assert_eq!(product.title, "AMD Ryzen 7 9800X3D Desktop Processor");
        assert_eq!(product.brand.as_deref(), Some("AMD"));
        assert_eq!(product.price, Some(479.0));
        assert_eq!(product.currency.as_deref(), Some("USD"));
        assert_eq!(product.price_text.as_deref(), Some("$479.00"));
        assert_eq!(product.availability, Availability::InStock);
        assert_eq!(product.rating, Some(4.8));
        assert_eq!(product.rating_count, Some(1484));
        assert_eq!(
            product.description.as_deref(),
            Some("8 cores\nCES 2025 Innovation Award")
        );
    }

    #[test]
    fn test_parse_reviews_skips_items_without_body() {
        let reviews = parser().parse_reviews(PAGE);
        assert_eq!(reviews.len(), 2);

        let first = &reviews[0];
        assert_eq!(first.reviewer_name.as_deref(), Some("Jane D."));
        assert_eq!(first.rating, Some(5));
        assert_eq!(first.title.as_deref(), Some("Fast"));
        assert_eq!(first.review_date, chrono::NaiveDate::from_ymd_opt(2024, 10, 12));
        assert_eq!(first.helpful_votes, Some(12));
        assert!(first.verified_buyer);

        let second = &reviews[1];
        assert_eq!(second.reviewer_name, None);
        assert_eq!(second.rating, Some(2));
        assert!(!second.verified_buyer);
    }

    #[test]
    fn test_parse_page_combines_both() {
        let page = parser().parse_page(PAGE, &ctx()).unwrap();
        assert_eq!(page.reviews.len(), 2);
        assert_eq!(page.product.brand.as_deref(), Some("AMD"));
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let mut selectors = SelectorConfig::default();
        selectors.product.brand = vec!["div[".to_string()];
        let err = ProductPageParser::new(&selectors).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSelector { ref field, .. } if field == "product.brand"));
    }
}
