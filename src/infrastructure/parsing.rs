//! HTML parsing for product pages
//!
//! Selector-driven extraction over a DOM snapshot. The parser never touches
//! the browser; it only sees markup captured by the driver.

pub mod context;
pub mod field_extractors;
pub mod product_page_parser;

pub use context::PageContext;
pub use product_page_parser::ProductPageParser;

use scraper::Html;

use crate::domain::{ProductRecord, ReviewRecord};
use crate::infrastructure::scrape_error::ParseError;

/// Parser over an already-built document with contextual information
pub trait ContextualParser {
    type Output;
    type Context;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> Result<Self::Output, ParseError>;
}

/// Product and reviews read from one page snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub product: ProductRecord,
    pub reviews: Vec<ReviewRecord>,
}
