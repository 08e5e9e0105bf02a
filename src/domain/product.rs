use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Site-assigned item number in product URLs, e.g. `/p/N82E16819113877`
static ITEM_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/p/([A-Za-z0-9][A-Za-z0-9\-]{3,})").unwrap());

/// Product information extracted from a product page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Identity key, see [`derive_product_key`]
    pub product_key: String,
    pub url: String,
    pub title: String,
    pub brand: Option<String>,
    /// Numeric price with thousands separators and currency symbol removed
    pub price: Option<f64>,
    /// ISO 4217 code inferred from the price text
    pub currency: Option<String>,
    /// Price as displayed on the page
    pub price_text: Option<String>,
    pub availability: Availability,
    /// Aggregate rating on a 0-5 scale
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub description: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Product row as stored, with its internal identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: i64,
    pub first_seen_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: ProductRecord,
}

/// Reference to a persisted product, handed to review upserts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: i64,
    pub product_key: String,
    pub status: UpsertStatus,
}

/// Whether an upsert created a row or overwrote an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertStatus {
    Inserted,
    Updated,
}

/// Stock status shown on the product page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    Limited,
    PreOrder,
    #[default]
    Unknown,
}

impl Availability {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::OutOfStock => "out_of_stock",
            Self::Limited => "limited",
            Self::PreOrder => "pre_order",
            Self::Unknown => "unknown",
        }
    }

    /// Classify free-form inventory text such as "In stock." or "OUT OF STOCK"
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("out of stock") || lower.contains("sold out") || lower.contains("unavailable") {
            Self::OutOfStock
        } else if lower.contains("pre-order") || lower.contains("preorder") || lower.contains("pre order") {
            Self::PreOrder
        } else if lower.contains("limited") || (lower.contains("only") && lower.contains("left")) {
            Self::Limited
        } else if lower.contains("in stock") || lower.contains("available") {
            Self::InStock
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "in_stock" => Self::InStock,
            "out_of_stock" => Self::OutOfStock,
            "limited" => Self::Limited,
            "pre_order" => Self::PreOrder,
            _ => Self::Unknown,
        })
    }
}

/// Derive the identity key of a product page.
///
/// The site item number wins when the URL carries one; otherwise the URL is
/// normalized to scheme, lowercase host, port and path without query,
/// fragment or trailing slash, so that tracking parameters do not split one
/// product into several rows.
pub fn derive_product_key(raw_url: &str) -> String {
    let trimmed = raw_url.trim();

    let Ok(parsed) = url::Url::parse(trimmed) else {
        return trimmed.trim_end_matches('/').to_string();
    };

    if let Some(caps) = ITEM_NUMBER_PATTERN.captures(parsed.path()) {
        return caps[1].to_uppercase();
    }

    let host = parsed.host_str().unwrap_or_default();
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = parsed.path().trim_end_matches('/');
    format!("{}://{}{}{}", parsed.scheme(), host, port, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_number_is_preferred() {
        let key = derive_product_key(
            "https://www.newegg.com/amd-ryzen-7-9800x3d/p/N82E16819113877?Item=N82E16819113877#reviews",
        );
        assert_eq!(key, "N82E16819113877");
    }

    #[test]
    fn test_url_normalization_without_item_number() {
        let a = derive_product_key("https://Shop.Example.com/widgets/blue-widget/?utm_source=x");
        let b = derive_product_key("https://shop.example.com/widgets/blue-widget#top");
        assert_eq!(a, "https://shop.example.com/widgets/blue-widget");
        assert_eq!(a, b);
    }

    #[test]
    fn test_unparseable_url_is_kept_verbatim() {
        assert_eq!(derive_product_key("  not a url/ "), "not a url");
    }

    #[test]
    fn test_availability_classification() {
        assert_eq!(Availability::classify("In stock."), Availability::InStock);
        assert_eq!(Availability::classify("OUT OF STOCK"), Availability::OutOfStock);
        assert_eq!(Availability::classify("Only 3 left"), Availability::Limited);
        assert_eq!(Availability::classify("Pre-Order now"), Availability::PreOrder);
        assert_eq!(Availability::classify("Ships from abroad"), Availability::Unknown);
    }

    #[test]
    fn test_availability_round_trips_through_text() {
        for a in [
            Availability::InStock,
            Availability::OutOfStock,
            Availability::Limited,
            Availability::PreOrder,
            Availability::Unknown,
        ] {
            assert_eq!(a.as_str().parse::<Availability>().unwrap(), a);
        }
    }
}
