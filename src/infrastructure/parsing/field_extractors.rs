//! Pure text helpers turning displayed strings into typed values

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Digits with `.`/`,` separators; a space only counts as a thousands separator before exactly three digits
static PRICE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+|[ \x{A0}\x{2009}\x{202F}]\d{3}\b)*").unwrap());
static RATING_OUT_OF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:out\s+of|/)\s*5\b").unwrap());
static PLAIN_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static RATING_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brating-(\d+)\b").unwrap());
static COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})+|\d+").unwrap());
static US_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2}/\d{1,2}/\d{4})\b").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());
static LONG_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]{2,8}\.? \d{1,2}, \d{4})\b").unwrap());

/// Symbols and codes mapped to ISO 4217, longer prefixes first
const CURRENCY_MARKERS: &[(&str, &str)] = &[
    ("US$", "USD"),
    ("CA$", "CAD"),
    ("C$", "CAD"),
    ("A$", "AUD"),
    ("USD", "USD"),
    ("CAD", "CAD"),
    ("EUR", "EUR"),
    ("GBP", "GBP"),
    ("JPY", "JPY"),
    ("KRW", "KRW"),
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₩", "KRW"),
];

/// Collapse runs of whitespace; `None` for blank text
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Currency code for the first marker found in the text
pub fn detect_currency(text: &str) -> Option<&'static str> {
    CURRENCY_MARKERS
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|(_, code)| *code)
}

/// Numeric amount of a displayed price such as "$1,299.99" or "1.299,99 €"
pub fn parse_price(text: &str) -> Option<f64> {
    let raw: String = PRICE_NUMBER
        .find(text)?
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');
    let normalized = match (last_dot, last_comma) {
        // Whichever separator comes last is the decimal point
        (Some(dot), Some(comma)) if comma > dot => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (None, Some(comma)) if raw.len() - comma - 1 <= 2 && raw.matches(',').count() == 1 => {
            raw.replace(',', ".")
        }
        (None, Some(_)) => raw.replace(',', ""),
        (Some(dot), None) if raw.matches('.').count() > 1 || (raw.len() - dot - 1 == 3 && raw.len() > 4) => {
            raw.replace('.', "")
        }
        _ => raw,
    };

    normalized.parse::<f64>().ok().filter(|p| p.is_finite() && *p >= 0.0)
}

/// Aggregate rating from text like "4.8 out of 5 eggs", "4.5/5" or "4.2"
pub fn parse_rating(text: &str) -> Option<f64> {
    let value = match RATING_OUT_OF.captures(text) {
        Some(caps) => caps[1].parse::<f64>().ok()?,
        None => PLAIN_DECIMAL.find(text)?.as_str().parse::<f64>().ok()?,
    };
    (0.0..=5.0).contains(&value).then_some(value)
}

/// Star count encoded in a class list, e.g. "rating rating-4"
pub fn rating_from_class(class: &str) -> Option<u8> {
    RATING_CLASS.captures(class)?[1].parse().ok()
}

/// First count in text such as "(1,484)" or "12 people found this helpful"
pub fn parse_count(text: &str) -> Option<i64> {
    COUNT.find(text)?.as_str().replace(',', "").parse().ok()
}

/// Best-effort date from review header text.
/// Accepts "10/12/2024 7:45:02 AM", "2024-10-12" and "October 12, 2024".
pub fn parse_review_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = US_DATE.captures(text) {
        if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%m/%d/%Y") {
            return Some(date);
        }
    }
    if let Some(caps) = ISO_DATE.captures(text) {
        if let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
            return Some(date);
        }
    }
    let caps = LONG_DATE.captures(text)?;
    let candidate = caps[1].replace('.', "");
    ["%B %d, %Y", "%b %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&candidate, fmt).ok())
}
