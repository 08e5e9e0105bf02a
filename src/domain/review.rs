//! Review records and their natural key
//!
//! Product pages rarely expose a stable review id, so a review is identified
//! by a BLAKE3 digest over the fields a reader can see: reviewer, raw date
//! text, title and body. Whitespace is collapsed and text lowercased before
//! hashing so that re-rendered markup maps to the same key.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const KEY_FIELD_SEPARATOR: char = '\u{1f}';

/// Smallest and largest star rating accepted for a single review
pub const MIN_REVIEW_RATING: u8 = 1;
pub const MAX_REVIEW_RATING: u8 = 5;

/// One customer review extracted from a product page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Natural key, see [`review_natural_key`]
    pub review_key: String,
    pub reviewer_name: Option<String>,
    /// Star rating within `MIN_REVIEW_RATING..=MAX_REVIEW_RATING`
    pub rating: Option<u8>,
    pub title: Option<String>,
    pub body: String,
    /// Best-effort parse of `date_raw`
    pub review_date: Option<NaiveDate>,
    pub date_raw: Option<String>,
    pub helpful_votes: Option<i64>,
    pub verified_buyer: bool,
}

/// Review row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReview {
    pub id: i64,
    pub product_id: i64,
    #[serde(flatten)]
    pub record: ReviewRecord,
}

/// Fields observed for one review item, before the key is computed
#[derive(Debug, Clone, Default)]
pub struct ReviewFields {
    pub reviewer_name: Option<String>,
    pub rating: Option<u8>,
    pub title: Option<String>,
    pub body: String,
    pub review_date: Option<NaiveDate>,
    pub date_raw: Option<String>,
    pub helpful_votes: Option<i64>,
    pub verified_buyer: bool,
}

impl ReviewRecord {
    pub fn from_fields(fields: ReviewFields) -> Self {
        let review_key = review_natural_key(
            fields.reviewer_name.as_deref(),
            fields.date_raw.as_deref(),
            fields.title.as_deref(),
            &fields.body,
        );

        Self {
            review_key,
            reviewer_name: fields.reviewer_name,
            rating: fields
                .rating
                .filter(|r| (MIN_REVIEW_RATING..=MAX_REVIEW_RATING).contains(r)),
            title: fields.title,
            body: fields.body,
            review_date: fields.review_date,
            date_raw: fields.date_raw,
            helpful_votes: fields.helpful_votes,
            verified_buyer: fields.verified_buyer,
        }
    }
}

/// Compute the natural key of a review from its observable fields
pub fn review_natural_key(
    reviewer_name: Option<&str>,
    date_raw: Option<&str>,
    title: Option<&str>,
    body: &str,
) -> String {
    let mut material = String::new();
    for (i, part) in [reviewer_name.unwrap_or(""), date_raw.unwrap_or(""), title.unwrap_or(""), body]
        .into_iter()
        .enumerate()
    {
        if i > 0 {
            material.push(KEY_FIELD_SEPARATOR);
        }
        material.push_str(&normalize_for_key(part));
    }

    blake3::hash(material.as_bytes()).to_hex().to_string()
}

fn normalize_for_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Reviews gathered across pages, keyed by natural key in first-seen order
#[derive(Debug, Clone, Default)]
pub struct ReviewSet {
    reviews: IndexMap<String, ReviewRecord>,
}

impl ReviewSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page worth of reviews, returning how many were new.
    /// A review seen again replaces the earlier copy in place.
    pub fn merge<I>(&mut self, reviews: I) -> usize
    where
        I: IntoIterator<Item = ReviewRecord>,
    {
        let before = self.reviews.len();
        for review in reviews {
            self.reviews.insert(review.review_key.clone(), review);
        }
        self.reviews.len() - before
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    pub fn into_vec(self) -> Vec<ReviewRecord> {
        self.reviews.into_values().collect()
    }
}
