//! Domain module - products, reviews and crawl outcomes
//!
//! Plain data types shared by the parser, the driver, the store and the
//! orchestrator. Nothing in here touches the network or the database.

pub mod outcome;
pub mod product;
pub mod review;

pub use outcome::{ErrorKind, PersistReport, RunSummary, ScrapeResult, UrlOutcome};
pub use product::{
    Availability, ProductRecord, ProductRef, StoredProduct, UpsertStatus, derive_product_key,
};
pub use review::{ReviewFields, ReviewRecord, ReviewSet, StoredReview, review_natural_key};
