//! Upsert-based store for products and reviews
//!
//! Products are keyed by `product_key`, reviews by `(product_id, review_key)`.
//! Re-running a scrape overwrites mutable fields in place and never creates
//! duplicate rows. All writes go through one async writer lock, then one
//! transaction each.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{
    Availability, PersistReport, ProductRecord, ProductRef, ReviewRecord, ScrapeResult, StoredProduct,
    StoredReview, UpsertStatus,
};
use crate::infrastructure::config::StorageConfig;
use crate::infrastructure::database_connection::DatabaseConnection;
use crate::infrastructure::scrape_error::StorageError;

/// Row totals, used by the `stats` command and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub products: i64,
    pub reviews: i64,
}

/// Cheap-to-clone handle over the pool and the writer lock
#[derive(Debug, Clone)]
pub struct ReviewStore {
    db: DatabaseConnection,
    writer: Arc<Mutex<()>>,
}

impl ReviewStore {
    /// Open (creating if needed) and migrate the database
    pub async fn open(path_or_url: &str) -> Result<Self, StorageError> {
        Self::from_connection(DatabaseConnection::open(path_or_url).await?).await
    }

    pub async fn open_with(config: &StorageConfig) -> Result<Self, StorageError> {
        Self::from_connection(DatabaseConnection::open_with(config).await?).await
    }

    async fn from_connection(db: DatabaseConnection) -> Result<Self, StorageError> {
        db.migrate().await?;
        Ok(Self {
            db,
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn upsert_product(&self, product: &ProductRecord) -> Result<ProductRef, StorageError> {
        let _guard = self.writer.lock().await;
        let mut tx = self.db.pool().begin().await?;
        let product_ref = upsert_product_in(&mut tx, product, Utc::now()).await?;
        tx.commit().await?;
        Ok(product_ref)
    }

    /// Insert a review or overwrite the mutable fields of an existing one
    pub async fn upsert_review(
        &self,
        product: &ProductRef,
        review: &ReviewRecord,
    ) -> Result<UpsertStatus, StorageError> {
        let _guard = self.writer.lock().await;
        let mut tx = self.db.pool().begin().await?;
        let status = upsert_review_in(&mut tx, product.id, review, Utc::now()).await?;
        tx.commit().await?;
        Ok(status)
    }

    /// Product first, then its reviews, all in one transaction
    pub async fn persist_scrape(&self, result: &ScrapeResult) -> Result<PersistReport, StorageError> {
        let _guard = self.writer.lock().await;
        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;

        let product = upsert_product_in(&mut tx, &result.product, now).await?;
        let mut reviews_inserted = 0;
        let mut reviews_updated = 0;
        for review in &result.reviews {
            match upsert_review_in(&mut tx, product.id, review, now).await? {
                UpsertStatus::Inserted => reviews_inserted += 1,
                UpsertStatus::Updated => reviews_updated += 1,
            }
        }

        tx.commit().await?;
        info!(
            "Persisted {} ({:?}): {} new reviews, {} updated",
            product.product_key, product.status, reviews_inserted, reviews_updated
        );
        Ok(PersistReport {
            product,
            reviews_inserted,
            reviews_updated,
        })
    }

    pub async fn counts(&self) -> Result<StoreCounts, StorageError> {
        let row = sqlx::query(
            "SELECT (SELECT COUNT(*) FROM products) AS products, (SELECT COUNT(*) FROM reviews) AS reviews",
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(StoreCounts {
            products: row.get("products"),
            reviews: row.get("reviews"),
        })
    }

    pub async fn product_by_key(&self, product_key: &str) -> Result<Option<StoredProduct>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_key, url, title, brand, price, currency, price_text, availability,
                   rating, rating_count, description, scraped_at, first_seen_at
            FROM products WHERE product_key = ?
            "#,
        )
        .bind(product_key)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| product_from_row(&r)).transpose()
    }

    /// Reviews of one product in insertion order
    pub async fn reviews_for_product(&self, product_id: i64) -> Result<Vec<StoredReview>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, review_key, reviewer_name, rating, title, body,
                   review_date, date_raw, helpful_votes, verified_buyer
            FROM reviews WHERE product_id = ? ORDER BY id
            "#,
        )
        .bind(product_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(review_from_row).collect()
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

async fn upsert_product_in(
    conn: &mut SqliteConnection,
    product: &ProductRecord,
    now: DateTime<Utc>,
) -> Result<ProductRef, StorageError> {
    let existing: Option<i64> = sqlx::query("SELECT id FROM products WHERE product_key = ?")
        .bind(&product.product_key)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| row.get("id"));

    let id: i64 = sqlx::query(
        r#"
        INSERT INTO products (
            product_key, url, title, brand, price, currency, price_text, availability,
            rating, rating_count, description, scraped_at, first_seen_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(product_key) DO UPDATE SET
            url = excluded.url,
            title = excluded.title,
            brand = excluded.brand,
            price = excluded.price,
            currency = excluded.currency,
            price_text = excluded.price_text,
            availability = excluded.availability,
            rating = excluded.rating,
            rating_count = excluded.rating_count,
            description = excluded.description,
            scraped_at = excluded.scraped_at,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(&product.product_key)
    .bind(&product.url)
    .bind(&product.title)
    .bind(&product.brand)
    .bind(product.price)
    .bind(&product.currency)
    .bind(&product.price_text)
    .bind(product.availability.as_str())
    .bind(product.rating)
    .bind(product.rating_count)
    .bind(&product.description)
    .bind(product.scraped_at)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    let status = if existing.is_some() {
        UpsertStatus::Updated
    } else {
        UpsertStatus::Inserted
    };
    debug!("Product {} -> id {} ({:?})", product.product_key, id, status);

    Ok(ProductRef {
        id,
        product_key: product.product_key.clone(),
        status,
    })
}

async fn upsert_review_in(
    conn: &mut SqliteConnection,
    product_id: i64,
    review: &ReviewRecord,
    now: DateTime<Utc>,
) -> Result<UpsertStatus, StorageError> {
    let existed = sqlx::query("SELECT 1 FROM reviews WHERE product_id = ? AND review_key = ?")
        .bind(product_id)
        .bind(&review.review_key)
        .fetch_optional(&mut *conn)
        .await?
        .is_some();

    sqlx::query(
        r#"
        INSERT INTO reviews (
            product_id, review_key, reviewer_name, rating, title, body, review_date,
            date_raw, helpful_votes, verified_buyer, first_seen_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(product_id, review_key) DO UPDATE SET
            rating = excluded.rating,
            helpful_votes = excluded.helpful_votes,
            verified_buyer = excluded.verified_buyer,
            review_date = COALESCE(excluded.review_date, reviews.review_date),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(product_id)
    .bind(&review.review_key)
    .bind(&review.reviewer_name)
    .bind(review.rating.map(i64::from))
    .bind(&review.title)
    .bind(&review.body)
    .bind(review.review_date)
    .bind(&review.date_raw)
    .bind(review.helpful_votes)
    .bind(review.verified_buyer)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(if existed {
        UpsertStatus::Updated
    } else {
        UpsertStatus::Inserted
    })
}

fn product_from_row(row: &SqliteRow) -> Result<StoredProduct, StorageError> {
    let availability: String = row.get("availability");
    Ok(StoredProduct {
        id: row.get("id"),
        first_seen_at: row.try_get("first_seen_at")?,
        record: ProductRecord {
            product_key: row.get("product_key"),
            url: row.get("url"),
            title: row.get("title"),
            brand: row.get("brand"),
            price: row.get("price"),
            currency: row.get("currency"),
            price_text: row.get("price_text"),
            availability: availability.parse().unwrap_or(Availability::Unknown),
            rating: row.get("rating"),
            rating_count: row.get("rating_count"),
            description: row.get("description"),
            scraped_at: row.try_get("scraped_at")?,
        },
    })
}

fn review_from_row(row: &SqliteRow) -> Result<StoredReview, StorageError> {
    let rating: Option<i64> = row.get("rating");
    let rating = rating
        .map(u8::try_from)
        .transpose()
        .map_err(|e| StorageError::Corrupt {
            column: "rating".to_string(),
            reason: e.to_string(),
        })?;

    Ok(StoredReview {
        id: row.get("id"),
        product_id: row.get("product_id"),
        record: ReviewRecord {
            review_key: row.get("review_key"),
            reviewer_name: row.get("reviewer_name"),
            rating,
            title: row.get("title"),
            body: row.get("body"),
            review_date: row.try_get("review_date")?,
            date_raw: row.get("date_raw"),
            helpful_votes: row.get("helpful_votes"),
            verified_buyer: row.get("verified_buyer"),
        },
    })
}
