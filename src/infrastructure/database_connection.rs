// Database connection and schema management
// SQLite through sqlx; the file and its directory are created on first use

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::infrastructure::config::StorageConfig;
use crate::infrastructure::scrape_error::StorageError;

const CREATE_PRODUCTS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_key TEXT NOT NULL UNIQUE,
        url TEXT NOT NULL,
        title TEXT NOT NULL,
        brand TEXT,
        price REAL,
        currency TEXT,
        price_text TEXT,
        availability TEXT NOT NULL DEFAULT 'unknown',
        rating REAL,
        rating_count INTEGER,
        description TEXT,
        scraped_at TEXT NOT NULL,
        first_seen_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

const CREATE_REVIEWS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL,
        review_key TEXT NOT NULL,
        reviewer_name TEXT,
        rating INTEGER CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
        title TEXT,
        body TEXT NOT NULL,
        review_date TEXT,
        date_raw TEXT,
        helpful_votes INTEGER,
        verified_buyer BOOLEAN NOT NULL DEFAULT 0,
        first_seen_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (product_id, review_key),
        FOREIGN KEY (product_id) REFERENCES products (id)
    )
"#;

const CREATE_INDEXES_SQL: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_reviews_product_id ON reviews (product_id)",
    "CREATE INDEX IF NOT EXISTS idx_reviews_review_date ON reviews (review_date)",
    "CREATE INDEX IF NOT EXISTS idx_products_scraped_at ON products (scraped_at)",
];

/// Pool plus the file it points at
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: SqlitePool,
    path: PathBuf,
}

/// Accepts a bare path or a `sqlite:`/`sqlite://` URL
pub fn database_file_path(path_or_url: &str) -> PathBuf {
    let raw = path_or_url
        .strip_prefix("sqlite://")
        .or_else(|| path_or_url.strip_prefix("sqlite:"))
        .unwrap_or(path_or_url);
    let raw = raw.split('?').next().unwrap_or(raw);
    PathBuf::from(raw)
}

impl DatabaseConnection {
    /// Open with default pool settings
    pub async fn open(path_or_url: &str) -> Result<Self, StorageError> {
        Self::open_with(&StorageConfig {
            database_path: path_or_url.to_string(),
            ..StorageConfig::default()
        })
        .await
    }

    pub async fn open_with(config: &StorageConfig) -> Result<Self, StorageError> {
        let path = database_file_path(&config.database_path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Location {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Opened database at {}", path.display());
        Ok(Self { pool, path })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create tables and indexes when missing. Existing data is never touched.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_PRODUCTS_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_REVIEWS_SQL).execute(&self.pool).await?;
        for statement in CREATE_INDEXES_SQL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema is up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
