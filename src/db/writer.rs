use tracing::info;

use crate::error::Result;
use crate::types::{ListingRecord, StoreMode};

/// Persists one extraction run's records to SQLite.
pub struct ListingWriter {
    pool: sqlx::SqlitePool,
}

impl ListingWriter {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Write `records` in one transaction. `Overwrite` clears the table first
    /// so a re-run replaces the previous snapshot; `Append` keeps it.
    pub async fn write(&self, records: &[ListingRecord], mode: StoreMode) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let removed = if mode == StoreMode::Overwrite {
            sqlx::query("DELETE FROM listings")
                .execute(&mut *tx)
                .await?
                .rows_affected()
        } else {
            0
        };

        let mut written = 0u64;
        for r in records {
            written += sqlx::query(
                r#"
                INSERT INTO listings (name, discount_percent, price, type)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(r.name.as_deref())
            .bind(i64::from(r.discount_percent))
            .bind(r.price.amount())
            .bind(r.listing_type.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        info!(written, removed, mode = ?mode, "Listings persisted");
        Ok(written)
    }
}
