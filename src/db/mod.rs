pub mod models;
pub mod writer;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::types::{ListingRecord, ListingType, Price};

pub use models::ListingRow;
pub use writer::ListingWriter;

/// Open (creating if needed) the store for writing and apply migrations.
pub async fn open_for_write(db_path: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(opts).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {db_path}");
    Ok(pool)
}

/// Open an existing store read-only. The analysis side never writes.
pub async fn open_read_only(db_path: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true);
    Ok(SqlitePoolOptions::new().connect_with(opts).await?)
}

/// Every stored listing, in insertion order. Rows that no longer decode
/// (unknown type, out-of-range discount) are logged and left out.
pub async fn load_listings(pool: &SqlitePool) -> Result<Vec<ListingRecord>> {
    let rows: Vec<ListingRow> = sqlx::query_as(
        "SELECT id, name, discount_percent, price, type FROM listings ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let total = rows.len();
    let listings: Vec<ListingRecord> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            row_to_listing(row)
                .map_err(|e| warn!(id, "skipping stored listing: {e}"))
                .ok()
        })
        .collect();

    if listings.len() < total {
        warn!(skipped = total - listings.len(), "some stored listings did not decode");
    }
    Ok(listings)
}

fn row_to_listing(row: ListingRow) -> Result<ListingRecord> {
    let discount_percent = u8::try_from(row.discount_percent)
        .ok()
        .filter(|d| *d <= 100)
        .ok_or_else(|| AppError::Validation(format!("discount {} out of range", row.discount_percent)))?;
    let listing_type = ListingType::from_str(&row.listing_type).map_err(AppError::Validation)?;

    Ok(ListingRecord {
        name: row.name,
        discount_percent,
        price: Price::from_column(row.price),
        listing_type,
    })
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}
