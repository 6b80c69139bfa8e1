use std::str::FromStr;

use crate::analysis::BucketScheme;
use crate::error::{AppError, Result};
use crate::types::StoreMode;

pub const CATALOG_URL: &str =
    "https://www.nuuvem.com/br-pt/catalog/platforms/pc/sort/bestselling/sort-mode/desc";

/// Backoff before each retry of a failed page fetch, in milliseconds.
/// Attempts beyond the table reuse the last value.
pub const FETCH_BACKOFF_MS: &[u64] = &[250, 500, 1000, 2000];

pub const USER_AGENT: &str = "catalog-pricing/0.1";

/// CSS selectors for the catalog's listing markup.
pub mod selectors {
    /// One listing node per product card.
    pub const LISTING: &str = ".product-card--grid";

    /// Title variants, in fallback order.
    pub const NAME_MULTI_LINE: &str = ".double-line-name";
    pub const NAME_SINGLE_LINE: &str = ".single-line-name";

    pub const DISCOUNT: &str = ".product-price--discount";

    /// The three rendered price fragments.
    pub const CURRENCY: &str = ".currency-symbol";
    pub const INTEGER: &str = ".integer";
    pub const DECIMAL: &str = ".decimal";

    /// Promotional badges, in priority order.
    pub const BADGE_PREORDER: &str = ".product-badge__preorder";
    pub const BADGE_DLC: &str = ".product-badge__dlc";
    pub const BADGE_BUNDLE: &str = ".product-badge__package";
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog root; pages are `{catalog_url}/page/{i}` (CATALOG_URL)
    pub catalog_url: String,
    /// Number of pages to extract (PAGE_COUNT)
    pub page_count: usize,
    /// Maximum pages in flight at once (FETCH_CONCURRENCY)
    pub fetch_concurrency: usize,
    /// Attempts per page before it is skipped (FETCH_MAX_ATTEMPTS)
    pub fetch_max_attempts: u32,
    /// Per-attempt timeout in seconds (PAGE_TIMEOUT_SECS)
    pub page_timeout_secs: u64,
    pub store_mode: StoreMode,
    pub db_path: String,
    pub bucket_scheme: BucketScheme,
    /// Size of the top-by-discount view (TOP_K)
    pub top_k: usize,
    pub api_port: u16,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            catalog_url: std::env::var("CATALOG_URL")
                .unwrap_or_else(|_| CATALOG_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            page_count: env_parse("PAGE_COUNT", 30)?,
            fetch_concurrency: env_parse("FETCH_CONCURRENCY", 4)?,
            fetch_max_attempts: env_parse("FETCH_MAX_ATTEMPTS", 3)?,
            page_timeout_secs: env_parse("PAGE_TIMEOUT_SECS", 30)?,
            store_mode: env_parse("STORE_MODE", StoreMode::Overwrite)?,
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "catalog.db".to_string()),
            bucket_scheme: env_parse("BUCKET_SCHEME", BucketScheme::Coarse)?,
            top_k: env_parse("TOP_K", 10)?,
            api_port: env_parse("API_PORT", 3000)?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !self.catalog_url.starts_with("http://") && !self.catalog_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "CATALOG_URL must be an http(s) URL, got '{}'",
                self.catalog_url
            )));
        }
        if self.fetch_concurrency == 0 {
            return Err(AppError::Config("FETCH_CONCURRENCY must be at least 1".to_string()));
        }
        if self.fetch_max_attempts == 0 {
            return Err(AppError::Config("FETCH_MAX_ATTEMPTS must be at least 1".to_string()));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("TOP_K must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
/// A value that is set but malformed is a configuration error.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{key}: {e}"))),
        Err(_) => Ok(default),
    }
}
