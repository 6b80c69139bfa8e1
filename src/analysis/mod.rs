//! Derived pricing analytics over a snapshot of extracted listings.
//!
//! An [`Analysis`] is a pure function of the listing set and a bucket scheme.
//! It is rebuilt whenever the underlying set changes; nothing here is
//! persisted or incrementally maintained.

pub mod buckets;
pub mod pricing;
pub mod stats;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::types::{ListingRecord, ListingType, TypeFilter};

pub use buckets::BucketScheme;
pub use pricing::original_price;
pub use stats::PriceStats;

/// A listing with a numeric price plus its derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedRecord {
    pub name: Option<String>,
    pub discount_percent: u8,
    pub price: f64,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    /// `None` at 100% discount.
    pub original_price: Option<f64>,
    pub is_outlier: bool,
    pub discount_bucket: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketCount {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketGroups {
    pub scheme: BucketScheme,
    /// Every bucket of the scheme, in scheme order, including empty ones.
    pub buckets: Vec<BucketCount>,
    /// Bucket with the most records; the earliest wins a tie. `None` when
    /// there are no priced records.
    pub largest: Option<&'static str>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSummary {
    pub listings: usize,
    pub priced: usize,
    pub unpriced: usize,
    /// Listings with any discount.
    pub discounted: usize,
    pub outliers: usize,
    pub prices: Option<PriceStats>,
    pub max_discount: Option<ListingRecord>,
}

pub struct Analysis {
    scheme: BucketScheme,
    listings: Vec<ListingRecord>,
    records: Vec<AnalyzedRecord>,
    stats: Option<PriceStats>,
}

impl Analysis {
    /// Outlier thresholds come from every numeric price in `listings`,
    /// independent of any later type restriction.
    pub fn new(listings: Vec<ListingRecord>, scheme: BucketScheme) -> Self {
        let stats = PriceStats::from_prices(listings.iter().filter_map(|l| l.price.amount()));

        let records = listings
            .iter()
            .filter_map(|l| {
                let price = l.price.amount()?;
                Some(AnalyzedRecord {
                    name: l.name.clone(),
                    discount_percent: l.discount_percent,
                    price,
                    listing_type: l.listing_type,
                    original_price: original_price(price, l.discount_percent),
                    is_outlier: stats.is_some_and(|s| s.is_outlier(price)),
                    discount_bucket: scheme.label_of(l.discount_percent),
                })
            })
            .collect();

        Self { scheme, listings, records, stats }
    }

    pub fn scheme(&self) -> BucketScheme {
        self.scheme
    }

    /// Stats over every numeric price.
    pub fn stats(&self) -> Option<PriceStats> {
        self.stats
    }

    #[cfg(test)]
    fn listings(&self) -> &[ListingRecord] {
        &self.listings
    }

    #[cfg(test)]
    fn records(&self) -> &[AnalyzedRecord] {
        &self.records
    }

    /// Restrict every subsequent view to `filter`.
    pub fn view(&self, filter: TypeFilter) -> View<'_> {
        View { analysis: self, filter }
    }
}

/// Read-only projection of an [`Analysis`] restricted by listing type.
#[derive(Clone, Copy)]
pub struct View<'a> {
    analysis: &'a Analysis,
    filter: TypeFilter,
}

impl<'a> View<'a> {
    fn listings(&self) -> impl Iterator<Item = &'a ListingRecord> + 'a {
        let filter = self.filter;
        self.analysis
            .listings
            .iter()
            .filter(move |l| filter.admits(l.listing_type))
    }

    fn records(&self) -> impl Iterator<Item = &'a AnalyzedRecord> + 'a {
        let filter = self.filter;
        self.analysis
            .records
            .iter()
            .filter(move |r| filter.admits(r.listing_type))
    }

    /// Case-insensitive substring match on the name. Unnamed listings never
    /// match. An empty result is a normal outcome.
    pub fn matching_name(&self, needle: &str) -> Vec<&'a ListingRecord> {
        let needle = needle.to_lowercase();
        self.listings()
            .filter(|l| {
                l.name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Priced records with `min <= price <= max`, highest discount first.
    /// `min > max` is rejected rather than swapped.
    pub fn in_price_range(&self, min: f64, max: f64) -> Result<Vec<&'a AnalyzedRecord>> {
        if !min.is_finite() || !max.is_finite() {
            return Err(AppError::Validation("price bounds must be finite".to_string()));
        }
        if min > max {
            return Err(AppError::Validation(format!(
                "minimum price {min} is greater than maximum {max}"
            )));
        }
        let mut rows: Vec<_> = self
            .records()
            .filter(|r| r.price >= min && r.price <= max)
            .collect();
        rows.sort_by(|a, b| b.discount_percent.cmp(&a.discount_percent));
        Ok(rows)
    }

    /// First `k` listings by discount, descending. Ties keep input order.
    pub fn top_by_discount(&self, k: usize) -> Vec<&'a ListingRecord> {
        let mut rows: Vec<_> = self.listings().collect();
        rows.sort_by(|a, b| b.discount_percent.cmp(&a.discount_percent));
        rows.truncate(k);
        rows
    }

    pub fn bucket_groups(&self) -> BucketGroups {
        let scheme = self.analysis.scheme;
        let labels = scheme.labels();
        let mut counts = vec![0usize; labels.len()];
        for r in self.records() {
            counts[scheme.index_of(r.discount_percent)] += 1;
        }

        let total: usize = counts.iter().sum();
        let largest = if total == 0 {
            None
        } else {
            // max_by_key keeps the last maximum; scan reversed so the earliest wins
            counts
                .iter()
                .enumerate()
                .rev()
                .max_by_key(|(_, c)| **c)
                .map(|(i, _)| labels[i])
        };

        BucketGroups {
            scheme,
            buckets: labels
                .iter()
                .zip(counts)
                .map(|(label, count)| BucketCount { label: *label, count })
                .collect(),
            largest,
            total,
        }
    }

    /// Priced records in the bucket named `label` under the active scheme.
    pub fn in_bucket(&self, label: &str) -> Result<Vec<&'a AnalyzedRecord>> {
        let scheme = self.analysis.scheme;
        let idx = scheme.index_of_label(label).ok_or_else(|| {
            AppError::Validation(format!(
                "'{label}' is not a {scheme} bucket (expected one of {})",
                scheme.labels().join(", ")
            ))
        })?;
        let wanted = scheme.labels()[idx];
        Ok(self.records().filter(|r| r.discount_bucket == wanted).collect())
    }

    /// Highest-priced record of a bucket; the earliest wins a tie.
    pub fn most_expensive_in_bucket(&self, label: &str) -> Result<Option<&'a AnalyzedRecord>> {
        let rows = self.in_bucket(label)?;
        Ok(rows.into_iter().fold(None, |best, r| match best {
            Some(b) if b.price >= r.price => Some(b),
            _ => Some(r),
        }))
    }

    pub fn summary(&self) -> ViewSummary {
        let listings = self.listings().count();
        let priced = self.records().count();
        ViewSummary {
            listings,
            priced,
            unpriced: listings - priced,
            discounted: self.listings().filter(|l| l.discount_percent > 0).count(),
            outliers: self.records().filter(|r| r.is_outlier).count(),
            prices: PriceStats::from_prices(self.records().map(|r| r.price)),
            max_discount: self.top_by_discount(1).first().map(|l| (*l).clone()),
        }
    }
}
