use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, Stream, StreamExt};
use tracing::{info, warn};

use crate::catalog::{parse_page, ListingSelectors, PagePlan, PageRequest};
use crate::error::{AppError, Result};
use crate::fetcher::{fetch_with_retry, PageSource, RetryPolicy};
use crate::latency::FetchLatency;
use crate::types::ListingRecord;

/// Shared stop signal. Once set, no new page fetches are issued; pages
/// already in flight finish and their records are kept.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What happened to one page.
#[derive(Debug)]
pub enum PageOutcome {
    Parsed {
        index: usize,
        records: Vec<ListingRecord>,
        skipped_nodes: usize,
    },
    Failed {
        index: usize,
        url: String,
        error: AppError,
    },
}

impl PageOutcome {
    #[cfg(test)]
    pub fn index(&self) -> usize {
        match self {
            PageOutcome::Parsed { index, .. } | PageOutcome::Failed { index, .. } => *index,
        }
    }
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Records in page order, then node order within a page.
    pub records: Vec<ListingRecord>,
    pub pages_planned: usize,
    pub pages_parsed: usize,
    /// 1-based indices of pages skipped after exhausting retries.
    pub failed_pages: Vec<usize>,
    pub skipped_nodes: usize,
    pub unnamed: usize,
    /// True when the run stopped before issuing every planned page.
    pub cancelled: bool,
}

pub struct Extractor<S> {
    source: S,
    selectors: ListingSelectors,
    policy: RetryPolicy,
    concurrency: usize,
    cancel: CancelFlag,
    latency: FetchLatency,
}

impl<S: PageSource> Extractor<S> {
    pub fn new(
        source: S,
        selectors: ListingSelectors,
        policy: RetryPolicy,
        concurrency: usize,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            source,
            selectors,
            policy,
            concurrency: concurrency.max(1),
            cancel,
            latency: FetchLatency::new(),
        }
    }

    /// Lazily fetch and parse the plan's pages, at most `concurrency` at a
    /// time. Outcomes are yielded in page order regardless of completion order.
    pub fn stream(&self, plan: PagePlan) -> impl Stream<Item = PageOutcome> + '_ {
        let cancel = self.cancel.clone();
        stream::iter(plan.into_pages())
            .take_while(move |_| std::future::ready(!cancel.is_cancelled()))
            .map(move |page| self.extract_page(page))
            .buffered(self.concurrency)
    }

    /// Drain [`Self::stream`] into a report. Failed pages are skipped; only a
    /// plan where every page failed is an error.
    pub async fn run(&self, plan: PagePlan) -> Result<ExtractionReport> {
        let mut report = ExtractionReport {
            pages_planned: plan.len(),
            ..Default::default()
        };
        info!(pages = plan.len(), concurrency = self.concurrency, "Extraction starting");

        let mut outcomes = std::pin::pin!(self.stream(plan));
        let mut seen = 0usize;
        while let Some(outcome) = outcomes.next().await {
            seen += 1;
            match outcome {
                PageOutcome::Parsed { index, records, skipped_nodes } => {
                    report.pages_parsed += 1;
                    report.skipped_nodes += skipped_nodes;
                    report.unnamed += records.iter().filter(|r| r.name.is_none()).count();
                    info!(page = index, listings = records.len(), "page done");
                    report.records.extend(records);
                }
                PageOutcome::Failed { index, url, error } => {
                    warn!(page = index, url = %url, "skipping page after retries: {error}");
                    report.failed_pages.push(index);
                }
            }
        }
        report.cancelled = seen < report.pages_planned;

        if report.cancelled {
            warn!(
                issued = seen,
                planned = report.pages_planned,
                "Extraction cancelled; keeping partial results"
            );
        }
        if seen > 0 && report.pages_parsed == 0 {
            return Err(AppError::CatalogUnreachable(seen));
        }

        let (p50, p95, p99) = self.latency.percentiles().unwrap_or_default();
        info!(
            records = report.records.len(),
            pages_parsed = report.pages_parsed,
            pages_failed = report.failed_pages.len(),
            skipped_nodes = report.skipped_nodes,
            unnamed = report.unnamed,
            "Extraction complete | fetch latency p50={p50}ms p95={p95}ms p99={p99}ms"
        );
        Ok(report)
    }

    async fn extract_page(&self, page: PageRequest) -> PageOutcome {
        let started = Instant::now();
        match fetch_with_retry(&self.source, &page.url, &self.policy).await {
            Ok(html) => {
                self.latency.record(started.elapsed());
                let parsed = parse_page(&html, &self.selectors, page.index);
                PageOutcome::Parsed {
                    index: page.index,
                    records: parsed.records,
                    skipped_nodes: parsed.skipped_nodes,
                }
            }
            Err(error) => PageOutcome::Failed {
                index: page.index,
                url: page.url,
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::types::Price;

    /// Serves canned pages by URL and records every request.
    #[derive(Default)]
    struct FakeCatalog {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
        cancel_after: Option<(usize, CancelFlag)>,
    }

    impl FakeCatalog {
        fn with_pages(base: &str, n: usize) -> Self {
            let pages = (1..=n)
                .map(|i| (format!("{base}/page/{i}"), listing_page(i)))
                .collect();
            Self { pages, ..Default::default() }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl PageSource for FakeCatalog {
        async fn fetch(&self, url: &str) -> Result<String> {
            let count = {
                let mut reqs = self.requests.lock().unwrap();
                reqs.push(url.to_string());
                reqs.len()
            };
            if let Some((after, flag)) = &self.cancel_after {
                if count >= *after {
                    flag.cancel();
                }
            }
            self.pages.get(url).cloned().ok_or_else(|| AppError::PageStatus {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn listing_page(i: usize) -> String {
        format!(
            r#"<html><body>
                <div class="product-card--grid">
                  <span class="single-line-name">Game {i}</span>
                  <span class="product-price--discount">-{i}0%</span>
                  <span class="currency-symbol">R$</span><span class="integer">{i}9</span><span class="decimal">,90</span>
                </div>
              </body></html>"#
        )
    }

    const BASE: &str = "https://shop.test/catalog";

    fn extractor(source: FakeCatalog, concurrency: usize, cancel: CancelFlag) -> Extractor<FakeCatalog> {
        let policy = RetryPolicy {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(5),
            backoff_ms: &[0],
        };
        Extractor::new(source, ListingSelectors::new().unwrap(), policy, concurrency, cancel)
    }

    #[tokio::test]
    async fn zero_pages_issue_no_requests() {
        let ex = extractor(FakeCatalog::with_pages(BASE, 3), 2, CancelFlag::new());
        let report = ex.run(PagePlan::new(BASE, 0)).await.unwrap();
        assert!(report.records.is_empty());
        assert_eq!(ex.source.request_count(), 0);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn n_pages_issue_n_requests_in_page_order() {
        let ex = extractor(FakeCatalog::with_pages(BASE, 5), 3, CancelFlag::new());
        let report = ex.run(PagePlan::new(BASE, 5)).await.unwrap();

        assert_eq!(ex.source.request_count(), 5);
        assert_eq!(report.pages_parsed, 5);
        let names: Vec<_> = report.records.iter().map(|r| r.name.clone().unwrap()).collect();
        assert_eq!(names, ["Game 1", "Game 2", "Game 3", "Game 4", "Game 5"]);
        assert_eq!(report.records[0].price, Price::Amount(19.9));
        assert_eq!(report.records[1].discount_percent, 20);
        assert_eq!(ex.latency.len(), 5);
    }

    #[tokio::test]
    async fn missing_page_is_skipped_after_retries() {
        let mut source = FakeCatalog::with_pages(BASE, 3);
        source.pages.remove(&format!("{BASE}/page/2"));
        let ex = extractor(source, 2, CancelFlag::new());

        let report = ex.run(PagePlan::new(BASE, 3)).await.unwrap();
        assert_eq!(report.failed_pages, vec![2]);
        assert_eq!(report.records.len(), 2);
        // page 2 tried twice
        assert_eq!(ex.source.request_count(), 4);
    }

    #[tokio::test]
    async fn all_pages_failing_is_fatal() {
        let ex = extractor(FakeCatalog::default(), 2, CancelFlag::new());
        let err = ex.run(PagePlan::new(BASE, 2)).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogUnreachable(2)));
    }

    #[tokio::test]
    async fn cancellation_keeps_in_flight_results() {
        let cancel = CancelFlag::new();
        let mut source = FakeCatalog::with_pages(BASE, 10);
        source.cancel_after = Some((2, cancel.clone()));
        let ex = extractor(source, 1, cancel);

        let report = ex.run(PagePlan::new(BASE, 10)).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.records.len(), 2);
        assert_eq!(ex.source.request_count(), 2);
    }

    #[tokio::test]
    async fn cancellation_drains_every_started_page() {
        let cancel = CancelFlag::new();
        let mut source = FakeCatalog::with_pages(BASE, 10);
        source.cancel_after = Some((2, cancel.clone()));
        let ex = extractor(source, 3, cancel);

        let report = ex.run(PagePlan::new(BASE, 10)).await.unwrap();
        assert!(report.cancelled);

        // every page that was requested before the flag stopped new work is reported
        let requested: Vec<String> = ex.source.requests.lock().unwrap().clone();
        assert!(requested.len() >= 3, "expected a full window in flight, got {requested:?}");
        assert!(requested.len() < 10);
        let expected: Vec<String> = (1..=requested.len()).map(|i| format!("Game {i}")).collect();
        let names: Vec<String> = report.records.iter().map(|r| r.name.clone().unwrap()).collect();
        assert_eq!(names, expected);
        assert_eq!(report.pages_parsed, requested.len());
        assert!(report.failed_pages.is_empty());
    }

    #[tokio::test]
    async fn stream_restarts_from_page_boundary() {
        let ex = extractor(FakeCatalog::with_pages(BASE, 4), 2, CancelFlag::new());
        let outcomes: Vec<PageOutcome> = ex
            .stream(PagePlan::new(BASE, 4).starting_at(3))
            .collect()
            .await;
        let idx: Vec<usize> = outcomes.iter().map(PageOutcome::index).collect();
        assert_eq!(idx, [3, 4]);
    }
}
