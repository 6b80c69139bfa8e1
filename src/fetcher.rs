use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{Config, FETCH_BACKOFF_MS, USER_AGENT};
use crate::error::{AppError, Result};

/// Transport seam: anything that can turn a page URL into HTML.
pub trait PageSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Catalog pages over HTTP(S).
#[derive(Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.page_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::PageStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }
}

/// Bounded retry policy for one page.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_ms: &'static [u64],
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_attempts: cfg.fetch_max_attempts,
            attempt_timeout: Duration::from_secs(cfg.page_timeout_secs),
            backoff_ms: FETCH_BACKOFF_MS,
        }
    }

    /// Delay before retry number `retry` (0-based).
    fn backoff(&self, retry: usize) -> Duration {
        let ms = self
            .backoff_ms
            .get(retry)
            .or(self.backoff_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }
}

/// Fetch `url`, retrying failures and timeouts up to `policy.max_attempts`.
/// Returns the last error once attempts are exhausted.
pub async fn fetch_with_retry<S: PageSource>(
    source: &S,
    url: &str,
    policy: &RetryPolicy,
) -> Result<String> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(policy.attempt_timeout, source.fetch(url)).await {
            Ok(r) => r,
            Err(_) => Err(AppError::Timeout {
                url: url.to_string(),
                secs: policy.attempt_timeout.as_secs(),
            }),
        };

        match result {
            Ok(body) => {
                if attempt > 1 {
                    debug!(url, attempt, "page fetched after retry");
                }
                return Ok(body);
            }
            Err(e) => {
                warn!(url, attempt, max_attempts = attempts, "page fetch failed: {e}");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff(attempt as usize - 1)).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AppError::CatalogUnreachable(1)))
}
