mod analysis;
mod api;
mod catalog;
mod config;
mod db;
mod error;
mod extractor;
mod fetcher;
mod latency;
mod types;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::Analysis;
use crate::api::routes::{router, ApiState};
use crate::catalog::{ListingSelectors, PagePlan};
use crate::config::Config;
use crate::db::ListingWriter;
use crate::error::{AppError, Result};
use crate::extractor::{CancelFlag, Extractor};
use crate::fetcher::{HttpPageSource, RetryPolicy};
use crate::types::TypeFilter;

const USAGE: &str = "usage: catalog <extract [--from-page N] | analyze | serve>";

#[derive(Debug)]
enum Stage {
    /// Fetch the catalog and persist listings. `from_page` resumes mid-catalog.
    Extract { from_page: usize },
    /// Print derived views of the stored listings as JSON.
    Analyze,
    /// Serve derived views over HTTP.
    Serve,
}

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    let stage = match parse_stage(std::env::args().skip(1)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    let result = match stage {
        Stage::Extract { from_page } => extract(cfg, from_page).await,
        Stage::Analyze => analyze(cfg).await,
        Stage::Serve => serve(cfg).await,
    };

    if let Err(e) = result {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

fn parse_stage<I: Iterator<Item = String>>(mut args: I) -> Result<Stage> {
    let stage = match args.next().as_deref() {
        Some("extract") => {
            let mut from_page = 1;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--from-page" => {
                        from_page = args
                            .next()
                            .and_then(|v| v.parse::<usize>().ok())
                            .filter(|p| *p >= 1)
                            .ok_or_else(|| {
                                AppError::Config("--from-page needs a page number >= 1".to_string())
                            })?;
                    }
                    other => return Err(AppError::Config(format!("unknown argument '{other}'"))),
                }
            }
            Stage::Extract { from_page }
        }
        Some("analyze") => Stage::Analyze,
        Some("serve") => Stage::Serve,
        Some(other) => return Err(AppError::Config(format!("unknown stage '{other}'"))),
        None => return Err(AppError::Config("missing stage".to_string())),
    };
    Ok(stage)
}

async fn extract(cfg: Config, from_page: usize) -> Result<()> {
    let pool = db::open_for_write(&cfg.db_path).await?;

    let plan = PagePlan::new(&cfg.catalog_url, cfg.page_count).starting_at(from_page);
    if plan.is_empty() {
        warn!(from_page, page_count = cfg.page_count, "Nothing to fetch");
    }
    info!(
        "Catalog {} | pages {}..={} | concurrency {} | attempts {}",
        cfg.catalog_url,
        from_page,
        cfg.page_count,
        cfg.fetch_concurrency,
        cfg.fetch_max_attempts,
    );

    let cancel = CancelFlag::new();
    let ctrl_c_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received: finishing in-flight pages, no new fetches");
            ctrl_c_flag.cancel();
        }
    });

    let extractor = Extractor::new(
        HttpPageSource::new(&cfg)?,
        ListingSelectors::new()?,
        RetryPolicy::from_config(&cfg),
        cfg.fetch_concurrency,
        cancel,
    );
    let report = extractor.run(plan).await?;

    if !report.failed_pages.is_empty() {
        warn!(pages = ?report.failed_pages, "Pages skipped; rerun with --from-page to fill gaps");
    }

    if report.records.is_empty() {
        warn!("No listings extracted; store left untouched");
        return Ok(());
    }

    ListingWriter::new(pool)
        .write(&report.records, cfg.store_mode)
        .await?;
    Ok(())
}

async fn analyze(cfg: Config) -> Result<()> {
    let pool = db::open_read_only(&cfg.db_path).await?;
    let listings = db::load_listings(&pool).await?;
    let analysis = Analysis::new(listings, cfg.bucket_scheme);
    let view = analysis.view(TypeFilter::All);

    let summary = view.summary();
    let buckets = view.bucket_groups();
    info!(
        listings = summary.listings,
        priced = summary.priced,
        outliers = summary.outliers,
        largest_bucket = buckets.largest.unwrap_or("-"),
        "Analysis complete ({} scheme)",
        analysis.scheme(),
    );

    let report = serde_json::json!({
        "scheme": analysis.scheme(),
        "summary": summary,
        "buckets": buckets,
        "top_by_discount": view.top_by_discount(cfg.top_k),
    });
    let text = serde_json::to_string_pretty(&report)
        .map_err(|e| AppError::Io(std::io::Error::other(e)))?;
    println!("{text}");
    Ok(())
}

async fn serve(cfg: Config) -> Result<()> {
    let pool = db::open_read_only(&cfg.db_path).await?;
    let app = router(ApiState {
        pool,
        default_scheme: cfg.bucket_scheme,
        default_top_k: cfg.top_k,
    });

    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> impl Iterator<Item = String> {
        v.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_stages() {
        assert!(matches!(parse_stage(args(&["analyze"])), Ok(Stage::Analyze)));
        assert!(matches!(parse_stage(args(&["serve"])), Ok(Stage::Serve)));
        assert!(matches!(
            parse_stage(args(&["extract"])),
            Ok(Stage::Extract { from_page: 1 })
        ));
        assert!(matches!(
            parse_stage(args(&["extract", "--from-page", "7"])),
            Ok(Stage::Extract { from_page: 7 })
        ));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_stage(args(&[])).is_err());
        assert!(parse_stage(args(&["scrape"])).is_err());
        assert!(parse_stage(args(&["extract", "--from-page", "0"])).is_err());
        assert!(parse_stage(args(&["extract", "--bogus"])).is_err());
    }
}
