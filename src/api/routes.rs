use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::analysis::{
    original_price, Analysis, AnalyzedRecord, BucketGroups, BucketScheme, PriceStats, ViewSummary,
};
use crate::db::load_listings;
use crate::error::AppError;
use crate::types::{ListingRecord, ListingType, Price, TypeFilter};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub default_scheme: BucketScheme,
    pub default_top_k: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/listings", get(get_listings))
        .route("/listings/price-range", get(get_price_range))
        .route("/listings/top-discount", get(get_top_discount))
        .route("/buckets", get(get_buckets))
        .route("/buckets/:label", get(get_bucket))
        .route("/stats/prices", get(get_price_stats))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListingsQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
}

#[derive(Deserialize)]
pub struct PriceRangeQuery {
    pub min: f64,
    pub max: f64,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
}

#[derive(Deserialize)]
pub struct TopDiscountQuery {
    pub k: Option<usize>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
}

#[derive(Deserialize)]
pub struct BucketQuery {
    pub scheme: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
}

#[derive(Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListingResponse {
    pub name: Option<String>,
    pub discount_percent: u8,
    pub price: Price,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub original_price: Option<f64>,
}

impl From<&ListingRecord> for ListingResponse {
    fn from(l: &ListingRecord) -> Self {
        Self {
            name: l.name.clone(),
            discount_percent: l.discount_percent,
            price: l.price,
            listing_type: l.listing_type,
            original_price: l
                .price
                .amount()
                .and_then(|p| original_price(p, l.discount_percent)),
        }
    }
}

#[derive(Serialize)]
pub struct RecordsResponse {
    pub count: usize,
    pub records: Vec<AnalyzedRecord>,
}

#[derive(Serialize)]
pub struct BucketResponse {
    pub scheme: BucketScheme,
    pub label: String,
    pub count: usize,
    pub most_expensive: Option<AnalyzedRecord>,
    pub records: Vec<AnalyzedRecord>,
}

#[derive(Serialize)]
pub struct PriceStatsResponse {
    /// Over every priced listing, before any type restriction.
    pub overall: Option<PriceStats>,
    pub view: ViewSummary,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_listings(
    State(state): State<ApiState>,
    Query(params): Query<ListingsQuery>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let filter = type_filter(params.listing_type.as_deref())?;
    let analysis = snapshot(&state, state.default_scheme).await?;
    let view = analysis.view(filter);

    let rows = view.matching_name(params.name.as_deref().unwrap_or(""));
    Ok(Json(rows.into_iter().map(ListingResponse::from).collect()))
}

async fn get_price_range(
    State(state): State<ApiState>,
    Query(params): Query<PriceRangeQuery>,
) -> Result<Json<RecordsResponse>, AppError> {
    let filter = type_filter(params.listing_type.as_deref())?;
    let analysis = snapshot(&state, state.default_scheme).await?;
    let rows = analysis.view(filter).in_price_range(params.min, params.max)?;
    Ok(Json(records_response(rows)))
}

async fn get_top_discount(
    State(state): State<ApiState>,
    Query(params): Query<TopDiscountQuery>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let filter = type_filter(params.listing_type.as_deref())?;
    let k = params.k.unwrap_or(state.default_top_k);
    if k == 0 {
        return Err(AppError::Validation("k must be at least 1".to_string()));
    }
    let analysis = snapshot(&state, state.default_scheme).await?;
    let rows = analysis.view(filter).top_by_discount(k);
    Ok(Json(rows.into_iter().map(ListingResponse::from).collect()))
}

async fn get_buckets(
    State(state): State<ApiState>,
    Query(params): Query<BucketQuery>,
) -> Result<Json<BucketGroups>, AppError> {
    let filter = type_filter(params.listing_type.as_deref())?;
    let scheme = bucket_scheme(params.scheme.as_deref(), state.default_scheme)?;
    let analysis = snapshot(&state, scheme).await?;
    Ok(Json(analysis.view(filter).bucket_groups()))
}

async fn get_bucket(
    State(state): State<ApiState>,
    Path(label): Path<String>,
    Query(params): Query<BucketQuery>,
) -> Result<Json<BucketResponse>, AppError> {
    let filter = type_filter(params.listing_type.as_deref())?;
    let scheme = bucket_scheme(params.scheme.as_deref(), state.default_scheme)?;
    let analysis = snapshot(&state, scheme).await?;
    let view = analysis.view(filter);

    let records: Vec<AnalyzedRecord> = view.in_bucket(&label)?.into_iter().cloned().collect();
    let most_expensive = view.most_expensive_in_bucket(&label)?.cloned();
    Ok(Json(BucketResponse {
        scheme,
        label,
        count: records.len(),
        most_expensive,
        records,
    }))
}

async fn get_price_stats(
    State(state): State<ApiState>,
    Query(params): Query<TypeQuery>,
) -> Result<Json<PriceStatsResponse>, AppError> {
    let filter = type_filter(params.listing_type.as_deref())?;
    let analysis = snapshot(&state, state.default_scheme).await?;
    Ok(Json(PriceStatsResponse {
        overall: analysis.stats(),
        view: analysis.view(filter).summary(),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fresh analysis over the current store contents.
async fn snapshot(state: &ApiState, scheme: BucketScheme) -> Result<Analysis, AppError> {
    let listings = load_listings(&state.pool).await?;
    Ok(Analysis::new(listings, scheme))
}

fn type_filter(raw: Option<&str>) -> Result<TypeFilter, AppError> {
    raw.map_or(Ok(TypeFilter::All), |s| s.parse().map_err(AppError::Validation))
}

fn bucket_scheme(raw: Option<&str>, default: BucketScheme) -> Result<BucketScheme, AppError> {
    raw.map_or(Ok(default), |s| s.parse().map_err(AppError::Validation))
}

fn records_response(rows: Vec<&AnalyzedRecord>) -> RecordsResponse {
    RecordsResponse {
        count: rows.len(),
        records: rows.into_iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::db::{memory_pool, ListingWriter};
    use crate::types::StoreMode;

    fn record(name: &str, discount: u8, price: Option<f64>, t: ListingType) -> ListingRecord {
        ListingRecord {
            name: Some(name.to_string()),
            discount_percent: discount,
            price: price.map(Price::Amount).unwrap_or(Price::Unavailable),
            listing_type: t,
        }
    }

    async fn app() -> Router {
        let pool = memory_pool().await;
        let records = vec![
            record("Game X", 20, Some(79.99), ListingType::Standard),
            record("Game X: Season Pass", 40, Some(29.9), ListingType::Dlc),
            record("Coming Soon", 0, None, ListingType::Preorder),
            record("Mega Bundle", 80, Some(49.0), ListingType::Bundle),
        ];
        ListingWriter::new(pool.clone())
            .write(&records, StoreMode::Overwrite)
            .await
            .unwrap();
        router(ApiState {
            pool,
            default_scheme: BucketScheme::Coarse,
            default_top_k: 10,
        })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn name_search_includes_original_price() {
        let (status, body) = get(app().await, "/listings?name=game%20x").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["original_price"], 99.99);
        assert_eq!(rows[0]["type"], "standard");
    }

    #[tokio::test]
    async fn unavailable_price_is_reported_as_sentinel() {
        let (_, body) = get(app().await, "/listings?name=coming").await;
        assert_eq!(body[0]["price"], "unavailable");
        assert!(body[0]["original_price"].is_null());
    }

    #[tokio::test]
    async fn inverted_price_range_is_bad_request() {
        let (status, _) = get(app().await, "/listings/price-range?min=100&max=10").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(app().await, "/listings/price-range?min=10&max=60").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["records"][0]["name"], "Mega Bundle");
    }

    #[tokio::test]
    async fn top_discount_respects_k_and_type() {
        let (_, body) = get(app().await, "/listings/top-discount?k=2").await;
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Mega Bundle", "Game X: Season Pass"]);

        let (_, body) = get(app().await, "/listings/top-discount?type=preorder").await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = get(app().await, "/listings/top-discount?type=padrao").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn buckets_use_requested_scheme() {
        let (_, body) = get(app().await, "/buckets").await;
        assert_eq!(body["scheme"], "coarse");
        assert_eq!(body["total"], 3);
        assert_eq!(body["buckets"].as_array().unwrap().len(), 5);

        let (_, body) = get(app().await, "/buckets?scheme=fine").await;
        assert_eq!(body["buckets"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn single_bucket_detail() {
        let (status, body) = get(app().await, "/buckets/76-100?scheme=coarse").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["most_expensive"]["name"], "Mega Bundle");

        let (status, _) = get(app().await, "/buckets/0-15?scheme=coarse").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn price_stats_summary() {
        let (_, body) = get(app().await, "/stats/prices").await;
        assert_eq!(body["overall"]["count"], 3);
        assert_eq!(body["view"]["unpriced"], 1);
        assert_eq!(body["view"]["discounted"], 3);
        assert_eq!(body["view"]["max_discount"]["name"], "Mega Bundle");
    }
}
