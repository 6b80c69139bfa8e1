/// Row type for the `listings` table. `price` is NULL for the unavailable
/// sentinel.
#[derive(Debug, sqlx::FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub name: Option<String>,
    pub discount_percent: i64,
    pub price: Option<f64>,
    #[sqlx(rename = "type")]
    pub listing_type: String,
}
