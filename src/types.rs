use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One catalog entry as extracted from a listing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRecord {
    /// `None` when neither title variant is present on the node.
    pub name: Option<String>,
    pub discount_percent: u8,
    pub price: Price,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// Canonical price of a listing. Never a partially assembled value: either
/// all three rendered fragments parsed into a number, or `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Price {
    Amount(f64),
    Unavailable,
}

impl Price {
    pub fn amount(&self) -> Option<f64> {
        match self {
            Price::Amount(v) => Some(*v),
            Price::Unavailable => None,
        }
    }

    /// Store representation: `NULL` for the unavailable sentinel.
    pub fn from_column(v: Option<f64>) -> Self {
        match v {
            Some(v) if v.is_finite() && v >= 0.0 => Price::Amount(v),
            _ => Price::Unavailable,
        }
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Price::Amount(v) => serializer.serialize_f64(*v),
            Price::Unavailable => serializer.serialize_str("unavailable"),
        }
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Price::Amount(v) => write!(f, "{v:.2}"),
            Price::Unavailable => write!(f, "unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Preorder,
    Dlc,
    Bundle,
    Standard,
}

impl ListingType {
    pub const ALL: [ListingType; 4] = [
        ListingType::Preorder,
        ListingType::Dlc,
        ListingType::Bundle,
        ListingType::Standard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Preorder => "preorder",
            ListingType::Dlc => "dlc",
            ListingType::Bundle => "bundle",
            ListingType::Standard => "standard",
        }
    }
}

impl std::fmt::Display for ListingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ListingType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ListingType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown listing type '{s}'"))
    }
}

/// Restriction applied to a record set before any view is computed.
/// `All` is the "no restriction" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(ListingType),
}

impl TypeFilter {
    pub fn admits(&self, t: ListingType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(only) => *only == t,
        }
    }
}

impl std::str::FromStr for TypeFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(TypeFilter::All)
        } else {
            s.parse().map(TypeFilter::Only)
        }
    }
}

// ---------------------------------------------------------------------------
// Store mode
// ---------------------------------------------------------------------------

/// How an extraction run lands in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Replace every existing row with this run's records.
    Overwrite,
    /// Keep existing rows and add this run's records after them.
    Append,
}

impl std::str::FromStr for StoreMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(StoreMode::Overwrite),
            "append" => Ok(StoreMode::Append),
            other => Err(format!("unknown store mode '{other}'")),
        }
    }
}
