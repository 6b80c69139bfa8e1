use serde::{Deserialize, Serialize};

/// Named partition of the 0–100% discount range. One analysis uses exactly
/// one scheme; the two are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketScheme {
    /// 0–5, 6–30, 31–50, 51–75, 76–100
    #[default]
    Coarse,
    /// 0–15, 16–30, 31–45, 46–60, 61–75, 76–90, 91–100
    Fine,
}

const COARSE_UPPER: &[u8] = &[5, 30, 50, 75, 100];
const COARSE_LABELS: &[&str] = &["0-5%", "6-30%", "31-50%", "51-75%", "76-100%"];

const FINE_UPPER: &[u8] = &[15, 30, 45, 60, 75, 90, 100];
const FINE_LABELS: &[&str] = &[
    "0-15%", "16-30%", "31-45%", "46-60%", "61-75%", "76-90%", "91-100%",
];

impl BucketScheme {
    /// Inclusive upper bound of each bucket, ascending. The first bucket
    /// starts at 0.
    fn upper_bounds(&self) -> &'static [u8] {
        match self {
            BucketScheme::Coarse => COARSE_UPPER,
            BucketScheme::Fine => FINE_UPPER,
        }
    }

    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            BucketScheme::Coarse => COARSE_LABELS,
            BucketScheme::Fine => FINE_LABELS,
        }
    }

    /// Index of the bucket holding `discount`. Values above 100 land in the
    /// last bucket.
    pub fn index_of(&self, discount: u8) -> usize {
        let bounds = self.upper_bounds();
        bounds
            .iter()
            .position(|&upper| discount <= upper)
            .unwrap_or(bounds.len() - 1)
    }

    pub fn label_of(&self, discount: u8) -> &'static str {
        self.labels()[self.index_of(discount)]
    }

    /// Bucket index for a label, accepting the label with or without `%`.
    pub fn index_of_label(&self, label: &str) -> Option<usize> {
        let wanted = label.trim().trim_end_matches('%');
        self.labels()
            .iter()
            .position(|l| l.trim_end_matches('%') == wanted)
    }
}

impl std::fmt::Display for BucketScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketScheme::Coarse => write!(f, "coarse"),
            BucketScheme::Fine => write!(f, "fine"),
        }
    }
}

impl std::str::FromStr for BucketScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coarse" | "5" => Ok(BucketScheme::Coarse),
            "fine" | "7" => Ok(BucketScheme::Fine),
            other => Err(format!("unknown bucket scheme '{other}' (expected coarse or fine)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_boundaries_are_right_closed() {
        let s = BucketScheme::Coarse;
        assert_eq!(s.label_of(0), "0-5%");
        assert_eq!(s.label_of(5), "0-5%");
        assert_eq!(s.label_of(6), "6-30%");
        assert_eq!(s.label_of(30), "6-30%");
        assert_eq!(s.label_of(31), "31-50%");
        assert_eq!(s.label_of(75), "51-75%");
        assert_eq!(s.label_of(76), "76-100%");
        assert_eq!(s.label_of(100), "76-100%");
    }

    #[test]
    fn fine_boundaries() {
        let s = BucketScheme::Fine;
        assert_eq!(s.label_of(15), "0-15%");
        assert_eq!(s.label_of(16), "16-30%");
        assert_eq!(s.label_of(90), "76-90%");
        assert_eq!(s.label_of(91), "91-100%");
    }

    #[test]
    fn every_discount_has_exactly_one_bucket() {
        for scheme in [BucketScheme::Coarse, BucketScheme::Fine] {
            let mut counts = vec![0usize; scheme.labels().len()];
            for d in 0..=100u8 {
                counts[scheme.index_of(d)] += 1;
            }
            assert_eq!(counts.iter().sum::<usize>(), 101);
            assert!(counts.iter().all(|&c| c > 0), "{scheme}: {counts:?}");
        }
    }

    #[test]
    fn label_lookup_tolerates_missing_percent() {
        assert_eq!(BucketScheme::Coarse.index_of_label("31-50"), Some(2));
        assert_eq!(BucketScheme::Coarse.index_of_label("31-50%"), Some(2));
        assert_eq!(BucketScheme::Coarse.index_of_label("0-15%"), None);
        assert_eq!(BucketScheme::Fine.index_of_label("0-15%"), Some(0));
    }
}
