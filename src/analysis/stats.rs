use serde::Serialize;

/// Outliers sit further than this many standard deviations from the mean.
pub const OUTLIER_SIGMAS: f64 = 3.0;

/// Summary of a price sample, accumulated in one pass (Welford).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1). `None` below two samples.
    pub stddev: Option<f64>,
}

impl PriceStats {
    /// `None` for an empty sample.
    pub fn from_prices<I: IntoIterator<Item = f64>>(prices: I) -> Option<Self> {
        let mut count = 0usize;
        let mut mean = 0.0;
        let mut m2 = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for x in prices {
            count += 1;
            let delta = x - mean;
            mean += delta / count as f64;
            m2 += delta * (x - mean);
            min = min.min(x);
            max = max.max(x);
        }

        if count == 0 {
            return None;
        }
        let stddev = (count > 1).then(|| (m2 / (count - 1) as f64).sqrt());
        Some(Self { count, min, max, mean, stddev })
    }

    /// `|price - mean| > 3σ`. Never true when σ is undefined.
    pub fn is_outlier(&self, price: f64) -> bool {
        match self.stddev {
            Some(sd) => (price - self.mean).abs() > OUTLIER_SIGMAS * sd,
            None => false,
        }
    }
}
