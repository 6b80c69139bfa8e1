/// Price before the discount was applied: `price / (1 - d/100)`, rounded to
/// cents. `None` at 100% off, where the original is unrecoverable.
///
/// Computed on whole cents so that exact halves such as `79.99 / 0.8 =
/// 99.9875` round up instead of drifting below the half in binary.
pub fn original_price(price: f64, discount_percent: u8) -> Option<f64> {
    if discount_percent >= 100 {
        return None;
    }
    let cents = (price * 100.0).round();
    let remaining = f64::from(100 - discount_percent);
    let original = (cents * 100.0 / remaining).round() / 100.0;
    original.is_finite().then_some(original)
}
