/// Rounds half away from zero to the given number of decimal places.
pub fn round_to(value: f64, decimal_places: i32) -> f64 {
    let factor = 10f64.powi(decimal_places);
    (value * factor).round() / factor
}
