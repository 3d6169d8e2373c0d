use crate::core::math::round_to;

/// Monetary amount in GBP pence, as delivered by the tariff API.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Pence(pub f64);

impl Pence {
    /// Divide by 100, round to 4 dp.
    pub fn to_pounds(&self) -> f64 {
        round_to(self.0 / 100.0, 4)
    }
}
