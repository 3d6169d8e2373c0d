use crate::core::math::round_to;

use super::KiloWattHours;

//standard UK gas volume correction factor (temperature and pressure)
const VOLUME_CORRECTION: f64 = 1.02264;
const MJ_PER_KWH: f64 = 3.6;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CubicMeters(pub f64);

impl CubicMeters {
    /// Energy content for a calorific value given in MJ/m³, rounded to 3 dp.
    pub fn to_kwh(&self, calorific_value: f64) -> KiloWattHours {
        KiloWattHours(round_to(
            self.0 * VOLUME_CORRECTION * calorific_value / MJ_PER_KWH,
            3,
        ))
    }
}
