use chrono_tz::Tz;

use crate::core::time::DateTime;
use crate::core::unit::Pence;
use crate::eonnext::{MeterPointId, UnitRate};

use super::ActiveTariff;
use super::policy::{RateBandPolicies, RateBandPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum RatePeriod {
    #[display("Off-Peak")]
    OffPeak,
    #[display("Peak")]
    Peak,
}

/// Distinct unit rate values, lowest first.
pub fn rate_band(rates: &[UnitRate]) -> Vec<Pence> {
    let mut values: Vec<f64> = rates.iter().map(|r| r.value.0).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();
    values.into_iter().map(Pence).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRate {
    /// GBP per kWh, 4 dp.
    pub rate: f64,
    pub policy: RateBandPolicy,
    /// All listed rates in GBP, in upstream order. Empty for flat rates.
    pub rates: Vec<f64>,
    pub band: Option<BandSelection>,
    pub meter_point: Option<MeterPointId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSelection {
    pub period: RatePeriod,
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone)]
pub struct RateSelector {
    policies: RateBandPolicies,
    timezone: Tz,
}

impl RateSelector {
    pub fn new(policies: RateBandPolicies, timezone: Tz) -> Self {
        Self { policies, timezone }
    }

    pub fn select(&self, active: &ActiveTariff<'_>, now: DateTime) -> Option<SelectedRate> {
        let tariff = active.tariff();
        let meter_point = active.meter_point().cloned();

        if let Some(unit_rate) = tariff.unit_rate {
            return Some(SelectedRate {
                rate: unit_rate.to_pounds(),
                policy: RateBandPolicy::FlatRate,
                rates: vec![],
                band: None,
                meter_point,
            });
        }

        let unit_rates = tariff.unit_rates.as_deref().filter(|rates| !rates.is_empty())?;
        let rates = unit_rates.iter().map(|r| r.value.to_pounds()).collect();

        if let RateBandPolicy::TwoPeriodBand { off_peak } = self.policies.policy_for(tariff) {
            let band = rate_band(unit_rates);

            //a band needs at least a low and a high rate, otherwise fall through to generic
            if let &[low, high, ..] = band.as_slice() {
                let hour = now.hour_in(&self.timezone);
                let (period, selected) = if off_peak.contains(hour) {
                    (RatePeriod::OffPeak, low)
                } else {
                    (RatePeriod::Peak, high)
                };

                tracing::debug!("Selected {} rate of tariff {} at local hour {}", period, tariff.tariff_code, hour);

                return Some(SelectedRate {
                    rate: selected.to_pounds(),
                    policy: RateBandPolicy::TwoPeriodBand { off_peak },
                    rates,
                    band: Some(BandSelection {
                        period,
                        low: low.to_pounds(),
                        high: high.to_pounds(),
                    }),
                    meter_point,
                });
            }
        }

        Some(SelectedRate {
            rate: unit_rates[0].value.to_pounds(),
            policy: RateBandPolicy::Generic,
            rates,
            band: None,
            meter_point,
        })
    }
}
