use serde::Deserialize;

use crate::eonnext::Tariff;

const NEXT_DRIVE: &str = "Next Drive";

/// Half-open range of wall-clock hours `[from, to)`. Wraps over midnight when `from > to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawHourRange")]
pub struct HourRange {
    from: u32,
    to: u32,
}

#[derive(Deserialize)]
struct RawHourRange {
    from: u32,
    to: u32,
}

impl HourRange {
    pub fn new(from: u32, to: u32) -> anyhow::Result<Self> {
        if from > 23 || to > 24 {
            anyhow::bail!("Invalid hour range {from}..{to}, hours must be within 0..24");
        }
        if from == to {
            anyhow::bail!("Empty hour range {from}..{to}");
        }

        Ok(Self { from, to })
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.from < self.to {
            self.from <= hour && hour < self.to
        } else {
            hour >= self.from || hour < self.to
        }
    }
}

impl TryFrom<RawHourRange> for HourRange {
    type Error = anyhow::Error;

    fn try_from(raw: RawHourRange) -> Result<Self, Self::Error> {
        HourRange::new(raw.from, raw.to)
    }
}

impl std::fmt::Display for HourRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.from, self.to)
    }
}

/// How the current unit rate of a tariff is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateBandPolicy {
    FlatRate,
    TwoPeriodBand { off_peak: HourRange },
    Generic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateBandRule {
    pub tariff_code: String,
    pub off_peak: HourRange,
}

/// Rate band rules keyed by exact tariff code, on top of the built-in Next Drive rule.
#[derive(Debug, Clone, Default)]
pub struct RateBandPolicies {
    rules: Vec<RateBandRule>,
}

impl RateBandPolicies {
    pub fn new(rules: Vec<RateBandRule>) -> Self {
        Self { rules }
    }

    pub fn policy_for(&self, tariff: &Tariff) -> RateBandPolicy {
        if tariff.unit_rate.is_some() {
            return RateBandPolicy::FlatRate;
        }

        if let Some(rule) = self.rules.iter().find(|r| r.tariff_code == tariff.tariff_code) {
            return RateBandPolicy::TwoPeriodBand {
                off_peak: rule.off_peak,
            };
        }

        if tariff.name().is_some_and(|name| name.contains(NEXT_DRIVE)) {
            return RateBandPolicy::TwoPeriodBand {
                off_peak: HourRange { from: 0, to: 7 },
            };
        }

        RateBandPolicy::Generic
    }
}
