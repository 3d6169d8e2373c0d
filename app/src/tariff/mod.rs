mod policy;
mod rate;
mod resolver;

use chrono_tz::Tz;
use serde::Deserialize;

use policy::{RateBandPolicies, RateBandRule};

pub use policy::RateBandPolicy;
pub use rate::RateSelector;
pub use resolver::{ActiveTariff, resolve_active_tariff};

#[derive(Debug, Deserialize, Clone)]
pub struct TariffConfig {
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default)]
    pub rate_bands: Vec<RateBandRule>,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            rate_bands: vec![],
        }
    }
}

fn default_timezone() -> Tz {
    chrono_tz::Europe::London
}

impl TariffConfig {
    pub fn new_rate_selector(&self) -> RateSelector {
        RateSelector::new(RateBandPolicies::new(self.rate_bands.clone()), self.timezone)
    }
}
