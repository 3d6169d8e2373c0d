use crate::core::time::DateTime;
use crate::eonnext::{Agreement, MeterPointId, Tariff};

/// The agreement in force at a given instant, borrowed from the account snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveTariff<'a> {
    agreement: &'a Agreement,
}

/// First agreement in source order that has not ended yet.
///
/// Agreements without an end date are open-ended and always qualify. Overlapping
/// upstream data is passed through: the first match wins.
pub fn resolve_active_tariff(agreements: &[Agreement], now: DateTime) -> Option<ActiveTariff<'_>> {
    agreements
        .iter()
        .find(|agreement| match agreement.valid_to {
            None => true,
            Some(valid_to) => valid_to > now,
        })
        .map(|agreement| ActiveTariff { agreement })
}

impl<'a> ActiveTariff<'a> {
    pub fn tariff(&self) -> &'a Tariff {
        &self.agreement.tariff
    }

    pub fn tariff_ref(&self) -> &'a str {
        &self.agreement.tariff_ref
    }

    pub fn display_name(&self) -> Option<&'a str> {
        self.tariff().name()
    }

    pub fn tariff_code(&self) -> &'a str {
        &self.tariff().tariff_code
    }

    pub fn tariff_type(&self) -> &'a str {
        &self.tariff().tariff_type
    }

    pub fn is_variable(&self) -> bool {
        self.tariff().is_variable
    }

    pub fn valid_from(&self) -> Option<DateTime> {
        self.agreement.valid_from
    }

    pub fn valid_to(&self) -> Option<DateTime> {
        self.agreement.valid_to
    }

    pub fn meter_point(&self) -> Option<&'a MeterPointId> {
        self.agreement.meter_point.as_ref()
    }

    /// Standing charge in pounds per day, 4 dp.
    pub fn standing_charge(&self) -> Option<f64> {
        self.tariff().standing_charge.map(|p| p.to_pounds())
    }
}
