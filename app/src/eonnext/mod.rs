mod cache;
mod client;
mod dto;
mod error;

use std::sync::Arc;

use serde::Deserialize;

use crate::core::time::{DateTime, Duration};
use crate::core::unit::Pence;

pub use cache::CachingDataSource;
pub use client::EonNextClient;
pub use error::EonNextError;

#[derive(Debug, Deserialize, Clone)]
pub struct EonNext {
    #[serde(default = "default_url")]
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_gas_calorific_value")]
    pub gas_calorific_value: f64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: Duration,
}

fn default_url() -> String {
    "https://api.eonnext-kraken.energy/v1/graphql/".to_owned()
}

fn default_gas_calorific_value() -> f64 {
    39.5
}

fn default_cache_ttl() -> Duration {
    Duration::minutes(5)
}

impl EonNext {
    pub fn new_data_source(&self) -> anyhow::Result<CachingDataSource<EonNextClient>> {
        let client = EonNextClient::new(&self.url, &self.username, &self.password)?;
        Ok(CachingDataSource::new(client, self.cache_ttl))
    }
}

/// Read access to the account graph of the vendor API.
///
/// Every method returns a snapshot; consumers only read and derive from it.
pub trait AccountDataSource {
    async fn accounts(&self) -> anyhow::Result<Vec<Account>>;

    async fn tariff_data(&self, account: &AccountNumber) -> anyhow::Result<Arc<Vec<Agreement>>>;

    async fn saving_sessions(&self, account: &AccountNumber) -> anyhow::Result<Arc<Vec<SavingSession>>>;

    async fn latest_reading(&self, meter: &Meter) -> anyhow::Result<Option<MeterReading>>;

    /// `None` when the vendor cannot tell whether the charger has a schedule.
    async fn charge_schedule(&self, charger: &Charger) -> anyhow::Result<Option<Arc<Vec<ChargeSlot>>>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, serde::Serialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub number: AccountNumber,
    pub meters: Vec<Meter>,
    pub chargers: Vec<Charger>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum MeterType {
    Electricity,
    Gas,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MeterPointId {
    Mpan(String),
    Mprn(String),
}

impl MeterPointId {
    pub fn attribute_name(&self) -> &'static str {
        match self {
            MeterPointId::Mpan(_) => "mpan",
            MeterPointId::Mprn(_) => "mprn",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            MeterPointId::Mpan(id) | MeterPointId::Mprn(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Meter {
    pub id: String,
    pub serial: String,
    pub meter_type: MeterType,
    pub meter_point: MeterPointId,
    pub account: AccountNumber,
}

/// Electricity readings are in kWh, gas readings in cubic meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub value: f64,
    pub read_at: DateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Charger {
    pub device_id: String,
    pub serial: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChargeSlot {
    pub start: Option<DateTime>,
    pub end: Option<DateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agreement {
    pub tariff_ref: String,
    pub valid_from: Option<DateTime>,
    pub valid_to: Option<DateTime>,
    pub meter_point: Option<MeterPointId>,
    pub tariff: Tariff,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tariff {
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub tariff_code: String,
    pub tariff_type: String,
    pub is_variable: bool,
    pub standing_charge: Option<Pence>,
    pub unit_rate: Option<Pence>,
    pub unit_rates: Option<Vec<UnitRate>>,
}

impl Tariff {
    /// Display name, falling back to the full name.
    pub fn name(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.full_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct UnitRate {
    pub value: Pence,
    pub valid_from: Option<DateTime>,
    pub valid_to: Option<DateTime>,
}

/// Canonical saving session. Upstream field aliases are resolved by the wire adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SavingSession {
    pub id: String,
    pub kind: Option<String>,
    pub start: Option<DateTime>,
    pub end: Option<DateTime>,
}
