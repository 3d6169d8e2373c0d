mod account;
mod charger;
mod meter;
mod runner;

use anyhow::Context;
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::time::DateTime;
use crate::eonnext::{AccountDataSource, AccountNumber, Charger, Meter, MeterPointId, MeterType};
use crate::tariff::RateSelector;

pub use account::AccountSensor;
pub use charger::ChargerSensor;
pub use meter::MeterSensor;
pub use runner::{SensorReport, SensorRunner, SensorStore, StatePublisher};

/// A single displayed value, bound to the account, meter or charger it describes.
#[derive(Debug, Clone, PartialEq)]
pub enum Sensor {
    Meter(Meter, MeterSensor),
    Charger(Charger, ChargerSensor),
    Account(AccountNumber, AccountSensor),
}

/// Static presentation data of a sensor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SensorMetadata {
    #[serde(skip)]
    pub suffix: &'static str,
    #[serde(skip)]
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
    Timestamp(DateTime),
    Date(chrono::NaiveDate),
    Unknown,
}

impl SensorValue {
    pub fn to_state_string(&self) -> String {
        match self {
            SensorValue::Number(n) => n.to_string(),
            SensorValue::Text(t) => t.clone(),
            SensorValue::Timestamp(dt) => dt.to_iso_string(),
            SensorValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            SensorValue::Unknown => "unknown".to_owned(),
        }
    }
}

impl From<Option<DateTime>> for SensorValue {
    fn from(value: Option<DateTime>) -> Self {
        value.map_or(SensorValue::Unknown, SensorValue::Timestamp)
    }
}

impl From<Option<f64>> for SensorValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(SensorValue::Unknown, SensorValue::Number)
    }
}

/// Result of one refresh. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub value: SensorValue,
    pub attributes: Map<String, Value>,
}

impl SensorState {
    pub fn new(value: impl Into<SensorValue>) -> Self {
        Self {
            value: value.into(),
            attributes: Map::new(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(SensorValue::Unknown)
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_owned(), value);
        self
    }

    pub fn with_meter_point(self, meter_point: Option<&MeterPointId>) -> Self {
        match meter_point {
            Some(mp) => self.with(mp.attribute_name(), Value::String(mp.value().to_owned())),
            None => self,
        }
    }
}

/// Everything a sensor needs to derive its state.
pub struct SensorContext<D> {
    pub data_source: D,
    pub rate_selector: RateSelector,
    pub timezone: Tz,
    pub gas_calorific_value: f64,
}

impl Sensor {
    fn key(&self) -> &str {
        match self {
            Sensor::Meter(meter, _) => &meter.serial,
            Sensor::Charger(charger, _) => &charger.serial,
            Sensor::Account(account, _) => account.as_str(),
        }
    }

    pub fn metadata(&self) -> SensorMetadata {
        match self {
            Sensor::Meter(_, kind) => kind.metadata(),
            Sensor::Charger(_, kind) => kind.metadata(),
            Sensor::Account(_, kind) => kind.metadata(),
        }
    }

    pub fn unique_id(&self) -> String {
        format!("{}__{}", self.key(), self.metadata().suffix)
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.key(), self.metadata().label)
    }

    pub async fn refresh<D: AccountDataSource>(
        &self,
        ctx: &SensorContext<D>,
        now: DateTime,
    ) -> anyhow::Result<SensorState> {
        match self {
            Sensor::Meter(meter, kind) => kind.refresh(meter, ctx).await,
            Sensor::Charger(charger, kind) => kind.refresh(charger, ctx).await,
            Sensor::Account(account, kind) => kind.refresh(account, ctx, now).await,
        }
    }
}

/// Builds the sensor set of all accounts. Meters without any reading get no sensors.
pub async fn discover_sensors<D: AccountDataSource>(data_source: &D) -> anyhow::Result<Vec<Sensor>> {
    let mut sensors = vec![];

    for account in data_source.accounts().await? {
        for meter in account.meters {
            let reading = data_source
                .latest_reading(&meter)
                .await
                .with_context(|| format!("Error checking readings of meter {}", meter.serial))?;

            if reading.is_none() {
                tracing::info!("Skipping meter {} without readings", meter.serial);
                continue;
            }

            let kinds: &[MeterSensor] = match meter.meter_type {
                MeterType::Electricity => &[MeterSensor::ReadingDate, MeterSensor::ElectricityKwh],
                MeterType::Gas => &[MeterSensor::ReadingDate, MeterSensor::GasCubicMeters, MeterSensor::GasKwh],
            };
            sensors.extend(kinds.iter().map(|kind| Sensor::Meter(meter.clone(), *kind)));
        }

        for charger in account.chargers {
            sensors.extend(
                ChargerSensor::ALL
                    .iter()
                    .map(|kind| Sensor::Charger(charger.clone(), *kind)),
            );
        }

        sensors.extend(
            AccountSensor::ALL
                .iter()
                .map(|kind| Sensor::Account(account.number.clone(), *kind)),
        );
    }

    tracing::info!("Discovered {} sensors", sensors.len());
    Ok(sensors)
}


#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use crate::eonnext::MeterReading;

    #[test]
    fn test_unique_id_and_name() {
        let sensor = Sensor::Meter(gas_meter(), MeterSensor::GasKwh);

        assert_eq!(sensor.unique_id(), "G4A12345__gas_kwh");
        assert_eq!(sensor.name(), "G4A12345 Gas kWh");
    }

    #[test]
    fn test_account_sensor_unique_id() {
        let sensor = Sensor::Account(account_number(), AccountSensor::UnitRate);

        assert_eq!(sensor.unique_id(), "A-12345678__unit_rate");
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(SensorValue::Number(25.0).to_state_string(), "25");
        assert_eq!(SensorValue::Number(0.2457).to_state_string(), "0.2457");
        assert_eq!(SensorValue::Unknown.to_state_string(), "unknown");
        assert_eq!(
            SensorValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).to_state_string(),
            "2024-03-01"
        );
        assert_eq!(
            SensorValue::Timestamp(DateTime::from_iso("2024-03-01T05:00:00Z").unwrap()).to_state_string(),
            "2024-03-01T05:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_discovery_skips_meters_without_reading() {
        let mut ds = FakeDataSource {
            accounts: vec![account()],
            ..Default::default()
        };
        ds.readings.insert(
            "gm-1".to_owned(),
            MeterReading {
                value: 1234.5,
                read_at: DateTime::from_iso("2024-03-01T05:00:00Z").unwrap(),
            },
        );

        let ids: Vec<_> = discover_sensors(&ds).await.unwrap().iter().map(|s| s.unique_id()).collect();

        assert_eq!(
            ids,
            vec![
                "G4A12345__reading_date",
                "G4A12345__gas_m3",
                "G4A12345__gas_kwh",
                "EVC-001__smart_charging_schedule",
                "EVC-001__next_charge_start",
                "EVC-001__next_charge_end",
                "EVC-001__next_charge_start_2",
                "EVC-001__next_charge_end_2",
                "A-12345678__current_tariff",
                "A-12345678__standing_charge",
                "A-12345678__unit_rate",
                "A-12345678__saving_sessions",
            ]
        );
    }

    #[tokio::test]
    async fn test_discovery_of_electricity_meter() {
        let mut ds = FakeDataSource {
            accounts: vec![account()],
            ..Default::default()
        };
        ds.readings.insert(
            "em-1".to_owned(),
            MeterReading {
                value: 5120.0,
                read_at: DateTime::from_iso("2024-03-01T05:00:00Z").unwrap(),
            },
        );

        let sensors = discover_sensors(&ds).await.unwrap();

        assert!(sensors.contains(&Sensor::Meter(electricity_meter(), MeterSensor::ReadingDate)));
        assert!(sensors.contains(&Sensor::Meter(electricity_meter(), MeterSensor::ElectricityKwh)));
        assert!(!sensors.iter().any(|s| matches!(s, Sensor::Meter(m, _) if m.serial == "G4A12345")));
    }
}
