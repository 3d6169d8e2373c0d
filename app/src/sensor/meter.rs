use crate::core::unit::CubicMeters;
use crate::eonnext::{AccountDataSource, Meter};

use super::{SensorContext, SensorMetadata, SensorState, SensorValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterSensor {
    ReadingDate,
    ElectricityKwh,
    GasCubicMeters,
    GasKwh,
}

impl MeterSensor {
    pub fn metadata(&self) -> SensorMetadata {
        match self {
            MeterSensor::ReadingDate => SensorMetadata {
                suffix: "reading_date",
                label: "Reading Date",
                device_class: Some("date"),
                icon: Some("mdi:calendar"),
                ..Default::default()
            },
            MeterSensor::ElectricityKwh => SensorMetadata {
                suffix: "electricity_kwh",
                label: "Electricity",
                device_class: Some("energy"),
                unit_of_measurement: Some("kWh"),
                state_class: Some("total"),
                icon: Some("mdi:meter-electric-outline"),
            },
            MeterSensor::GasCubicMeters => SensorMetadata {
                suffix: "gas_m3",
                label: "Gas",
                device_class: Some("gas"),
                unit_of_measurement: Some("m³"),
                state_class: Some("total"),
                icon: Some("mdi:meter-gas-outline"),
            },
            MeterSensor::GasKwh => SensorMetadata {
                suffix: "gas_kwh",
                label: "Gas kWh",
                device_class: Some("energy"),
                unit_of_measurement: Some("kWh"),
                state_class: Some("total"),
                icon: Some("mdi:meter-gas-outline"),
            },
        }
    }

    pub async fn refresh<D: AccountDataSource>(
        &self,
        meter: &Meter,
        ctx: &SensorContext<D>,
    ) -> anyhow::Result<SensorState> {
        let Some(reading) = ctx.data_source.latest_reading(meter).await? else {
            return Ok(SensorState::unknown());
        };

        let value = match self {
            MeterSensor::ReadingDate => SensorValue::Date(reading.read_at.date_in(&ctx.timezone)),
            MeterSensor::ElectricityKwh | MeterSensor::GasCubicMeters => SensorValue::Number(reading.value),
            MeterSensor::GasKwh => SensorValue::Number(CubicMeters(reading.value).to_kwh(ctx.gas_calorific_value).0),
        };

        Ok(SensorState::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::DateTime;
    use crate::eonnext::MeterReading;
    use crate::sensor::fake::*;

    fn context_with_reading(meter: &Meter, value: f64, read_at: &str) -> SensorContext<FakeDataSource> {
        let mut ds = FakeDataSource::default();
        ds.readings.insert(
            meter.id.clone(),
            MeterReading {
                value,
                read_at: DateTime::from_iso(read_at).unwrap(),
            },
        );
        context(ds)
    }

    #[tokio::test]
    async fn test_electricity_reading() {
        let meter = electricity_meter();
        let ctx = context_with_reading(&meter, 5120.25, "2024-03-01T05:00:00Z");

        let state = MeterSensor::ElectricityKwh.refresh(&meter, &ctx).await.unwrap();

        assert_eq!(state, SensorState::new(SensorValue::Number(5120.25)));
    }

    #[tokio::test]
    async fn test_gas_reading_in_kwh() {
        let meter = gas_meter();
        let ctx = context_with_reading(&meter, 100.0, "2024-03-01T05:00:00Z");

        let m3 = MeterSensor::GasCubicMeters.refresh(&meter, &ctx).await.unwrap();
        let kwh = MeterSensor::GasKwh.refresh(&meter, &ctx).await.unwrap();

        assert_eq!(m3.value, SensorValue::Number(100.0));
        assert_eq!(kwh.value, SensorValue::Number(1122.063));
    }

    #[tokio::test]
    async fn test_reading_date_in_local_time() {
        let meter = gas_meter();
        //23:30 UTC is already the next day in BST
        let ctx = context_with_reading(&meter, 100.0, "2024-07-01T23:30:00Z");

        let state = MeterSensor::ReadingDate.refresh(&meter, &ctx).await.unwrap();

        assert_eq!(
            state.value,
            SensorValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 7, 2).unwrap())
        );
    }

    #[tokio::test]
    async fn test_no_reading() {
        let ctx = context(FakeDataSource::default());

        let state = MeterSensor::ElectricityKwh
            .refresh(&electricity_meter(), &ctx)
            .await
            .unwrap();

        assert_eq!(state, SensorState::unknown());
    }
}
