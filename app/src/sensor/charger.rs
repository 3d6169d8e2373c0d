use serde_json::json;

use crate::eonnext::{AccountDataSource, Charger};

use super::{SensorContext, SensorMetadata, SensorState, SensorValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerSensor {
    SmartChargingSchedule,
    NextChargeStart,
    NextChargeEnd,
    NextChargeStart2,
    NextChargeEnd2,
}

#[derive(Debug, Clone, Copy)]
enum SlotEdge {
    Start,
    End,
}

impl ChargerSensor {
    pub const ALL: [ChargerSensor; 5] = [
        ChargerSensor::SmartChargingSchedule,
        ChargerSensor::NextChargeStart,
        ChargerSensor::NextChargeEnd,
        ChargerSensor::NextChargeStart2,
        ChargerSensor::NextChargeEnd2,
    ];

    pub fn metadata(&self) -> SensorMetadata {
        let (suffix, label) = match self {
            ChargerSensor::SmartChargingSchedule => {
                return SensorMetadata {
                    suffix: "smart_charging_schedule",
                    label: "Smart Charging Schedule",
                    icon: Some("mdi:ev-station"),
                    ..Default::default()
                };
            }
            ChargerSensor::NextChargeStart => ("next_charge_start", "Next Charge Start"),
            ChargerSensor::NextChargeEnd => ("next_charge_end", "Next Charge End"),
            ChargerSensor::NextChargeStart2 => ("next_charge_start_2", "Next Charge Start 2"),
            ChargerSensor::NextChargeEnd2 => ("next_charge_end_2", "Next Charge End 2"),
        };

        let icon = match self.slot() {
            Some((_, SlotEdge::Start)) => "mdi:clock-start",
            _ => "mdi:clock-end",
        };

        SensorMetadata {
            suffix,
            label,
            device_class: Some("timestamp"),
            icon: Some(icon),
            ..Default::default()
        }
    }

    fn slot(&self) -> Option<(usize, SlotEdge)> {
        match self {
            ChargerSensor::SmartChargingSchedule => None,
            ChargerSensor::NextChargeStart => Some((0, SlotEdge::Start)),
            ChargerSensor::NextChargeEnd => Some((0, SlotEdge::End)),
            ChargerSensor::NextChargeStart2 => Some((1, SlotEdge::Start)),
            ChargerSensor::NextChargeEnd2 => Some((1, SlotEdge::End)),
        }
    }

    pub async fn refresh<D: AccountDataSource>(
        &self,
        charger: &Charger,
        ctx: &SensorContext<D>,
    ) -> anyhow::Result<SensorState> {
        let schedule = ctx.data_source.charge_schedule(charger).await?;

        let state = match (self.slot(), schedule) {
            (None, None) => SensorState::new(SensorValue::Text("Unknown".to_owned())),
            (None, Some(slots)) if slots.is_empty() => {
                SensorState::new(SensorValue::Text("No Schedule".to_owned())).with("schedule", json!([]))
            }
            (None, Some(slots)) => {
                SensorState::new(SensorValue::Text("Active".to_owned())).with("schedule", json!(slots.as_slice()))
            }
            (Some((index, edge)), schedule) => {
                let slot = schedule.as_ref().and_then(|slots| slots.get(index));
                let time = match edge {
                    SlotEdge::Start => slot.and_then(|s| s.start),
                    SlotEdge::End => slot.and_then(|s| s.end),
                };
                SensorState::new(time)
            }
        };

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use serde_json::Value;

    use super::*;
    use crate::core::time::DateTime;
    use crate::eonnext::ChargeSlot;
    use crate::sensor::fake::*;

    fn slot(start: &str, end: &str) -> ChargeSlot {
        ChargeSlot {
            start: Some(DateTime::from_iso(start).unwrap()),
            end: Some(DateTime::from_iso(end).unwrap()),
        }
    }

    fn context_with_schedule(slots: Option<Vec<ChargeSlot>>) -> SensorContext<FakeDataSource> {
        let mut ds = FakeDataSource::default();
        if let Some(slots) = slots {
            ds.schedules.insert(charger().device_id, slots);
        }
        context(ds)
    }

    #[tokio::test]
    async fn test_active_schedule() {
        let ctx = context_with_schedule(Some(vec![
            slot("2024-03-01T23:30:00Z", "2024-03-02T01:00:00Z"),
            slot("2024-03-02T03:00:00Z", "2024-03-02T05:30:00Z"),
        ]));

        let state = ChargerSensor::SmartChargingSchedule
            .refresh(&charger(), &ctx)
            .await
            .unwrap();

        assert_eq!(state.value, SensorValue::Text("Active".to_owned()));
        assert_json_eq!(
            Value::Object(state.attributes),
            json!({
                "schedule": [
                    { "start": "2024-03-01T23:30:00Z", "end": "2024-03-02T01:00:00Z" },
                    { "start": "2024-03-02T03:00:00Z", "end": "2024-03-02T05:30:00Z" }
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_empty_schedule() {
        let ctx = context_with_schedule(Some(vec![]));

        let state = ChargerSensor::SmartChargingSchedule
            .refresh(&charger(), &ctx)
            .await
            .unwrap();

        assert_eq!(state.value, SensorValue::Text("No Schedule".to_owned()));
        assert_json_eq!(Value::Object(state.attributes), json!({ "schedule": [] }));
    }

    #[tokio::test]
    async fn test_unknown_schedule() {
        let ctx = context_with_schedule(None);

        let state = ChargerSensor::SmartChargingSchedule
            .refresh(&charger(), &ctx)
            .await
            .unwrap();

        assert_eq!(state.value, SensorValue::Text("Unknown".to_owned()));
        assert!(state.attributes.is_empty());
    }

    #[tokio::test]
    async fn test_next_charge_slots() {
        let ctx = context_with_schedule(Some(vec![
            slot("2024-03-01T23:30:00Z", "2024-03-02T01:00:00Z"),
            slot("2024-03-02T03:00:00Z", "2024-03-02T05:30:00Z"),
        ]));
        let at = |iso: &str| SensorValue::Timestamp(DateTime::from_iso(iso).unwrap());

        for (sensor, expected) in [
            (ChargerSensor::NextChargeStart, at("2024-03-01T23:30:00Z")),
            (ChargerSensor::NextChargeEnd, at("2024-03-02T01:00:00Z")),
            (ChargerSensor::NextChargeStart2, at("2024-03-02T03:00:00Z")),
            (ChargerSensor::NextChargeEnd2, at("2024-03-02T05:30:00Z")),
        ] {
            let state = sensor.refresh(&charger(), &ctx).await.unwrap();
            assert_eq!(state.value, expected, "{sensor:?}");
        }
    }

    #[tokio::test]
    async fn test_second_slot_missing() {
        let ctx = context_with_schedule(Some(vec![slot("2024-03-01T23:30:00Z", "2024-03-02T01:00:00Z")]));

        let start = ChargerSensor::NextChargeStart2.refresh(&charger(), &ctx).await.unwrap();
        let end = ChargerSensor::NextChargeEnd2.refresh(&charger(), &ctx).await.unwrap();

        assert_eq!(start.value, SensorValue::Unknown);
        assert_eq!(end.value, SensorValue::Unknown);
    }

    #[test]
    fn test_slot_sensor_metadata() {
        let metadata = ChargerSensor::NextChargeEnd2.metadata();

        assert_eq!(metadata.suffix, "next_charge_end_2");
        assert_eq!(metadata.device_class, Some("timestamp"));
        assert_eq!(metadata.icon, Some("mdi:clock-end"));
    }
}
