use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::core::time::{DateTime, Duration};
use crate::eonnext::AccountDataSource;
use crate::t;

use super::{Sensor, SensorContext, SensorMetadata, SensorState};

/// Outcome of the last refresh of a sensor. `state` is `None` when the sensor is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReport {
    pub unique_id: String,
    pub name: String,
    #[serde(flatten)]
    pub metadata: SensorMetadata,
    pub state: Option<SensorState>,
    pub updated_at: DateTime,
}

pub trait StatePublisher {
    async fn publish(&self, report: &SensorReport) -> anyhow::Result<()>;
}

/// Latest report per sensor, shared with the HTTP API.
#[derive(Debug, Clone, Default)]
pub struct SensorStore {
    reports: Arc<RwLock<BTreeMap<String, SensorReport>>>,
}

impl SensorStore {
    pub async fn all(&self) -> Vec<SensorReport> {
        self.reports.read().await.values().cloned().collect()
    }

    pub async fn get(&self, unique_id: &str) -> Option<SensorReport> {
        self.reports.read().await.get(unique_id).cloned()
    }

    pub async fn put(&self, report: SensorReport) {
        self.reports.write().await.insert(report.unique_id.clone(), report);
    }
}

pub struct SensorRunner<D, P> {
    context: SensorContext<D>,
    publisher: P,
    sensors: Vec<Sensor>,
    store: SensorStore,
    refresh_interval: Duration,
}

impl<D, P> SensorRunner<D, P>
where
    D: AccountDataSource,
    P: StatePublisher,
{
    pub fn new(context: SensorContext<D>, publisher: P, sensors: Vec<Sensor>, refresh_interval: Duration) -> Self {
        Self {
            context,
            publisher,
            sensors,
            store: SensorStore::default(),
            refresh_interval,
        }
    }

    pub fn store(&self) -> SensorStore {
        self.store.clone()
    }

    pub async fn run(self) {
        let mut timer = tokio::time::interval(self.refresh_interval.into());

        loop {
            timer.tick().await;
            self.refresh_all().await;
        }
    }

    #[tracing::instrument(skip(self), fields(sensors = self.sensors.len()))]
    pub async fn refresh_all(&self) {
        let now = t!(now);

        let available = futures::future::join_all(self.sensors.iter().map(|sensor| self.refresh(sensor, now)))
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count();

        tracing::info!("Refreshed {} of {} sensors", available, self.sensors.len());
    }

    async fn refresh(&self, sensor: &Sensor, now: DateTime) -> bool {
        let unique_id = sensor.unique_id();

        let state = match sensor.refresh(&self.context, now).await {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::error!("Error refreshing sensor {}: {:?}", unique_id, e);
                None
            }
        };
        let available = state.is_some();

        let report = SensorReport {
            unique_id,
            name: sensor.name(),
            metadata: sensor.metadata(),
            state,
            updated_at: now,
        };

        if let Err(e) = self.publisher.publish(&report).await {
            tracing::error!("Error publishing sensor {}: {:?}", report.unique_id, e);
        }

        self.store.put(report).await;
        available
    }
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;
    use crate::core::time::FIXED_NOW;
    use crate::sensor::fake::*;
    use crate::sensor::{AccountSensor, SensorValue, discover_sensors};

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<SensorReport>>,
        fail: bool,
    }

    impl StatePublisher for RecordingPublisher {
        async fn publish(&self, report: &SensorReport) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("Home Assistant unreachable");
            }
            self.published.lock().await.push(report.clone());
            Ok(())
        }
    }

    fn runner(ds: FakeDataSource, publisher: RecordingPublisher) -> SensorRunner<FakeDataSource, RecordingPublisher> {
        let sensors = AccountSensor::ALL
            .iter()
            .map(|kind| Sensor::Account(account_number(), *kind))
            .collect();

        SensorRunner::new(context(ds), publisher, sensors, t!(30 minutes))
    }

    #[tokio::test]
    async fn test_failing_sensor_is_unavailable_while_siblings_succeed() {
        let ds = FakeDataSource {
            fail_sessions: true,
            ..Default::default()
        };
        let runner = runner(ds, RecordingPublisher::default());

        runner.refresh_all().await;

        let published = runner.publisher.published.lock().await;
        assert_eq!(published.len(), 4);

        let sessions = runner.store().get("A-12345678__saving_sessions").await.unwrap();
        assert_eq!(sessions.state, None);

        let tariff = runner.store().get("A-12345678__current_tariff").await.unwrap();
        assert_eq!(tariff.state.map(|s| s.value), Some(SensorValue::Unknown));
    }

    #[tokio::test]
    async fn test_publish_failure_still_stores_state() {
        let publisher = RecordingPublisher {
            fail: true,
            ..Default::default()
        };
        let runner = runner(FakeDataSource::default(), publisher);

        runner.refresh_all().await;

        assert_eq!(runner.store().all().await.len(), 4);
    }

    #[tokio::test]
    async fn test_report_serialization() {
        let now = DateTime::from_iso("2024-11-20T17:00:00Z").unwrap();
        let runner = runner(FakeDataSource::default(), RecordingPublisher::default());

        FIXED_NOW.scope(now, runner.refresh_all()).await;

        let report = runner.store().get("A-12345678__saving_sessions").await.unwrap();
        assert_json_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "unique_id": "A-12345678__saving_sessions",
                "name": "A-12345678 Saving Sessions",
                "icon": "mdi:leaf",
                "state": {
                    "value": 0.0,
                    "attributes": { "active_count": 0, "upcoming_count": 0, "sessions": [] }
                },
                "updated_at": "2024-11-20T17:00:00Z"
            })
        );
    }

    #[tokio::test]
    async fn test_refresh_of_discovered_sensors() {
        let ds = FakeDataSource {
            accounts: vec![account()],
            ..Default::default()
        };
        let sensors = discover_sensors(&ds).await.unwrap();
        let runner = SensorRunner::new(context(ds), RecordingPublisher::default(), sensors, t!(30 minutes));

        runner.refresh_all().await;

        let ids: Vec<_> = runner.store().all().await.into_iter().map(|r| r.unique_id).collect();
        assert_eq!(ids.len(), 9);
        assert!(ids.contains(&"EVC-001__smart_charging_schedule".to_owned()));
    }
}
