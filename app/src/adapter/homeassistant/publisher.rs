use serde_json::{Map, Value, json};

use crate::sensor::{SensorReport, StatePublisher};

use super::HaHttpClient;

pub struct HaStatePublisher {
    client: HaHttpClient,
    entity_prefix: String,
}

impl HaStatePublisher {
    pub fn new(client: HaHttpClient, entity_prefix: &str) -> Self {
        Self {
            client,
            entity_prefix: entity_prefix.to_owned(),
        }
    }
}

impl StatePublisher for HaStatePublisher {
    async fn publish(&self, report: &SensorReport) -> anyhow::Result<()> {
        let entity_id = entity_id(&self.entity_prefix, &report.unique_id);
        self.client.post_state(&entity_id, &state_body(report)).await
    }
}

/// `sensor.<prefix>_<unique id>`, lower-cased with every non-alphanumeric character replaced by `_`.
pub fn entity_id(prefix: &str, unique_id: &str) -> String {
    let slug: String = unique_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    format!("sensor.{prefix}_{slug}")
}

fn state_body(report: &SensorReport) -> Value {
    let state = match &report.state {
        Some(state) => state.value.to_state_string(),
        None => "unavailable".to_owned(),
    };

    let metadata = &report.metadata;
    let mut attributes = Map::new();
    attributes.insert("friendly_name".to_owned(), json!(report.name));

    for (key, value) in [
        ("device_class", metadata.device_class),
        ("unit_of_measurement", metadata.unit_of_measurement),
        ("state_class", metadata.state_class),
        ("icon", metadata.icon),
    ] {
        if let Some(value) = value {
            attributes.insert(key.to_owned(), json!(value));
        }
    }

    if let Some(state) = &report.state {
        attributes.extend(state.attributes.clone());
    }

    json!({ "state": state, "attributes": attributes })
}
