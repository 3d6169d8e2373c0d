mod client;
mod publisher;

use anyhow::Context;
use serde::Deserialize;

use client::HaHttpClient;

pub use publisher::HaStatePublisher;

#[derive(Debug, Deserialize, Clone)]
pub struct HomeAssistant {
    pub url: String,
    pub token: String,
    #[serde(default = "default_entity_prefix")]
    pub entity_prefix: String,
}

fn default_entity_prefix() -> String {
    "eon_next".to_owned()
}

impl HomeAssistant {
    pub fn new_state_publisher(&self) -> anyhow::Result<HaStatePublisher> {
        let client = HaHttpClient::new(&self.url, &self.token).context("Error creating Home Assistant HTTP client")?;
        Ok(HaStatePublisher::new(client, &self.entity_prefix))
    }
}
