use anyhow::Context;
use infrastructure::HttpClientConfig;
use reqwest_middleware::ClientWithMiddleware;

#[derive(Debug, Clone)]
pub struct HaHttpClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl HaHttpClient {
    pub fn new(url: &str, token: &str) -> anyhow::Result<Self> {
        let client = HttpClientConfig::new(Some(token.to_owned())).new_tracing_client()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_owned(),
        })
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn post_state(&self, entity_id: &str, body: &serde_json::Value) -> anyhow::Result<()> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Error sending state of {entity_id}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Home Assistant rejected state of {}: {} - {}", entity_id, status, text);
        }

        tracing::debug!("Published state of {}: {}", entity_id, status);
        Ok(())
    }
}
