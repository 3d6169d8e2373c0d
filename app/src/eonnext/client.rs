use std::sync::Arc;

use anyhow::Context;
use infrastructure::HttpClientConfig;
use reqwest::header::AUTHORIZATION;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Mutex;

use crate::core::time::DateTime;
use crate::t;

use super::dto::{
    DevicesData, DispatchesData, GraphQlRequest, GraphQlResponse, ObtainToken, ObtainTokenData, PropertiesData,
    ReadingsData, SavingSessionsData, ViewerData,
};
use super::{
    Account, AccountDataSource, AccountNumber, Agreement, ChargeSlot, Charger, EonNextError, Meter, MeterReading,
    MeterType, SavingSession,
};

const LOGIN_MUTATION: &str = r#"
mutation obtainKrakenToken($input: ObtainJSONWebTokenInput!) {
  obtainKrakenToken(input: $input) { token refreshToken payload }
}"#;

const ACCOUNTS_QUERY: &str = r#"
query viewerAccounts {
  viewer { accounts { number } }
}"#;

const METERS_QUERY: &str = r#"
query accountMeters($accountNumber: String!) {
  properties(accountNumber: $accountNumber) {
    electricityMeterPoints { mpan meters(includeInactive: false) { id serialNumber } }
    gasMeterPoints { mprn meters(includeInactive: false) { id serialNumber } }
  }
}"#;

const AGREEMENTS_QUERY: &str = r#"
query accountAgreements($accountNumber: String!) {
  properties(accountNumber: $accountNumber) {
    electricityMeterPoints { mpan agreements(includeInactive: true) { ...AgreementFields } }
    gasMeterPoints { mprn agreements(includeInactive: true) { ...AgreementFields } }
  }
}

fragment AgreementFields on AgreementInterface {
  id validFrom validTo
  tariff {
    __typename
    ... on TariffType { displayName fullName tariffCode standingCharge isVariable }
    ... on StandardTariff { unitRate }
    ... on PrepayTariff { unitRate }
    ... on HalfHourlyTariff { unitRates { value validFrom validTo } }
  }
}"#;

const READINGS_QUERY: &str = r#"
query meterReadings($accountNumber: String!, $meterId: String!, $meterType: MeterTypeChoices!) {
  readingsHistory(accountNumber: $accountNumber, meterId: $meterId, meterType: $meterType, first: 1) {
    edges { node { readAt value registers { value } } }
  }
}"#;

const DEVICES_QUERY: &str = r#"
query smartDevices($accountNumber: String!) {
  devices(accountNumber: $accountNumber, deviceTypes: [CHARGE_POINTS]) {
    id
    ... on SmartFlexChargePoint { serialNumber }
  }
}"#;

const DISPATCHES_QUERY: &str = r#"
query plannedDispatches($deviceId: String!) {
  flexPlannedDispatches(deviceId: $deviceId) { start end }
}"#;

const SAVING_SESSIONS_QUERY: &str = r#"
query savingSessions($accountNumber: String!) {
  savingSessions(accountNumber: $accountNumber) {
    events { id type startAt endAt startedAt endedAt }
  }
}"#;

/// GraphQL client for the E.ON Next customer API.
pub struct EonNextClient {
    client: ClientWithMiddleware,
    url: String,
    username: String,
    password: String,
    auth: TokenHolder,
}

#[derive(Debug, Clone)]
struct AuthToken {
    token: String,
    refresh_token: Option<String>,
    expires_at: DateTime,
}

impl AuthToken {
    fn is_fresh(&self) -> bool {
        self.expires_at.elapsed_since(t!(now)) > t!(60 seconds)
    }
}

impl From<ObtainToken> for AuthToken {
    fn from(value: ObtainToken) -> Self {
        //tokens without an expiry claim are treated as short-lived
        let expires_at = value.expires_at().unwrap_or_else(|| t!(in 15 minutes));

        Self {
            token: value.token,
            refresh_token: value.refresh_token,
            expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Credentials {
    Password,
    RefreshToken(String),
}

trait TokenIssuer {
    async fn obtain_token(&self, credentials: Credentials) -> anyhow::Result<AuthToken>;
}

/// Current API token, renewed on demand.
#[derive(Debug, Default)]
struct TokenHolder {
    current: Mutex<Option<AuthToken>>,
}

impl TokenHolder {
    async fn token(&self, issuer: &impl TokenIssuer) -> anyhow::Result<String> {
        let mut current = self.current.lock().await;

        let refresh_token = match current.as_ref() {
            Some(token) if token.is_fresh() => return Ok(token.token.clone()),
            Some(token) => token.refresh_token.clone(),
            None => None,
        };

        let renewed = match refresh_token {
            Some(refresh_token) => match issuer.obtain_token(Credentials::RefreshToken(refresh_token)).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!("Refreshing E.ON Next token failed, logging in again: {:?}", e);
                    issuer.obtain_token(Credentials::Password).await?
                }
            },
            None => issuer.obtain_token(Credentials::Password).await?,
        };

        let token = renewed.token.clone();
        *current = Some(renewed);
        Ok(token)
    }
}

impl EonNextClient {
    pub fn new(url: &str, username: &str, password: &str) -> anyhow::Result<Self> {
        let client = HttpClientConfig::new(None)
            .new_tracing_client()
            .context("Error creating E.ON Next HTTP client")?;

        Ok(Self {
            client,
            url: url.to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
            auth: TokenHolder::default(),
        })
    }

    async fn execute<V, T>(&self, operation: &str, query: &str, variables: V, token: Option<&str>) -> anyhow::Result<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let body = GraphQlRequest {
            operation_name: operation,
            query,
            variables,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Error sending {operation} to E.ON Next"))?
            .error_for_status()
            .with_context(|| format!("E.ON Next rejected {operation}"))?;

        let response: GraphQlResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Error parsing E.ON Next response to {operation}"))?;

        Ok(response.into_data(operation)?)
    }

    async fn query<V, T>(&self, operation: &str, query: &str, variables: V) -> anyhow::Result<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let token = self.auth_token().await?;
        self.execute(operation, query, variables, Some(&token)).await
    }

    async fn auth_token(&self) -> anyhow::Result<String> {
        self.auth.token(self).await
    }

    #[tracing::instrument(skip_all)]
    async fn login(&self, input: serde_json::Value) -> anyhow::Result<AuthToken> {
        let data: ObtainTokenData = self
            .execute("obtainKrakenToken", LOGIN_MUTATION, json!({ "input": input }), None)
            .await
            .map_err(|e| EonNextError::Authentication {
                reason: format!("{e:#}"),
            })?;

        let token = data.obtain_kraken_token.ok_or_else(|| EonNextError::Authentication {
            reason: "no token in response".to_owned(),
        })?;

        tracing::info!("Obtained E.ON Next API token");
        Ok(token.into())
    }

    async fn meters(&self, account: &AccountNumber) -> anyhow::Result<Vec<Meter>> {
        let data: PropertiesData = self
            .query("accountMeters", METERS_QUERY, json!({ "accountNumber": account }))
            .await?;
        Ok(data.into_meters(account))
    }

    async fn chargers(&self, account: &AccountNumber) -> anyhow::Result<Vec<Charger>> {
        let data: DevicesData = self
            .query("smartDevices", DEVICES_QUERY, json!({ "accountNumber": account }))
            .await?;
        Ok(data.into_chargers())
    }
}

impl TokenIssuer for EonNextClient {
    async fn obtain_token(&self, credentials: Credentials) -> anyhow::Result<AuthToken> {
        let input = match credentials {
            Credentials::Password => json!({ "email": self.username, "password": self.password }),
            Credentials::RefreshToken(refresh_token) => json!({ "refreshToken": refresh_token }),
        };

        self.login(input).await
    }
}

impl AccountDataSource for EonNextClient {
    #[tracing::instrument(skip(self))]
    async fn accounts(&self) -> anyhow::Result<Vec<Account>> {
        let data: ViewerData = self.query("viewerAccounts", ACCOUNTS_QUERY, json!({})).await?;

        let mut accounts = vec![];
        for dto in data.viewer.accounts {
            let number = AccountNumber::new(dto.number);
            let meters = self.meters(&number).await?;
            let chargers = self.chargers(&number).await?;

            tracing::info!(
                "Discovered account {} with {} meters and {} chargers",
                number,
                meters.len(),
                chargers.len()
            );

            accounts.push(Account {
                number,
                meters,
                chargers,
            });
        }

        Ok(accounts)
    }

    #[tracing::instrument(skip(self))]
    async fn tariff_data(&self, account: &AccountNumber) -> anyhow::Result<Arc<Vec<Agreement>>> {
        let data: PropertiesData = self
            .query("accountAgreements", AGREEMENTS_QUERY, json!({ "accountNumber": account }))
            .await?;
        Ok(Arc::new(data.into_agreements()))
    }

    #[tracing::instrument(skip(self))]
    async fn saving_sessions(&self, account: &AccountNumber) -> anyhow::Result<Arc<Vec<SavingSession>>> {
        let data: SavingSessionsData = self
            .query("savingSessions", SAVING_SESSIONS_QUERY, json!({ "accountNumber": account }))
            .await?;
        Ok(Arc::new(data.into_sessions()))
    }

    #[tracing::instrument(skip(self), fields(meter = %meter.serial))]
    async fn latest_reading(&self, meter: &Meter) -> anyhow::Result<Option<MeterReading>> {
        let meter_type = match meter.meter_type {
            MeterType::Electricity => "ELECTRICITY",
            MeterType::Gas => "GAS",
        };

        let data: ReadingsData = self
            .query(
                "meterReadings",
                READINGS_QUERY,
                json!({ "accountNumber": meter.account, "meterId": meter.id, "meterType": meter_type }),
            )
            .await?;
        Ok(data.into_latest_reading(meter))
    }

    #[tracing::instrument(skip(self), fields(charger = %charger.serial))]
    async fn charge_schedule(&self, charger: &Charger) -> anyhow::Result<Option<Arc<Vec<ChargeSlot>>>> {
        let data: DispatchesData = self
            .query("plannedDispatches", DISPATCHES_QUERY, json!({ "deviceId": charger.device_id }))
            .await?;
        Ok(data.into_schedule(charger).map(Arc::new))
    }
}
