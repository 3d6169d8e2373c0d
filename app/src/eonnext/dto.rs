use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::time::DateTime;
use crate::core::unit::Pence;

use super::{
    AccountNumber, Agreement, ChargeSlot, Charger, EonNextError, Meter, MeterPointId, MeterReading, MeterType,
    SavingSession, Tariff, UnitRate,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub operation_name: &'a str,
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

impl<T> GraphQlResponse<T> {
    pub fn into_data(self, operation: &str) -> Result<T, EonNextError> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let messages = errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; ");
            return Err(EonNextError::GraphQl {
                operation: operation.to_owned(),
                messages,
            });
        }

        self.data.ok_or_else(|| EonNextError::MissingData {
            operation: operation.to_owned(),
        })
    }
}

//
// AUTHENTICATION
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObtainTokenData {
    pub obtain_kraken_token: Option<ObtainToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObtainToken {
    pub token: String,
    pub refresh_token: Option<String>,
    pub payload: Option<Value>,
}

impl ObtainToken {
    pub fn expires_at(&self) -> Option<DateTime> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("exp"))
            .and_then(Value::as_i64)
            .and_then(DateTime::from_timestamp)
    }
}

//
// ACCOUNTS
//

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    pub viewer: Viewer,
}

#[derive(Debug, Deserialize)]
pub struct Viewer {
    #[serde(default)]
    pub accounts: Vec<AccountDto>,
}

#[derive(Debug, Deserialize)]
pub struct AccountDto {
    pub number: String,
}

//
// PROPERTIES (meters and agreements)
//

#[derive(Debug, Deserialize)]
pub struct PropertiesData {
    pub properties: Option<Vec<PropertyDto>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDto {
    #[serde(default)]
    pub electricity_meter_points: Vec<ElectricityMeterPointDto>,
    #[serde(default)]
    pub gas_meter_points: Vec<GasMeterPointDto>,
}

#[derive(Debug, Deserialize)]
pub struct ElectricityMeterPointDto {
    pub mpan: String,
    #[serde(default)]
    pub meters: Vec<MeterDto>,
    #[serde(default)]
    pub agreements: Vec<AgreementDto>,
}

#[derive(Debug, Deserialize)]
pub struct GasMeterPointDto {
    pub mprn: String,
    #[serde(default)]
    pub meters: Vec<MeterDto>,
    #[serde(default)]
    pub agreements: Vec<AgreementDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterDto {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub serial_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementDto {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub tariff: Option<TariffDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffDto {
    #[serde(rename = "__typename")]
    pub type_name: Option<String>,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub tariff_code: Option<String>,
    pub is_variable: Option<bool>,
    #[serde(default, deserialize_with = "optional_number")]
    pub standing_charge: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub unit_rate: Option<f64>,
    pub unit_rates: Option<Vec<UnitRateDto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRateDto {
    #[serde(default, deserialize_with = "optional_number")]
    pub value: Option<f64>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
}

impl PropertiesData {
    fn into_properties(self) -> Vec<PropertyDto> {
        self.properties.unwrap_or_default()
    }

    pub fn into_meters(self, account: &AccountNumber) -> Vec<Meter> {
        let mut meters = vec![];

        for property in self.into_properties() {
            for point in property.electricity_meter_points {
                meters.extend(point.meters.into_iter().map(|m| Meter {
                    id: m.id,
                    serial: m.serial_number,
                    meter_type: MeterType::Electricity,
                    meter_point: MeterPointId::Mpan(point.mpan.clone()),
                    account: account.clone(),
                }));
            }

            for point in property.gas_meter_points {
                meters.extend(point.meters.into_iter().map(|m| Meter {
                    id: m.id,
                    serial: m.serial_number,
                    meter_type: MeterType::Gas,
                    meter_point: MeterPointId::Mprn(point.mprn.clone()),
                    account: account.clone(),
                }));
            }
        }

        meters
    }

    /// Electricity agreements come first, gas agreements second, each in upstream order.
    pub fn into_agreements(self) -> Vec<Agreement> {
        let mut electricity = vec![];
        let mut gas = vec![];

        for property in self.into_properties() {
            for point in property.electricity_meter_points {
                let meter_point = MeterPointId::Mpan(point.mpan);
                electricity.extend(
                    point
                        .agreements
                        .into_iter()
                        .filter_map(|a| a.into_agreement(meter_point.clone())),
                );
            }

            for point in property.gas_meter_points {
                let meter_point = MeterPointId::Mprn(point.mprn);
                gas.extend(
                    point
                        .agreements
                        .into_iter()
                        .filter_map(|a| a.into_agreement(meter_point.clone())),
                );
            }
        }

        electricity.extend(gas);
        electricity
    }
}

impl AgreementDto {
    fn into_agreement(self, meter_point: MeterPointId) -> Option<Agreement> {
        //an unreadable end date makes it impossible to tell whether the agreement is active
        let valid_to = match parse_timestamp(self.valid_to.as_deref()) {
            Ok(valid_to) => valid_to,
            Err(e) => {
                tracing::warn!("Dropping agreement {} with unreadable validTo: {:?}", self.id, e);
                return None;
            }
        };

        let Some(tariff) = self.tariff else {
            tracing::warn!("Dropping agreement {} without tariff", self.id);
            return None;
        };

        Some(Agreement {
            valid_from: lenient_timestamp(self.valid_from.as_deref(), "validFrom", &self.id),
            valid_to,
            meter_point: Some(meter_point),
            tariff: tariff.into_tariff(&self.id),
            tariff_ref: self.id,
        })
    }
}

impl TariffDto {
    fn into_tariff(self, agreement_id: &str) -> Tariff {
        let unit_rates = self.unit_rates.map(|rates| {
            rates
                .into_iter()
                .enumerate()
                .filter_map(|(index, rate)| {
                    let Some(value) = rate.value else {
                        tracing::warn!("Dropping unit rate #{} of agreement {} without value", index, agreement_id);
                        return None;
                    };

                    Some(UnitRate {
                        value: Pence(value),
                        valid_from: lenient_timestamp(rate.valid_from.as_deref(), "unit rate validFrom", agreement_id),
                        valid_to: lenient_timestamp(rate.valid_to.as_deref(), "unit rate validTo", agreement_id),
                    })
                })
                .collect()
        });

        Tariff {
            display_name: self.display_name,
            full_name: self.full_name,
            tariff_code: self.tariff_code.unwrap_or_default(),
            tariff_type: self.type_name.unwrap_or_else(|| "Unknown".to_owned()),
            is_variable: self.is_variable.unwrap_or(false),
            standing_charge: self.standing_charge.map(Pence),
            unit_rate: self.unit_rate.map(Pence),
            unit_rates,
        }
    }
}

//
// METER READINGS
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsData {
    pub readings_history: Option<ReadingConnection>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingConnection {
    #[serde(default)]
    pub edges: Vec<ReadingEdge>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingEdge {
    pub node: ReadingNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingNode {
    pub read_at: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub value: Option<f64>,
    #[serde(default)]
    pub registers: Vec<RegisterDto>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDto {
    #[serde(default, deserialize_with = "optional_number")]
    pub value: Option<f64>,
}

impl ReadingsData {
    pub fn into_latest_reading(self, meter: &Meter) -> Option<MeterReading> {
        self.readings_history?
            .edges
            .into_iter()
            .filter_map(|edge| edge.node.into_reading(meter))
            .max_by_key(|reading| reading.read_at)
    }
}

impl ReadingNode {
    fn into_reading(self, meter: &Meter) -> Option<MeterReading> {
        let read_at = lenient_timestamp(self.read_at.as_deref(), "readAt", &meter.serial)?;

        //multi-register meters (e.g. day/night) report the total as sum of all registers
        let value = match self.value {
            Some(value) => value,
            None if !self.registers.is_empty() => self.registers.iter().filter_map(|r| r.value).sum(),
            None => return None,
        };

        Some(MeterReading { value, read_at })
    }
}

//
// EV CHARGERS
//

#[derive(Debug, Deserialize)]
pub struct DevicesData {
    pub devices: Option<Vec<DeviceDto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub serial_number: Option<String>,
}

impl DevicesData {
    pub fn into_chargers(self) -> Vec<Charger> {
        self.devices
            .unwrap_or_default()
            .into_iter()
            .map(|device| Charger {
                serial: device.serial_number.unwrap_or_else(|| device.id.clone()),
                device_id: device.id,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchesData {
    pub flex_planned_dispatches: Option<Vec<DispatchDto>>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchDto {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DispatchesData {
    pub fn into_schedule(self, charger: &Charger) -> Option<Vec<ChargeSlot>> {
        let dispatches = self.flex_planned_dispatches?;

        Some(
            dispatches
                .into_iter()
                .map(|d| ChargeSlot {
                    start: lenient_timestamp(d.start.as_deref(), "dispatch start", &charger.serial),
                    end: lenient_timestamp(d.end.as_deref(), "dispatch end", &charger.serial),
                })
                .collect(),
        )
    }
}

//
// SAVING SESSIONS
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingSessionsData {
    pub saving_sessions: Option<SavingSessionsDto>,
}

#[derive(Debug, Deserialize)]
pub struct SavingSessionsDto {
    pub events: Option<Vec<SavingSessionDto>>,
}

/// Upstream delivers either `startedAt`/`endedAt` or `startAt`/`endAt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingSessionDto {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub started_at: Option<String>,
    pub start_at: Option<String>,
    pub ended_at: Option<String>,
    pub end_at: Option<String>,
}

impl SavingSessionsData {
    pub fn into_sessions(self) -> Vec<SavingSession> {
        self.saving_sessions
            .and_then(|s| s.events)
            .unwrap_or_default()
            .into_iter()
            .map(SavingSessionDto::into_session)
            .collect()
    }
}

impl SavingSessionDto {
    fn into_session(self) -> SavingSession {
        let start = lenient_timestamp(self.started_at.as_deref(), "startedAt", &self.id)
            .or_else(|| lenient_timestamp(self.start_at.as_deref(), "startAt", &self.id));
        let end = lenient_timestamp(self.ended_at.as_deref(), "endedAt", &self.id)
            .or_else(|| lenient_timestamp(self.end_at.as_deref(), "endAt", &self.id));

        SavingSession {
            id: self.id,
            kind: self.kind,
            start,
            end,
        }
    }
}

//
// HELPERS
//

fn parse_timestamp(raw: Option<&str>) -> anyhow::Result<Option<DateTime>> {
    raw.filter(|s| !s.trim().is_empty()).map(DateTime::parse).transpose()
}

fn lenient_timestamp(raw: Option<&str>, field: &str, owner: &str) -> Option<DateTime> {
    parse_timestamp(raw).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable {} of {}: {:?}", field, owner, e);
        None
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

fn optional_number<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(de)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Int(i64),
    String(String),
}

fn id_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match IdValue::deserialize(de)? {
        IdValue::Int(id) => id.to_string(),
        IdValue::String(id) => id,
    })
}
