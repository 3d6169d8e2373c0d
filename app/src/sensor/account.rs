use serde_json::{Value, json};

use crate::core::time::DateTime;
use crate::eonnext::{AccountDataSource, AccountNumber};
use crate::saving_session;
use crate::tariff::{ActiveTariff, RateBandPolicy, resolve_active_tariff};

use super::{SensorContext, SensorMetadata, SensorState, SensorValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSensor {
    CurrentTariff,
    StandingCharge,
    UnitRate,
    SavingSessions,
}

impl AccountSensor {
    pub const ALL: [AccountSensor; 4] = [
        AccountSensor::CurrentTariff,
        AccountSensor::StandingCharge,
        AccountSensor::UnitRate,
        AccountSensor::SavingSessions,
    ];

    pub fn metadata(&self) -> SensorMetadata {
        match self {
            AccountSensor::CurrentTariff => SensorMetadata {
                suffix: "current_tariff",
                label: "Current Tariff",
                icon: Some("mdi:file-document-outline"),
                ..Default::default()
            },
            AccountSensor::StandingCharge => SensorMetadata {
                suffix: "standing_charge",
                label: "Standing Charge",
                unit_of_measurement: Some("GBP/day"),
                icon: Some("mdi:cash-clock"),
                ..Default::default()
            },
            AccountSensor::UnitRate => SensorMetadata {
                suffix: "unit_rate",
                label: "Unit Rate",
                unit_of_measurement: Some("GBP/kWh"),
                icon: Some("mdi:currency-gbp"),
                ..Default::default()
            },
            AccountSensor::SavingSessions => SensorMetadata {
                suffix: "saving_sessions",
                label: "Saving Sessions",
                icon: Some("mdi:leaf"),
                ..Default::default()
            },
        }
    }

    pub async fn refresh<D: AccountDataSource>(
        &self,
        account: &AccountNumber,
        ctx: &SensorContext<D>,
        now: DateTime,
    ) -> anyhow::Result<SensorState> {
        match self {
            AccountSensor::CurrentTariff => with_active_tariff(account, ctx, now, current_tariff_state).await,
            AccountSensor::StandingCharge => {
                with_active_tariff(account, ctx, now, |active| {
                    SensorState::new(active.standing_charge()).with_meter_point(active.meter_point())
                })
                .await
            }
            AccountSensor::UnitRate => {
                with_active_tariff(account, ctx, now, |active| unit_rate_state(ctx, active, now)).await
            }
            AccountSensor::SavingSessions => {
                let sessions = ctx.data_source.saving_sessions(account).await?;
                let summary = saving_session::classify(&sessions, now);

                Ok(SensorState::new(SensorValue::Number(summary.total as f64))
                    .with("active_count", json!(summary.active_count))
                    .with("upcoming_count", json!(summary.upcoming_count))
                    .with("sessions", json!(summary.sessions)))
            }
        }
    }
}

async fn with_active_tariff<D, F>(
    account: &AccountNumber,
    ctx: &SensorContext<D>,
    now: DateTime,
    derive: F,
) -> anyhow::Result<SensorState>
where
    D: AccountDataSource,
    F: FnOnce(&ActiveTariff<'_>) -> SensorState,
{
    let agreements = ctx.data_source.tariff_data(account).await?;

    match resolve_active_tariff(&agreements, now) {
        Some(active) => {
            tracing::debug!("Agreement {} is active for account {}", active.tariff_ref(), account);
            Ok(derive(&active))
        }
        None => {
            tracing::debug!("No active tariff for account {}", account);
            Ok(SensorState::unknown())
        }
    }
}

fn current_tariff_state(active: &ActiveTariff<'_>) -> SensorState {
    let name = active.display_name().unwrap_or(active.tariff_code());

    SensorState::new(SensorValue::Text(name.to_owned()))
        .with("tariff_code", json!(active.tariff_code()))
        .with("tariff_type", json!(active.tariff_type()))
        .with("is_variable", json!(active.is_variable()))
        .with("valid_from", json!(active.valid_from()))
        .with("valid_to", json!(active.valid_to()))
        .with_meter_point(active.meter_point())
}

fn unit_rate_state<D>(ctx: &SensorContext<D>, active: &ActiveTariff<'_>, now: DateTime) -> SensorState {
    let Some(selected) = ctx.rate_selector.select(active, now) else {
        return SensorState::unknown().with_meter_point(active.meter_point());
    };

    let mut state = SensorState::new(SensorValue::Number(selected.rate))
        .with("rate_policy", json!(policy_name(&selected.policy)))
        .with_meter_point(selected.meter_point.as_ref());

    if !selected.rates.is_empty() {
        state = state.with("rates", json!(selected.rates));
    }

    if let RateBandPolicy::TwoPeriodBand { off_peak } = selected.policy {
        state = state.with("off_peak_hours", Value::String(off_peak.to_string()));
    }

    if let Some(band) = selected.band {
        state = state
            .with("current_period", json!(band.period.to_string()))
            .with("low_rate", json!(band.low))
            .with("high_rate", json!(band.high));
    }

    state
}

fn policy_name(policy: &RateBandPolicy) -> &'static str {
    match policy {
        RateBandPolicy::FlatRate => "flat_rate",
        RateBandPolicy::TwoPeriodBand { .. } => "two_period_band",
        RateBandPolicy::Generic => "generic",
    }
}
