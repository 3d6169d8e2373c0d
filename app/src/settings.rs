use config::{Config, ConfigError, Environment, File};
use infrastructure::{HttpServerConfig, MonitoringConfig};
use serde::Deserialize;

use crate::core::time::Duration;
use crate::tariff::TariffConfig;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub eonnext: crate::eonnext::EonNext,
    #[serde(default)]
    pub tariff: TariffConfig,
    #[serde(default)]
    pub refresh: RefreshSettings,
    pub homeassistant: crate::adapter::homeassistant::HomeAssistant,
    pub http_server: HttpServerConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config.toml"))
            .add_source(environment());

        let s = builder.build()?;
        s.try_deserialize()
    }
}

//EON_NEXT__<SECTION>__<KEY>, e.g. EON_NEXT__EONNEXT__GAS_CALORIFIC_VALUE=40.1
fn environment() -> Environment {
    Environment::with_prefix("EON_NEXT")
        .prefix_separator("__")
        .separator("__")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshSettings {
    #[serde(default = "default_refresh_interval")]
    pub interval: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: default_refresh_interval(),
        }
    }
}

fn default_refresh_interval() -> Duration {
    Duration::minutes(30)
}

#[cfg(test)]
mod tests {
    use config::{FileFormat, Map};

    use super::*;
    use crate::t;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    const MINIMAL: &str = r#"
        [eonnext]
        username = "jane@example.com"
        password = "secret"

        [homeassistant]
        url = "http://homeassistant.local:8123"
        token = "ha-token"

        [http_server]
        port = 8080
    "#;

    #[test]
    fn test_defaults() {
        let settings = parse(MINIMAL).unwrap();

        assert_eq!(settings.eonnext.url, "https://api.eonnext-kraken.energy/v1/graphql/");
        assert_eq!(settings.eonnext.gas_calorific_value, 39.5);
        assert_eq!(settings.eonnext.cache_ttl, t!(5 minutes));
        assert_eq!(settings.refresh.interval, t!(30 minutes));
        assert_eq!(settings.tariff.timezone, chrono_tz::Europe::London);
        assert!(settings.tariff.rate_bands.is_empty());
        assert_eq!(settings.homeassistant.entity_prefix, "eon_next");
        assert_eq!(settings.http_server.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_rate_band_rules() {
        let toml = format!(
            r#"{MINIMAL}
            [tariff]
            timezone = "Europe/Dublin"

            [[tariff.rate_bands]]
            tariff_code = "E-2R-EV-NIGHT"
            off_peak = {{ from = 23, to = 5 }}

            [refresh]
            interval = "PT15M"
            "#
        );

        let settings = parse(&toml).unwrap();

        assert_eq!(settings.tariff.timezone, chrono_tz::Europe::Dublin);
        assert_eq!(settings.tariff.rate_bands.len(), 1);
        assert_eq!(settings.tariff.rate_bands[0].tariff_code, "E-2R-EV-NIGHT");
        assert_eq!(settings.refresh.interval, t!(15 minutes));
    }

    #[test]
    fn test_environment_overrides_multi_word_keys() {
        let env = Map::from([
            ("EON_NEXT__EONNEXT__PASSWORD".to_owned(), "from-env".to_owned()),
            ("EON_NEXT__EONNEXT__GAS_CALORIFIC_VALUE".to_owned(), "40.1".to_owned()),
            ("EON_NEXT__EONNEXT__CACHE_TTL".to_owned(), "PT10M".to_owned()),
            ("EON_NEXT__HTTP_SERVER__PORT".to_owned(), "9999".to_owned()),
            ("EON_NEXT__HOMEASSISTANT__ENTITY_PREFIX".to_owned(), "home_energy".to_owned()),
            ("EONNEXT_PASSWORD".to_owned(), "ignored".to_owned()),
        ]);

        let settings: Settings = Config::builder()
            .add_source(File::from_str(MINIMAL, FileFormat::Toml))
            .add_source(environment().source(Some(env)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.eonnext.password, "from-env");
        assert_eq!(settings.eonnext.gas_calorific_value, 40.1);
        assert_eq!(settings.eonnext.cache_ttl, t!(10 minutes));
        assert_eq!(settings.http_server.port, 9999);
        assert_eq!(settings.homeassistant.entity_prefix, "home_energy");
    }

    #[test]
    fn test_invalid_off_peak_range_is_rejected() {
        let toml = format!(
            r#"{MINIMAL}
            [[tariff.rate_bands]]
            tariff_code = "E-2R-EV-NIGHT"
            off_peak = {{ from = 7, to = 7 }}
            "#
        );

        assert!(parse(&toml).is_err());
    }
}
