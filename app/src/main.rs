use settings::Settings;

use crate::sensor::{SensorContext, SensorRunner};

mod adapter;
mod core;
mod eonnext;
mod saving_session;
mod sensor;
mod settings;
mod tariff;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");

    settings.monitoring.init().expect("Error initializing monitoring");

    let data_source = settings
        .eonnext
        .new_data_source()
        .expect("Error initializing E.ON Next client");

    tracing::info!("Discovering accounts");
    let sensors = sensor::discover_sensors(&data_source)
        .await
        .expect("Error discovering E.ON Next accounts");

    let publisher = settings
        .homeassistant
        .new_state_publisher()
        .expect("Error initializing Home Assistant publisher");

    let context = SensorContext {
        data_source,
        rate_selector: settings.tariff.new_rate_selector(),
        timezone: settings.tariff.timezone,
        gas_calorific_value: settings.eonnext.gas_calorific_value,
    };

    let sensor_runner = SensorRunner::new(context, publisher, sensors, settings.refresh.interval);

    let http_server_exec = {
        let store = sensor_runner.store();

        async move {
            settings
                .http_server
                .run_server(move || vec![adapter::sensor_api::new_routes(store.clone())])
                .await
                .expect("HTTP server execution failed");
        }
    };

    tracing::info!("Starting main loop");

    tokio::select!(
        _ = sensor_runner.run() => {},
        _ = http_server_exec => {},
    );
}
