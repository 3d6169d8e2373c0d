use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{ExporterBuildError, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::error::Error;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

//KNOWN ISSUES:
// - OpenTelemetry log appender doesn't contain trace-id and attributes from the span

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub logs: EnvFilterConfig,
    #[serde(default)]
    pub traces: EnvFilterConfig,
    #[serde(default)]
    pub json: bool,
    pub otlp: Option<OtlpConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnvFilterConfig {
    pub default_level: String,
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct OtlpConfig {
    pub url: String,
}

fn default_service_name() -> String {
    "eon-next".to_owned()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logs: EnvFilterConfig::default(),
            traces: EnvFilterConfig::default(),
            json: false,
            otlp: None,
        }
    }
}

impl Default for EnvFilterConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_owned(),
            filters: vec![],
        }
    }
}

impl TryInto<EnvFilter> for EnvFilterConfig {
    type Error = tracing_subscriber::filter::ParseError;

    fn try_into(self) -> Result<EnvFilter, Self::Error> {
        EnvFilter::builder()
            .with_default_directive(self.default_level.parse()?)
            .parse(self.filters.join(","))
    }
}

impl MonitoringConfig {
    pub fn init(&self) -> Result<(), Box<dyn Error>> {
        let fmt_filter: EnvFilter = self.logs.clone().try_into()?;
        let fmt_layer = if self.json {
            tracing_subscriber::fmt::layer().json().with_filter(fmt_filter).boxed()
        } else {
            tracing_subscriber::fmt::layer().with_filter(fmt_filter).boxed()
        };

        let Some(otlp_config) = &self.otlp else {
            tracing_subscriber::registry().with(fmt_layer).init();
            return Ok(());
        };

        let resource = Resource::builder()
            .with_attribute(KeyValue::new("service.name", self.service_name.clone()))
            .build();

        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::default());

        let logger_provider = init_logs(resource.clone(), &otlp_config.url)?;
        let logging_filter: EnvFilter = self.logs.clone().try_into()?;
        let logging_layer = OpenTelemetryTracingBridge::new(&logger_provider).with_filter(logging_filter);

        let tracer_provider = init_traces(resource, &otlp_config.url)?;
        let tracer = tracer_provider.tracer(self.service_name.clone());
        let tracing_filter: EnvFilter = self.traces.clone().try_into()?;
        let tracing_layer = OpenTelemetryLayer::new(tracer).with_filter(tracing_filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(tracing_layer)
            .with(logging_layer)
            .init();

        Ok(())
    }
}

fn init_traces(resource: Resource, url: &str) -> Result<SdkTracerProvider, ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

fn init_logs(resource: Resource, url: &str) -> Result<SdkLoggerProvider, ExporterBuildError> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_from_config() {
        let config = EnvFilterConfig {
            default_level: "warn".to_owned(),
            filters: vec!["eon_next=debug".to_owned()],
        };

        let filter: Result<EnvFilter, _> = config.try_into();

        assert!(filter.is_ok());
    }
}
