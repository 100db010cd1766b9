use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static PROVIDER: OnceCell<Option<SdkTracerProvider>> = OnceCell::new();

const DEFAULT_FILTER: &str = "info,tower_http=warn";

/// Configuration for tracing initialization.
#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: &'static str,
    pub env_filter: Option<String>,
    pub otlp_endpoint: Option<String>,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "hr-server",
            env_filter: None,
            otlp_endpoint: None,
        }
    }
}

impl ObsConfig {
    /// Fill unset fields from `RUST_LOG` and `OTLP_ENDPOINT`.
    pub fn with_env_defaults(self) -> Self {
        Self {
            env_filter: self.env_filter.or_else(|| non_empty_env("RUST_LOG")),
            otlp_endpoint: self.otlp_endpoint.or_else(|| non_empty_env("OTLP_ENDPOINT")),
            ..self
        }
    }

    fn filter(&self) -> Result<EnvFilter> {
        let directives = self.env_filter.as_deref().unwrap_or(DEFAULT_FILTER);
        EnvFilter::try_new(directives).with_context(|| format!("invalid log filter {directives:?}"))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn otlp_provider(service_name: &'static str, endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;
    let resource = Resource::builder().with_service_name(service_name).build();
    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

/// Install the fmt subscriber, plus an OTLP span exporter when an endpoint is
/// configured. Later calls are no-ops.
pub fn init_tracing(config: ObsConfig) -> Result<()> {
    let config = config.with_env_defaults();
    PROVIDER
        .get_or_try_init(|| -> Result<Option<SdkTracerProvider>> {
            let registry = tracing_subscriber::registry()
                .with(config.filter()?)
                .with(tracing_subscriber::fmt::layer().with_target(false));

            match config.otlp_endpoint.as_deref() {
                Some(endpoint) => {
                    let provider = otlp_provider(config.service_name, endpoint)?;
                    let tracer = provider.tracer(config.service_name);
                    registry
                        .with(tracing_opentelemetry::layer().with_tracer(tracer))
                        .try_init()?;
                    Ok(Some(provider))
                }
                None => {
                    registry.try_init()?;
                    Ok(None)
                }
            }
        })
        .map(|_| ())
}

/// Flush buffered spans. Call once before the process exits.
pub fn shutdown_tracing() {
    if let Some(Some(provider)) = PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            eprintln!("failed to shut down tracer provider: {err}");
        }
    }
}
