//! Log subscriber and optional OTLP span export.
//!
//! Spans are exported over gRPC only when `OTEL_EXPORTER_OTLP_ENDPOINT` is
//! set; otherwise riskgate just logs to stderr.

use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
};
use std::{env::var, time::Duration};
use tonic::transport::ClientTlsConfig;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;

pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const ENV_INSTANCE_ID: &str = "OTEL_SERVICE_INSTANCE_ID";

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

// Dependencies that are chatty at INFO and below.
const QUIET_TARGETS: [&str; 4] = [
    "hyper=error",
    "tokio=error",
    "reqwest=warn",
    "opentelemetry_sdk=warn",
];

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Map the `-v` count to a log level; no flag means errors only.
#[must_use]
pub const fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtlpExport {
    endpoint: String,
    instance_id: String,
}

impl OtlpExport {
    /// A bare `host:port` endpoint is treated as https.
    #[must_use]
    pub fn new(endpoint: &str, instance_id: impl Into<String>) -> Self {
        let endpoint = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint.trim_end_matches('/'))
        };
        Self {
            endpoint,
            instance_id: instance_id.into(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn uses_tls(&self) -> bool {
        self.endpoint.starts_with("https://")
    }

    fn tracer(&self) -> Result<Tracer> {
        let mut builder = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&self.endpoint)
            .with_compression(Compression::Gzip)
            .with_timeout(EXPORT_TIMEOUT);

        if self.uses_tls() {
            builder = builder.with_tls_config(ClientTlsConfig::new().with_native_roots());
        }

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(builder.build()?)
            .with_resource(
                Resource::builder_empty()
                    .with_attributes([
                        KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                        KeyValue::new("service.instance.id", self.instance_id.clone()),
                    ])
                    .build(),
            )
            .build();

        let _ = TRACER_PROVIDER.set(provider.clone());
        global::set_tracer_provider(provider.clone());
        global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ]));

        Ok(provider.tracer(env!("CARGO_PKG_NAME")))
    }
}

/// Logging and tracing settings resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    level: Level,
    otlp: Option<OtlpExport>,
}

impl Telemetry {
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level, otlp: None }
    }

    #[must_use]
    pub fn with_otlp(mut self, otlp: OtlpExport) -> Self {
        self.otlp = Some(otlp);
        self
    }

    /// Settings for `verbosity`, exporting spans when the OTLP endpoint is set.
    #[must_use]
    pub fn from_env(verbosity: u8) -> Self {
        let telemetry = Self::new(level_for(verbosity));
        match var(ENV_OTLP_ENDPOINT) {
            Ok(endpoint) if !endpoint.trim().is_empty() => {
                let instance_id = var(ENV_INSTANCE_ID).unwrap_or_else(|_| Ulid::new().to_string());
                telemetry.with_otlp(OtlpExport::new(endpoint.trim(), instance_id))
            }
            _ => telemetry,
        }
    }

    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub const fn otlp(&self) -> Option<&OtlpExport> {
        self.otlp.as_ref()
    }

    /// `RUST_LOG` directives win over the configured level.
    fn filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env_lossy();
        for directive in QUIET_TARGETS {
            filter = filter.add_directive(directive.parse()?);
        }
        Ok(filter)
    }

    /// Install the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be built or a global
    /// subscriber is already installed.
    pub fn install(&self) -> Result<()> {
        let filter = self.filter()?;
        let fmt_layer = fmt::layer().with_target(false).compact();

        match &self.otlp {
            Some(otlp) => {
                let tracer = otlp.tracer()?;
                let subscriber = Registry::default()
                    .with(fmt_layer)
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .with(filter);
                tracing::subscriber::set_global_default(subscriber)?;
                debug!(endpoint = otlp.endpoint(), "exporting spans over OTLP");
            }
            None => {
                let subscriber = Registry::default().with(fmt_layer).with(filter);
                tracing::subscriber::set_global_default(subscriber)?;
            }
        }

        Ok(())
    }
}

/// Flush pending spans; does nothing when export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        let _ = provider.shutdown();
    }
}
