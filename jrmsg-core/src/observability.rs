//! Logging and trace export setup
//!
//! Library code in this workspace only emits `tracing` events and spans; it
//! never installs a subscriber on its own. Applications that want those
//! events call [`init_telemetry`] once at startup.
//!
//! The installed subscriber has:
//! - an `EnvFilter` (from `RUST_LOG`, falling back to the configured level)
//! - a fmt layer writing JSON (or human-readable) lines to stdout
//! - optionally, an OpenTelemetry layer exporting spans over OTLP/gRPC
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrmsg_core::TelemetryConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::new("billing-gateway")
//!         .with_log_level("debug")
//!         .with_otlp(true);
//!
//!     jrmsg_core::init_telemetry(config).expect("Failed to init telemetry");
//!
//!     // ... run your application ...
//!
//!     jrmsg_core::shutdown_telemetry();
//! }
//! ```

use opentelemetry::{global, KeyValue};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Telemetry configuration
///
/// # Defaults
///
/// - Service name: "jrmsg"
/// - Service version: current crate version
/// - OTLP endpoint: `$OTEL_EXPORTER_OTLP_ENDPOINT` or "http://localhost:4317"
/// - OTLP export: off
/// - JSON log lines: on
/// - Log level: `$RUST_LOG` or "info"
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to exported spans
    pub service_name: String,
    /// Service version attached to exported spans
    pub service_version: String,
    /// OTLP collector endpoint (gRPC)
    pub otlp_endpoint: String,
    /// Export spans to the OTLP collector
    pub enable_otlp: bool,
    /// Write log lines as JSON instead of plain text
    pub json_logs: bool,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "jrmsg".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_otlp: false,
            json_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl TelemetryConfig {
    /// Default configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the fallback log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable OTLP span export
    pub fn with_otlp(mut self, enable: bool) -> Self {
        self.enable_otlp = enable;
        self
    }

    /// Choose JSON or plain-text log lines
    pub fn with_json_logs(mut self, enable: bool) -> Self {
        self.json_logs = enable;
        self
    }
}

/// Install the global tracing subscriber
///
/// Call once per process. A second call fails because the global
/// subscriber is already set.
///
/// # Errors
///
/// - the filter directive is invalid
/// - the OTLP exporter cannot be built
/// - a global subscriber is already installed
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), BoxError> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let otel_layer = if config.enable_otlp {
        let tracer = init_tracer(&config)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        service_name = %config.service_name,
        otlp = config.enable_otlp,
        otlp_endpoint = %config.otlp_endpoint,
        "Telemetry initialized"
    );

    Ok(())
}

/// Build the OTLP tracer provider, register it globally and hand back a tracer
fn init_tracer(config: &TelemetryConfig) -> Result<opentelemetry_sdk::trace::Tracer, BoxError> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};
    use opentelemetry_sdk::Resource;

    let resource = Resource::builder_empty()
        .with_attributes(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                config.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                config.service_version.clone(),
            ),
        ])
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

/// Log the shutdown of telemetry
///
/// Providers flush on drop; this only marks the end of the process in the
/// log stream.
pub fn shutdown_telemetry() {
    tracing::info!("Telemetry shutting down");
}
