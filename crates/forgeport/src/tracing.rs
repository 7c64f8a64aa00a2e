//! Tracing setup for processes embedding forgeport.
//!
//! Provider crates only emit `tracing` events; this module installs a
//! subscriber writing them to stderr in one of several formats, tagged with
//! a process-wide correlation ID.

use forgeport_core::{Error, Event, Result};
use std::io;
pub use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Target prefix shared by every forgeport crate (`forgeport`,
/// `forgeport_core`, `forgeport_github`, ...). `EnvFilter` matches target
/// directives by prefix.
const TARGET_PREFIX: &str = "forgeport";

/// Tracing output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Pretty-printed human-readable format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// Structured JSON format
    Json,
}

impl std::str::FromStr for TracingFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(Error::configuration(
                format!("Unknown tracing format: {s}"),
                "Use one of: pretty, compact, json",
            )),
        }
    }
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Output format.
    pub format: TracingFormat,
    /// Level applied to the forgeport crates when neither `filter` nor
    /// `RUST_LOG` is set.
    pub level: Level,
    /// Explicit `EnvFilter` directive, overriding everything else.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Pretty,
            level: Level::INFO,
            filter: None,
        }
    }
}

/// Global correlation ID for tracing request correlation
static CORRELATION_ID: std::sync::OnceLock<Uuid> = std::sync::OnceLock::new();

/// Get or create a correlation ID for the current process
pub fn correlation_id() -> Uuid {
    *CORRELATION_ID.get_or_init(Uuid::new_v4)
}

fn default_directives(level: Level) -> String {
    format!("{TARGET_PREFIX}={}", level.as_str().to_lowercase())
}

fn build_filter(config: &TracingConfig) -> Result<EnvFilter> {
    let filter = match &config.filter {
        Some(filter) => EnvFilter::try_new(filter),
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_directives(config.level))),
    };
    filter.map_err(|e| {
        Error::configuration(
            format!("Failed to create tracing filter: {e}"),
            "Use EnvFilter syntax, e.g. forgeport_github=debug",
        )
    })
}

/// Initialize tracing with the given configuration.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let correlation_id = correlation_id();
    let registry = tracing_subscriber::registry().with(build_filter(config)?);

    let installed = match config.format {
        TracingFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_target(true);
            registry.with(layer).try_init()
        }
        TracingFormat::Compact => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(false);
            registry.with(layer).try_init()
        }
        TracingFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true)
                .with_span_list(true);
            registry.with(layer).try_init()
        }
    };
    installed.map_err(|e| {
        Error::configuration(
            format!("Failed to install tracing subscriber: {e}"),
            "Initialize tracing once per process",
        )
    })?;

    tracing::info!(
        correlation_id = %correlation_id,
        version = env!("CARGO_PKG_VERSION"),
        format = ?config.format,
        "Tracing initialized"
    );
    Ok(())
}

/// Span covering the provider calls made for one event.
pub fn event_span(event: &Event) -> tracing::Span {
    tracing::info_span!(
        "event",
        repo = %event.full_name(),
        sha = %event.sha,
        event_type = %event.event_type,
        correlation_id = %correlation_id(),
    )
}
