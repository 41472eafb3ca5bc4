//! Logging infrastructure - structured tracing for the registry
//!
//! Design: all diagnostics go through `tracing` under the `leakwatch`
//! target. The host application usually installs its own subscriber; the
//! helpers here cover the case where it does not.
//! - Configurable level and extra filter directives
//! - Pretty, compact or JSON output
//! - Console or daily rolling file output

use once_cell::sync::OnceCell;
use tracing::{debug, trace, warn, Level};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rotated file `<directory>/<prefix>.YYYY-MM-DD`
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives, e.g. "leakwatch=trace,my_app=info"
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // LEAKWATCH_LOG_LEVEL: trace, debug, info, warn, error
        if let Some(level) = var("LEAKWATCH_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(Level::INFO);
        }

        // LEAKWATCH_LOG_FILE: directory for daily rolling logs
        if let Some(directory) = var("LEAKWATCH_LOG_FILE") {
            config.output = LogOutput::File {
                directory,
                prefix: "leakwatch".to_string(),
            };
        }

        if var("LEAKWATCH_LOG_JSON").is_some() {
            config.format = LogFormat::Json;
        }

        config
    }
}

fn parse_level(value: &str) -> Option<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize the global subscriber
///
/// Only the first call has an effect; later calls, or calls made after the
/// host installed its own subscriber, return `None`. Keep the returned guard
/// alive so buffered lines are flushed.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;

    LOGGER_INITIALIZED.get_or_init(|| {
        guard = match config.output.clone() {
            LogOutput::Stdout => {
                let (writer, g) = tracing_appender::non_blocking(std::io::stdout());
                install(writer, &config).then_some(g)
            }
            LogOutput::Stderr => {
                let (writer, g) = tracing_appender::non_blocking(std::io::stderr());
                install(writer, &config).then_some(g)
            }
            LogOutput::File { directory, prefix } => {
                let appender = rolling::daily(&directory, &prefix);
                let (writer, g) = tracing_appender::non_blocking(appender);
                install(writer, &config).then_some(g)
            }
        };
    });

    guard
}

fn install<W>(writer: W, config: &LogConfig) -> bool
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = build_filter(config);
    let spans = span_events_config(config.span_events);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .pretty()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .compact()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_span_events(spans)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init().is_ok()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("leakwatch={}", config.level.as_str().to_lowercase())));

    match &config.filter {
        Some(directives) => directives
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .fold(base, |filter, directive| match directive.parse() {
                Ok(parsed) => filter.add_directive(parsed),
                Err(_) => {
                    warn!("Invalid filter directive: {}", directive);
                    filter
                }
            }),
        None => base,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Registry events
// ============================================================================

#[inline]
pub fn log_track(type_name: &str, handles: usize, delay_ms: u64) {
    trace!(
        target: "leakwatch",
        event = "track",
        type_name,
        handles,
        delay_ms,
        "object tracked"
    );
}

#[inline]
pub fn log_reevaluate(type_name: &str, live: usize, purged: usize) {
    debug!(
        target: "leakwatch",
        event = "reevaluate",
        type_name,
        live,
        purged,
        "reevaluation complete"
    );
}

#[inline]
pub fn log_bucket_removed(type_name: &str) {
    debug!(
        target: "leakwatch",
        event = "bucket_removed",
        type_name,
        "no live instances left"
    );
}

#[inline]
pub fn log_leak_unchanged(type_name: &str, count: usize) {
    debug!(
        target: "leakwatch",
        event = "leak_unchanged",
        type_name,
        count,
        "same live instances already reported"
    );
}

pub fn log_leak_detected(type_name: &str, count: usize, threshold: usize) {
    warn!(
        target: "leakwatch",
        event = "leak_detected",
        type_name,
        count,
        threshold,
        "live instance count above threshold"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .with_level(Level::DEBUG)
            .with_format(LogFormat::Json)
            .with_span_events(true)
            .with_filter("leakwatch=trace");

        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.span_events);
        assert_eq!(config.filter, Some("leakwatch=trace".to_string()));
    }

    #[test]
    fn test_from_vars() {
        let vars: HashMap<&str, &str> = [
            ("LEAKWATCH_LOG_LEVEL", "Debug"),
            ("LEAKWATCH_LOG_FILE", "/var/log/app"),
            ("LEAKWATCH_LOG_JSON", "1"),
        ]
        .into_iter()
        .collect();

        let config = LogConfig::from_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(
            config.output,
            LogOutput::File {
                directory: "/var/log/app".to_string(),
                prefix: "leakwatch".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_level_defaults_to_info() {
        let config = LogConfig::from_vars(|k| (k == "LEAKWATCH_LOG_LEVEL").then(|| "loud".to_string()));
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_init_idempotent() {
        let _first = init_logging(LogConfig::default());
        let second = init_logging(LogConfig::default());
        assert!(second.is_none());
        assert!(is_initialized());
    }

    #[test]
    fn test_event_helpers_do_not_panic() {
        log_track("Foo", 2, 500);
        log_reevaluate("Foo", 1, 1);
        log_bucket_removed("Foo");
        log_leak_unchanged("Foo", 2);
        log_leak_detected("Foo", 2, 1);
    }
}
