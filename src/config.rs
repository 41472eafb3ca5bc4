//! Registry configuration
//!
//! Nothing here is required: `LeakConfig::default()` reproduces the stock
//! behavior (500 ms grace period, report when more than one instance lives,
//! text blocks on stdout). A `leakwatch.toml` can override any field:
//!
//! ```toml
//! delay_ms = 1000
//! threshold = 2
//! report = "json"
//! output = "stderr"
//! ```

use crate::error::{LeakError, Result};
use crate::report::{ConsoleReporter, JsonReporter, Reporter, TracingReporter};
pub use crate::report::ReportOutput;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// File name looked up by `LeakConfig::discover`
pub const CONFIG_FILE_NAME: &str = "leakwatch.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakConfig {
    /// When false, `track` calls are accepted and ignored
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Grace period between `track` and its reevaluation
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// A report is emitted when the live count exceeds this value
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    #[serde(default)]
    pub report: ReportFormat,

    #[serde(default)]
    pub output: ReportOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Tracing,
}

impl Default for LeakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: default_delay_ms(),
            threshold: default_threshold(),
            report: ReportFormat::default(),
            output: ReportOutput::default(),
        }
    }
}

fn default_true() -> bool { true }
fn default_delay_ms() -> u64 { 500 }
fn default_threshold() -> usize { 1 }

impl LeakConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_report(mut self, report: ReportFormat) -> Self {
        self.report = report;
        self
    }

    pub fn with_output(mut self, output: ReportOutput) -> Self {
        self.output = output;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| LeakError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find `leakwatch.toml` in the current directory or its parents
    ///
    /// Falls back to defaults when no readable, valid file is found.
    pub fn discover() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Self::default(),
        }
    }

    /// Same as `discover`, starting the search at `start`
    ///
    /// Invalid files are skipped with a warning and the search continues
    /// upward.
    pub fn discover_from(start: &Path) -> Self {
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if !candidate.is_file() {
                continue;
            }
            match Self::load(&candidate) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(
                        target: "leakwatch",
                        path = %candidate.display(),
                        error = %e,
                        "ignoring invalid config"
                    );
                }
            }
        }

        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(LeakError::invalid(
                "threshold",
                "must be at least 1, a single live instance is never a leak",
            ));
        }
        Ok(())
    }

    /// Sink described by `report` and `output`
    pub fn reporter(&self) -> Arc<dyn Reporter> {
        match self.report {
            ReportFormat::Text => Arc::new(ConsoleReporter::new(self.output)),
            ReportFormat::Json => Arc::new(JsonReporter::new(self.output)),
            ReportFormat::Tracing => Arc::new(TracingReporter),
        }
    }
}
