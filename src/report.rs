//! Leak reports and the sinks they are written to

use crate::provenance::Provenance;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, warn};

/// One offending type at one reevaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakReport {
    pub type_name: String,
    pub count: usize,
    pub instances: Vec<Provenance>,
}

impl LeakReport {
    /// Text lines of the report block, header first
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.instances.len() + 1);
        lines.push(format!("MEMORY LEAK: {} count: {}", self.type_name, self.count));
        for instance in &self.instances {
            lines.push(format!("Object {} created at: {}", self.type_name, instance));
        }
        lines
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// Destination for leak reports
///
/// Called from the scheduler's worker, outside the registry lock.
pub trait Reporter: Send + Sync {
    fn report(&self, report: &LeakReport);
}

impl<F> Reporter for F
where
    F: Fn(&LeakReport) + Send + Sync,
{
    fn report(&self, report: &LeakReport) {
        self(report)
    }
}

/// Console stream the text and JSON sinks write to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportOutput {
    #[default]
    Stdout,
    Stderr,
}

impl ReportOutput {
    fn emit(self, f: impl FnOnce(&mut dyn Write) -> io::Result<()>) {
        let result = match self {
            ReportOutput::Stdout => f(&mut io::stdout().lock()),
            ReportOutput::Stderr => f(&mut io::stderr().lock()),
        };
        if let Err(e) = result {
            error!(target: "leakwatch", error = %e, "failed to write leak report");
        }
    }
}

/// Plain text report block on stdout or stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    output: ReportOutput,
}

impl ConsoleReporter {
    pub fn new(output: ReportOutput) -> Self {
        Self { output }
    }

    pub fn stdout() -> Self {
        Self::new(ReportOutput::Stdout)
    }

    pub fn stderr() -> Self {
        Self::new(ReportOutput::Stderr)
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, report: &LeakReport) {
        self.output.emit(|out| write_block(out, report));
    }
}

fn write_block<W: Write + ?Sized>(out: &mut W, report: &LeakReport) -> io::Result<()> {
    for line in report.lines() {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

fn write_json_line<W: Write + ?Sized>(out: &mut W, json: &str) -> io::Result<()> {
    writeln!(out, "{}", json)?;
    out.flush()
}

/// One JSON object per report, newline delimited
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter {
    output: ReportOutput,
}

impl JsonReporter {
    pub fn new(output: ReportOutput) -> Self {
        Self { output }
    }

    pub fn to_json(report: &LeakReport) -> serde_json::Result<String> {
        serde_json::to_string(report)
    }
}

impl Reporter for JsonReporter {
    fn report(&self, report: &LeakReport) {
        let json = match Self::to_json(report) {
            Ok(json) => json,
            Err(e) => {
                error!(target: "leakwatch", error = %e, "failed to serialize leak report");
                return;
            }
        };
        self.output.emit(|out| write_json_line(out, &json));
    }
}

/// Structured `tracing` warning per report
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, report: &LeakReport) {
        let instances: Vec<String> = report.instances.iter().map(|p| p.to_string()).collect();
        warn!(
            target: "leakwatch::report",
            type_name = %report.type_name,
            count = report.count,
            instances = ?instances,
            "MEMORY LEAK"
        );
    }
}

/// Keeps every report in memory
///
/// Clones share the same buffer, so a clone handed to a registry can be
/// inspected from the test that built it.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    reports: Arc<Mutex<Vec<LeakReport>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<LeakReport> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Drain collected reports
    pub fn take(&self) -> Vec<LeakReport> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, report: &LeakReport) {
        self.reports.lock().push(report.clone());
    }
}
