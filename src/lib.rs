//! leakwatch - weak-reference leak detector
//!
//! Tracks `Arc`-held objects without owning them, grouped by type. Each
//! `track` call schedules a check after a grace period (500 ms by default);
//! if more than one instance of the type is still alive at that point, a
//! report is written:
//!
//! ```text
//! MEMORY LEAK: Screen count: 2
//! Object Screen created at: app.rs:14 open_screen
//! Object Screen created at: app.rs:14 open_screen
//! ```
//!
//! This is a heuristic: long-lived singletons with several instances are
//! reported the same way as real leaks.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use leakwatch::{CollectingReporter, LeakRegistry, ManualScheduler};
//!
//! struct Screen;
//!
//! let clock = ManualScheduler::new();
//! let reports = CollectingReporter::new();
//! let registry = LeakRegistry::builder()
//!     .scheduler(clock.clone())
//!     .reporter(reports.clone())
//!     .build()
//!     .unwrap();
//!
//! let first = Arc::new(Screen);
//! let second = Arc::new(Screen);
//! leakwatch::track!(registry, &first);
//! leakwatch::track!(registry, &second);
//!
//! clock.advance(Duration::from_millis(500));
//! assert_eq!(reports.reports()[0].count, 2);
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod liveness;
pub mod logging;
pub mod provenance;
pub mod registry;
pub mod report;
pub mod scheduler;

pub use config::{LeakConfig, ReportFormat, ReportOutput};
pub use error::LeakError;
pub use identity::{short_type_name, TypeKey, UNKNOWN_TYPE_NAME};
pub use liveness::{LifeToken, Liveness, Observable};
pub use logging::{init_logging, LogConfig, LogFormat, LogOutput};
pub use provenance::Provenance;
pub use registry::{LeakRegistry, LeakRegistryBuilder, RegistryStats, TrackedHandle, TypeSnapshot};
pub use report::{
    CollectingReporter, ConsoleReporter, JsonReporter, LeakReport, Reporter, TracingReporter,
};
pub use scheduler::{Job, ManualScheduler, Scheduler, ThreadScheduler, TokioScheduler};
