//! Leak registry - weakly tracked instances grouped by type
//!
//! Design: one coarse lock around the type -> handles map.
//! 1. `track` appends a weak handle and schedules a reevaluation
//! 2. The reevaluation compacts dead handles and persists the result
//! 3. More than `threshold` live handles produce one report
//!
//! Every `track` schedules its own reevaluation, so several may fire over
//! the same live handles. A scheduled reevaluation only reports a live set
//! that differs from the last one reported for the type. Explicit `check`
//! calls always report. Reports are written after the lock is released.

mod handle;


pub use handle::TrackedHandle;

use crate::config::LeakConfig;
use crate::error::{LeakError, Result};
use crate::identity::TypeKey;
use crate::liveness::{Liveness, Observable};
use crate::logging::{
    log_bucket_removed, log_leak_detected, log_leak_unchanged, log_reevaluate, log_track,
};
use crate::provenance::Provenance;
use crate::report::{LeakReport, Reporter};
use crate::scheduler::{Scheduler, ThreadScheduler};
use handle::Bucket;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Process-wide registry, created on first use
static GLOBAL: OnceCell<LeakRegistry> = OnceCell::new();

/// Registry of weakly tracked objects
///
/// Cheap to clone; clones share state. Use `LeakRegistry::global()` for the
/// process-wide instance or `LeakRegistry::builder()` for an isolated one.
#[derive(Clone)]
pub struct LeakRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    config: LeakConfig,
    buckets: Mutex<HashMap<TypeId, Bucket>>,
    scheduler: Arc<dyn Scheduler>,
    reporter: Arc<dyn Reporter>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    tracked: AtomicUsize,
    reevaluations: AtomicUsize,
    reports: AtomicUsize,
    repeats: AtomicUsize,
}

/// What started a reevaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Timer set by `track`; skips live sets already reported
    Scheduled,
    /// `check` or `check_all`; always reports
    Explicit,
}

/// Registry statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    /// `track` calls accepted since creation
    pub tracked_total: usize,
    pub reevaluations: usize,
    pub reports_emitted: usize,
    /// Scheduled reevaluations that found an already reported live set
    pub repeats_suppressed: usize,
    /// Types currently holding at least one handle
    pub types: usize,
    /// Handles currently stored, dead ones included until compaction
    pub handles: usize,
}

/// Live instances of one type at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSnapshot {
    pub type_name: String,
    pub live: Vec<Provenance>,
}

impl LeakRegistry {
    /// Registry with default config, background timer thread and stdout reports
    pub fn new() -> Self {
        Self::with_parts(
            LeakConfig::default(),
            Arc::new(ThreadScheduler::new()),
            LeakConfig::default().reporter(),
        )
    }

    /// Registry built from a validated config with the default scheduler
    pub fn from_config(config: LeakConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> LeakRegistryBuilder {
        LeakRegistryBuilder::new()
    }

    fn with_parts(
        config: LeakConfig,
        scheduler: Arc<dyn Scheduler>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                buckets: Mutex::new(HashMap::new()),
                scheduler,
                reporter,
                counters: Counters::default(),
            }),
        }
    }

    /// The process-wide registry, initialized with defaults on first use
    pub fn global() -> &'static LeakRegistry {
        GLOBAL.get_or_init(LeakRegistry::new)
    }

    /// Install `registry` as the process-wide instance
    ///
    /// Fails if `global()` was already called or a registry was installed.
    pub fn install_global(registry: LeakRegistry) -> Result<&'static LeakRegistry> {
        GLOBAL
            .set(registry)
            .map_err(|_| LeakError::GlobalAlreadyInstalled)?;
        Ok(Self::global())
    }

    pub fn config(&self) -> &LeakConfig {
        &self.inner.config
    }

    /// Track an instance held in an `Arc`
    pub fn track<T>(&self, object: &Arc<T>, provenance: Provenance)
    where
        T: Send + Sync + 'static,
    {
        let address = Arc::as_ptr(object) as *const () as usize;
        self.insert(
            TypeKey::of::<T>(),
            Box::new(Arc::downgrade(object)),
            address,
            provenance,
        );
    }

    /// Track through an existing weak reference
    ///
    /// A reference that is already dead is recorded and purged on the next
    /// reevaluation.
    pub fn track_weak<T>(&self, object: Weak<T>, provenance: Provenance)
    where
        T: Send + Sync + 'static,
    {
        let address = object.as_ptr() as *const () as usize;
        self.insert(TypeKey::of::<T>(), Box::new(object), address, provenance);
    }

    /// Track a type-erased instance
    ///
    /// Grouped by its concrete `TypeId`; reported as `unknown` unless a typed
    /// `track` of the same type supplied the name.
    pub fn track_dyn(&self, object: &Arc<dyn Any + Send + Sync>, provenance: Provenance) {
        let id = (**object).type_id();
        let address = Arc::as_ptr(object) as *const () as usize;
        self.insert(
            TypeKey::erased(id),
            Box::new(Arc::downgrade(object)),
            address,
            provenance,
        );
    }

    /// Track an object that carries its own `LifeToken`
    pub fn track_observable<T>(&self, object: &T, provenance: Provenance)
    where
        T: Observable + 'static,
    {
        let address = object as *const T as usize;
        self.insert(
            TypeKey::of::<T>(),
            Box::new(object.life_token().probe()),
            address,
            provenance,
        );
    }

    fn insert(
        &self,
        key: TypeKey,
        probe: Box<dyn Liveness>,
        address: usize,
        provenance: Provenance,
    ) {
        let inner = &self.inner;
        if !inner.config.enabled {
            return;
        }

        let handles = {
            let mut buckets = inner.buckets.lock();
            let bucket = buckets.entry(key.id()).or_insert_with(|| Bucket::new(key));
            bucket.refine_key(key);
            bucket.push(TrackedHandle::new(probe, provenance, address))
        };
        inner.counters.tracked.fetch_add(1, Ordering::Relaxed);

        let delay = inner.config.delay();
        log_track(key.name(), handles, inner.config.delay_ms);

        let registry = Arc::downgrade(inner);
        inner.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = registry.upgrade() {
                    inner.reevaluate(key, Trigger::Scheduled);
                }
            }),
        );
    }

    /// Reevaluate `T` now, outside the schedule
    pub fn check<T: ?Sized + 'static>(&self) -> Option<LeakReport> {
        self.inner.reevaluate(TypeKey::of::<T>(), Trigger::Explicit)
    }

    /// Reevaluate every tracked type now
    pub fn check_all(&self) -> Vec<LeakReport> {
        let keys: Vec<TypeKey> = self
            .inner
            .buckets
            .lock()
            .values()
            .map(|bucket| bucket.key)
            .collect();

        keys.into_iter()
            .filter_map(|key| self.inner.reevaluate(key, Trigger::Explicit))
            .collect()
    }

    /// Live instances of `T`, without compacting
    pub fn live_count<T: ?Sized + 'static>(&self) -> usize {
        self.live_count_of(TypeKey::of::<T>())
    }

    pub fn live_count_of(&self, key: TypeKey) -> usize {
        self.inner
            .buckets
            .lock()
            .get(&key.id())
            .map_or(0, Bucket::live_count)
    }

    /// Live instances per type, sorted by type name
    pub fn snapshot(&self) -> Vec<TypeSnapshot> {
        let mut snapshot: Vec<TypeSnapshot> = self
            .inner
            .buckets
            .lock()
            .values()
            .map(|bucket| TypeSnapshot {
                type_name: bucket.key.short_name(),
                live: bucket
                    .handles
                    .iter()
                    .filter(|h| h.is_alive())
                    .map(|h| h.provenance().clone())
                    .collect(),
            })
            .filter(|entry| !entry.live.is_empty())
            .collect();

        snapshot.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        snapshot
    }

    pub fn stats(&self) -> RegistryStats {
        let (types, handles) = {
            let buckets = self.inner.buckets.lock();
            let handles = buckets.values().map(|b| b.handles.len()).sum();
            (buckets.len(), handles)
        };

        let counters = &self.inner.counters;
        RegistryStats {
            tracked_total: counters.tracked.load(Ordering::Relaxed),
            reevaluations: counters.reevaluations.load(Ordering::Relaxed),
            reports_emitted: counters.reports.load(Ordering::Relaxed),
            repeats_suppressed: counters.repeats.load(Ordering::Relaxed),
            types,
            handles,
        }
    }
}

impl Default for LeakRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LeakRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeakRegistry")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Inner {
    /// Compact the bucket for `key` and report if too many instances live
    fn reevaluate(&self, key: TypeKey, trigger: Trigger) -> Option<LeakReport> {
        self.counters.reevaluations.fetch_add(1, Ordering::Relaxed);
        let threshold = self.config.threshold;

        let (type_name, live) = {
            let mut buckets = self.buckets.lock();
            let bucket = buckets.get_mut(&key.id())?;

            let purged = bucket.compact();
            let type_name = bucket.key.short_name();
            log_reevaluate(&type_name, bucket.handles.len(), purged);

            if bucket.handles.is_empty() {
                buckets.remove(&key.id());
                log_bucket_removed(&type_name);
                return None;
            }
            if bucket.handles.len() <= threshold {
                bucket.clear_reported();
                return None;
            }

            let fresh = bucket.mark_reported();
            if !fresh && trigger == Trigger::Scheduled {
                self.counters.repeats.fetch_add(1, Ordering::Relaxed);
                log_leak_unchanged(&type_name, bucket.handles.len());
                return None;
            }

            let live: Vec<Provenance> = bucket
                .handles
                .iter()
                .map(|h| h.provenance().clone())
                .collect();
            (type_name, live)
        };

        log_leak_detected(&type_name, live.len(), threshold);
        let report = LeakReport {
            type_name,
            count: live.len(),
            instances: live,
        };
        self.counters.reports.fetch_add(1, Ordering::Relaxed);
        self.reporter.report(&report);

        Some(report)
    }
}

/// Builder for isolated registries
pub struct LeakRegistryBuilder {
    config: LeakConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    reporter: Option<Arc<dyn Reporter>>,
}

impl LeakRegistryBuilder {
    pub fn new() -> Self {
        Self {
            config: LeakConfig::default(),
            scheduler: None,
            reporter: None,
        }
    }

    pub fn config(mut self, config: LeakConfig) -> Self {
        self.config = config;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.config = self.config.with_delay(delay);
        self
    }

    pub fn threshold(mut self, threshold: usize) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn scheduler(self, scheduler: impl Scheduler + 'static) -> Self {
        self.shared_scheduler(Arc::new(scheduler))
    }

    pub fn shared_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Override the sink described by the config
    pub fn reporter(self, reporter: impl Reporter + 'static) -> Self {
        self.shared_reporter(Arc::new(reporter))
    }

    pub fn shared_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> Result<LeakRegistry> {
        self.config.validate()?;

        let reporter = self.reporter.unwrap_or_else(|| self.config.reporter());
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(ThreadScheduler::new()));

        Ok(LeakRegistry::with_parts(self.config, scheduler, reporter))
    }
}

impl Default for LeakRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Track an `Arc` with the call site as provenance
///
/// `track!(object)` uses the global registry, `track!(registry, object)` the
/// given one.
#[macro_export]
macro_rules! track {
    ($object:expr) => {
        $crate::LeakRegistry::global().track($object, $crate::provenance!())
    };
    ($registry:expr, $object:expr) => {
        $registry.track($object, $crate::provenance!())
    };
}
