//! Weak handle plus provenance for one `track` call

use crate::identity::TypeKey;
use crate::liveness::Liveness;
use crate::provenance::Provenance;
use std::fmt;

/// One tracked instance
///
/// Never owns the object. The address is kept for diagnostics only and is
/// never dereferenced.
pub struct TrackedHandle {
    probe: Box<dyn Liveness>,
    provenance: Provenance,
    address: usize,
    /// Position within its bucket, assigned on insertion
    seq: u64,
}

impl TrackedHandle {
    pub fn new(probe: Box<dyn Liveness>, provenance: Provenance, address: usize) -> Self {
        Self {
            probe,
            provenance,
            address,
            seq: 0,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.probe.is_alive()
    }

    #[inline]
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    #[inline]
    pub fn address(&self) -> usize {
        self.address
    }
}

impl fmt::Debug for TrackedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedHandle")
            .field("alive", &self.is_alive())
            .field("provenance", &self.provenance)
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}

/// All handles recorded for one type, in insertion order
#[derive(Debug)]
pub(crate) struct Bucket {
    pub key: TypeKey,
    pub handles: Vec<TrackedHandle>,
    next_seq: u64,
    /// Handles listed by the last report; empty once the type drops back
    /// under the threshold
    reported: Vec<u64>,
}

impl Bucket {
    pub fn new(key: TypeKey) -> Self {
        Self {
            key,
            handles: Vec::new(),
            next_seq: 0,
            reported: Vec::new(),
        }
    }

    /// Append a handle, returning the bucket length
    pub fn push(&mut self, mut handle: TrackedHandle) -> usize {
        handle.seq = self.next_seq;
        self.next_seq += 1;
        self.handles.push(handle);
        self.handles.len()
    }

    /// Remember the current handles as reported
    ///
    /// Returns false when exactly these handles were already reported.
    pub fn mark_reported(&mut self) -> bool {
        let current: Vec<u64> = self.handles.iter().map(|h| h.seq).collect();
        if current == self.reported {
            return false;
        }
        self.reported = current;
        true
    }

    pub fn clear_reported(&mut self) {
        self.reported.clear();
    }

    /// Prefer a real type name over the erased placeholder
    pub fn refine_key(&mut self, key: TypeKey) {
        if !self.key.is_named() && key.is_named() {
            self.key = key;
        }
    }

    /// Drop dead handles, returning how many were removed
    pub fn compact(&mut self) -> usize {
        let before = self.handles.len();
        self.handles.retain(TrackedHandle::is_alive);
        before - self.handles.len()
    }

    pub fn live_count(&self) -> usize {
        self.handles.iter().filter(|h| h.is_alive()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;
    use std::sync::Arc;

    struct Screen;

    fn handle_for(object: &Arc<Screen>, line: u32) -> TrackedHandle {
        TrackedHandle::new(
            Box::new(Arc::downgrade(object)),
            Provenance::new("screen.rs", "open", line),
            Arc::as_ptr(object) as usize,
        )
    }

    #[test]
    fn test_compact_keeps_order_of_survivors() {
        let a = Arc::new(Screen);
        let b = Arc::new(Screen);
        let c = Arc::new(Screen);

        let mut bucket = Bucket::new(TypeKey::of::<Screen>());
        bucket.push(handle_for(&a, 1));
        bucket.push(handle_for(&b, 2));
        assert_eq!(bucket.push(handle_for(&c, 3)), 3);

        drop(b);
        assert_eq!(bucket.live_count(), 2);
        assert_eq!(bucket.handles.len(), 3);

        assert_eq!(bucket.compact(), 1);
        let lines: Vec<u32> = bucket.handles.iter().map(|h| h.provenance().line).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_mark_reported_once_per_live_set() {
        let a = Arc::new(Screen);
        let b = Arc::new(Screen);
        let mut bucket = Bucket::new(TypeKey::of::<Screen>());
        bucket.push(handle_for(&a, 1));
        bucket.push(handle_for(&b, 2));

        assert!(bucket.mark_reported());
        assert!(!bucket.mark_reported());

        // Same objects tracked again are new handles
        bucket.push(handle_for(&b, 3));
        assert!(bucket.mark_reported());

        drop(b);
        bucket.compact();
        assert!(bucket.mark_reported());

        bucket.clear_reported();
        assert!(bucket.mark_reported());
    }

    #[test]
    fn test_refine_key() {
        let mut bucket = Bucket::new(TypeKey::erased(TypeId::of::<Screen>()));
        assert!(!bucket.key.is_named());

        bucket.refine_key(TypeKey::of::<Screen>());
        assert_eq!(bucket.key.short_name(), "Screen");

        bucket.refine_key(TypeKey::erased(TypeId::of::<Screen>()));
        assert_eq!(bucket.key.short_name(), "Screen");
    }

    #[test]
    fn test_debug_does_not_touch_object() {
        let a = Arc::new(Screen);
        let handle = handle_for(&a, 7);
        drop(a);

        let text = format!("{:?}", handle);
        assert!(text.contains("alive: false"));
    }
}
