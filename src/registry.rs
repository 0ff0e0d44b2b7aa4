//! Label registry: the single source of truth for label existence.
//!
//! The registry maps externally-visible 64-bit labels to engine-private
//! storage slots. It is guarded by one mutex covering lookup and mutation,
//! and the documented access pattern is two-phase: acquire the lock, copy
//! out the slot id (or decide absence), release the lock, then run the
//! potentially slow engine operation without holding it. The lock protects
//! only the registry's own consistency, never end-to-end atomicity of an
//! operation; races on the point behind a copied-out slot id are the
//! engine's to make safe.
//!
//! Deletion state is intentionally not tracked here. A tombstoned point
//! stays in the registry, and its deleted flag is authoritative only in the
//! engine, keyed by slot id.

use ahash::AHashMap;
use parking_lot::Mutex;

/// Externally-assigned 64-bit identifier for a stored vector.
pub type Label = u64;

/// Engine-private storage row identifier.
///
/// Stable only for the engine's lifetime and never surfaced across the
/// facade boundary.
pub type SlotId = u32;

/// Concurrently-guarded mapping from labels to internal slots.
#[derive(Debug, Default)]
pub struct LabelRegistry {
    map: Mutex<AHashMap<Label, SlotId>>,
}

impl LabelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a label and copy out its slot id.
    ///
    /// The guard is released before this returns; callers act on the copied
    /// id without the lock, per the two-phase discipline.
    pub fn get(&self, label: Label) -> Option<SlotId> {
        self.map.lock().get(&label).copied()
    }

    /// Bind a label to a slot, returning the previously bound slot if any.
    ///
    /// Invariant: at most one slot per label at any time.
    pub fn insert(&self, label: Label, slot: SlotId) -> Option<SlotId> {
        self.map.lock().insert(label, slot)
    }

    /// Number of registered labels, tombstoned points included.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Whether no labels are registered.
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let registry = LabelRegistry::new();
        assert!(registry.is_empty());

        assert_eq!(registry.insert(42, 0), None);
        assert_eq!(registry.get(42), Some(0));
        assert_eq!(registry.get(7), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rebind_returns_previous_slot() {
        let registry = LabelRegistry::new();
        registry.insert(42, 0);
        assert_eq!(registry.insert(42, 3), Some(0));
        assert_eq!(registry.get(42), Some(3));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_copies_out_without_holding_the_lock() {
        let registry = LabelRegistry::new();
        registry.insert(1, 10);

        // If get held the guard, this second acquisition would deadlock.
        let slot = registry.get(1);
        registry.insert(2, 20);
        assert_eq!(slot, Some(10));
        assert_eq!(registry.get(2), Some(20));
    }
}
