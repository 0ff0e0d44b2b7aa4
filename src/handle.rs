//! Opaque, process-wide index handles.
//!
//! Cross-boundary callers hold an index not by address but by an opaque
//! token issued from a process-wide table. Tokens are `Copy`; the table
//! owns the indexes. Releasing a handle succeeds exactly once, and both
//! double-release and use-after-release are inert lookups rather than
//! undefined behavior.

use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::index::AnnIndex;

static HANDLES: LazyLock<HandleTable> = LazyLock::new(HandleTable::new);

/// The process-wide handle table.
pub fn handles() -> &'static HandleTable {
    &HANDLES
}

/// An opaque token identifying one registered index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexHandle(u64);

/// A table of open indexes keyed by opaque tokens.
#[derive(Default)]
pub struct HandleTable {
    entries: RwLock<AHashMap<u64, Arc<AnnIndex>>>,
    next: AtomicU64,
}

impl HandleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    /// Take ownership of an index and issue a handle for it.
    pub fn register(&self, index: AnnIndex) -> IndexHandle {
        let token = self.next.fetch_add(1, Ordering::SeqCst);
        self.entries.write().insert(token, Arc::new(index));
        IndexHandle(token)
    }

    /// Resolve a handle to its index.
    ///
    /// A released or never-issued handle resolves to `None`.
    pub fn get(&self, handle: IndexHandle) -> Option<Arc<AnnIndex>> {
        self.entries.read().get(&handle.0).cloned()
    }

    /// Release a handle, dropping the table's ownership of the index.
    ///
    /// Returns `true` exactly once per handle; in-flight clones from
    /// [`get`](Self::get) keep the index alive until they drop.
    pub fn release(&self, handle: IndexHandle) -> bool {
        self.entries.write().remove(&handle.0).is_some()
    }

    /// Number of registered indexes.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no indexes are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
