//! The operation facade over the graph engine.
//!
//! [`AnnIndex`] wraps one engine instance and exposes the externally
//! callable operation set: create/load/save, add, search, set-ef, resize,
//! mark/unmark delete, is-deleted, update, fetch-by-label, and the stat
//! queries. Label-keyed operations resolve the label through the engine's
//! registry with the two-phase protocol: the registry lock is held only for
//! the lookup, never across the engine call.

use std::path::Path;

use rayon::prelude::*;

use crate::engine::{HnswConfig, HnswEngine, persist};
use crate::error::{Result, VicinityError};
use crate::marshal::{self, SearchHits};
use crate::registry::Label;
use crate::space::SpaceKind;

/// Updated points always have their neighbor edges recomputed.
const FULL_RELINK: f32 = 1.0;

/// A mutable, concurrently-updatable approximate nearest neighbor index.
///
/// All operations take `&self`; interior locking lives in the engine. Add,
/// search, and update may race on the same index. Resize takes the graph
/// write lock and so excludes everything else; [`save`](Self::save) performs
/// no locking across the serialization pass and needs a quiescent index for
/// a consistent snapshot.
#[derive(Debug)]
pub struct AnnIndex {
    engine: HnswEngine,
}

impl AnnIndex {
    /// Allocate a fresh, empty index.
    pub fn create(config: HnswConfig) -> Result<Self> {
        Ok(Self {
            engine: HnswEngine::new(config)?,
        })
    }

    /// Reconstruct an index from a persisted image.
    ///
    /// The space is caller-selected, as at creation; an unreadable or
    /// malformed image fails the whole operation, with no partial-index
    /// recovery.
    pub fn load(path: impl AsRef<Path>, dimension: usize, space: SpaceKind) -> Result<Self> {
        Ok(Self {
            engine: persist::load(path, dimension, space)?,
        })
    }

    /// Serialize the full index to a file. Always a complete snapshot,
    /// never incremental.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        persist::save(&self.engine, path)
    }

    /// Insert a vector under a caller-assigned label.
    ///
    /// No existence pre-check is performed; an already-known label is
    /// refreshed in place by the engine. Fails when capacity is exhausted —
    /// there is no automatic resize.
    pub fn add(&self, vector: &[f32], label: Label) -> Result<()> {
        self.engine.insert(vector, label)
    }

    /// Retrieve up to `k` nearest neighbors, closest first.
    ///
    /// Infallible by contract: any internal failure, searching an empty
    /// index included, yields empty hits rather than an error. Distances
    /// are non-decreasing.
    pub fn search(&self, query: &[f32], k: usize) -> SearchHits {
        match self.engine.knn_search(query, k) {
            Ok(heap) => marshal::into_ascending(heap),
            Err(_) => SearchHits::default(),
        }
    }

    /// Search many queries in parallel.
    pub fn search_batch(&self, queries: &[Vec<f32>], k: usize) -> Vec<SearchHits> {
        queries
            .par_iter()
            .map(|query| self.search(query, k))
            .collect()
    }

    /// Set the search-time candidate set size. Unconditional.
    pub fn set_ef(&self, ef: usize) {
        self.engine.set_ef_search(ef);
    }

    /// Grow (or shrink) the maximum element capacity.
    ///
    /// Guarded: a capacity below the current element count is refused
    /// before the engine is touched, protecting live data.
    pub fn resize(&self, new_capacity: usize) -> Result<()> {
        let current = self.engine.count();
        if new_capacity < current {
            return Err(VicinityError::ResizeTooSmall {
                requested: new_capacity,
                current,
            });
        }
        // The engine re-checks under its write lock.
        self.engine.resize(new_capacity)
    }

    /// Tombstone the point for a label, excluding it from future searches
    /// while it keeps its storage and registry slot.
    pub fn mark_deleted(&self, label: Label) -> Result<()> {
        self.engine.mark_deleted(label)
    }

    /// Reverse a tombstone.
    pub fn unmark_deleted(&self, label: Label) -> Result<()> {
        self.engine.unmark_deleted(label)
    }

    /// Whether the point for a label is tombstoned.
    ///
    /// An absent label reads as `false`, never an error; absence and "not
    /// deleted" are conflated by design.
    pub fn is_deleted(&self, label: Label) -> bool {
        match self.engine.registry().get(label) {
            Some(slot) => self.engine.is_deleted(slot),
            None => false,
        }
    }

    /// Overwrite the vector for a label and refresh its graph neighbors.
    ///
    /// Two-phase: the slot id is copied out under the registry lock, the
    /// lock is released, and only then does the engine rewrite the point.
    /// A concurrent mutation racing with the engine call is the engine's
    /// to make safe.
    pub fn update(&self, vector: &[f32], label: Label) -> Result<()> {
        let slot = self
            .engine
            .registry()
            .get(label)
            .ok_or(VicinityError::UnknownLabel(label))?;
        self.engine.update_in_place(vector, slot, FULL_RELINK)
    }

    /// Copy of the stored vector for a label, or `None` if unknown.
    pub fn get(&self, label: Label) -> Option<Vec<f32>> {
        let slot = self.engine.registry().get(label)?;
        self.engine.vector_for(slot)
    }

    /// Maximum number of elements the index can currently hold.
    pub fn max_elements(&self) -> usize {
        self.engine.capacity()
    }

    /// Number of stored elements, tombstoned points included.
    pub fn len(&self) -> usize {
        self.engine.count()
    }

    /// Whether the index stores no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tombstoned elements.
    pub fn deleted_count(&self) -> usize {
        self.engine.deleted_count()
    }
}
