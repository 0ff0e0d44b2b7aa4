//! HNSW (Hierarchical Navigable Small World) graph engine.
//!
//! The engine owns the multi-layer neighbor graph, the stored vectors, the
//! tombstone flags, and the label registry. Searches descend greedily from
//! the top layer and widen to an `ef`-sized candidate set at layer 0;
//! inserts run the same descent and link the new node bidirectionally at
//! every layer it occupies.
//!
//! Concurrency: the whole graph state sits behind one `RwLock`. Searches
//! and stat reads take read guards and may run concurrently; inserts,
//! updates, deletes, and resizes take the write guard. The label registry
//! carries its own lock and is only ever acquired after the graph lock
//! inside this module, never the other way around. The RNG mutex is never
//! held together with the graph lock.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashSet;
use parking_lot::{Mutex, RwLock};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::config::HnswConfig;
use crate::error::{Result, VicinityError};
use crate::registry::{Label, LabelRegistry, SlotId};
use crate::space;

/// Hard cap on the randomly assigned layer, guarding the degenerate draw.
const MAX_LEVEL: usize = 32;

/// A search result carried on the engine's max-heap.
///
/// Ordered by distance (ties broken by label), so a `BinaryHeap<Neighbor>`
/// pops the farthest result first — the marshaling layer reverses that into
/// ascending order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Distance from the query in the index's space.
    pub distance: f32,
    /// Caller-assigned label of the stored vector.
    pub label: Label,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.label.cmp(&other.label))
    }
}

/// Internal candidate during graph traversal, keyed by slot.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance: f32,
    slot: SlotId,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

/// One storage row: a vector, its label, its tombstone flag, and its
/// per-layer neighbor lists. `links.len() - 1` is the node's top layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SlotNode {
    pub(crate) label: Label,
    pub(crate) vector: Vec<f32>,
    pub(crate) deleted: bool,
    pub(crate) links: Vec<Vec<SlotId>>,
}

/// Mutable graph state guarded by the engine's `RwLock`.
#[derive(Debug)]
pub(crate) struct GraphState {
    pub(crate) slots: Vec<SlotNode>,
    pub(crate) capacity: usize,
    pub(crate) entry_point: Option<SlotId>,
    pub(crate) max_layer: usize,
    pub(crate) deleted: usize,
}

/// The HNSW graph engine.
#[derive(Debug)]
pub struct HnswEngine {
    config: HnswConfig,
    level_mult: f64,
    ef_search: AtomicUsize,
    registry: LabelRegistry,
    rng: Mutex<StdRng>,
    state: RwLock<GraphState>,
}

impl HnswEngine {
    /// Create a fresh, empty engine.
    pub fn new(config: HnswConfig) -> Result<Self> {
        config.validate()?;

        let rng = StdRng::seed_from_u64(config.seed);
        let state = GraphState {
            slots: Vec::new(),
            capacity: config.capacity,
            entry_point: None,
            max_layer: 0,
            deleted: 0,
        };

        Ok(Self {
            level_mult: 1.0 / (config.m as f64).ln(),
            ef_search: AtomicUsize::new(config.ef_search),
            registry: LabelRegistry::new(),
            rng: Mutex::new(rng),
            config,
            state: RwLock::new(state),
        })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// The label registry, shared with the facade rather than duplicated.
    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    /// Set the search-time candidate set size. Unvalidated by contract.
    pub fn set_ef_search(&self, ef: usize) {
        self.ef_search.store(ef, Ordering::Relaxed);
    }

    /// Current search-time candidate set size.
    pub fn ef_search(&self) -> usize {
        self.ef_search.load(Ordering::Relaxed)
    }

    /// Maximum number of elements the index can currently hold.
    pub fn capacity(&self) -> usize {
        self.state.read().capacity
    }

    /// Number of stored elements, tombstoned points included.
    pub fn count(&self) -> usize {
        self.state.read().slots.len()
    }

    /// Number of tombstoned elements.
    pub fn deleted_count(&self) -> usize {
        self.state.read().deleted
    }

    /// Insert a vector under a label.
    ///
    /// An already-registered label is refreshed in place by graph
    /// reinsertion rather than stored twice. A new label fails with
    /// [`VicinityError::CapacityExhausted`] when the index is full; there
    /// is no automatic resize.
    pub fn insert(&self, vector: &[f32], label: Label) -> Result<()> {
        let mut data = vector.to_vec();
        if self.config.space.normalizes() {
            space::normalize(&mut data);
        }
        let level = self.random_level();

        let mut state = self.state.write();
        // The existence check must run under the graph lock: two racing
        // adds of the same fresh label would otherwise both allocate a
        // slot, binding one label to two rows.
        if let Some(slot) = self.registry.get(label) {
            self.overwrite_slot(&mut state, slot, data, true);
            return Ok(());
        }
        if state.slots.len() >= state.capacity {
            return Err(VicinityError::CapacityExhausted {
                capacity: state.capacity,
            });
        }

        let slot = state.slots.len() as SlotId;
        state.slots.push(SlotNode {
            label,
            vector: data,
            deleted: false,
            links: vec![Vec::new(); level + 1],
        });

        match state.entry_point {
            None => {
                state.entry_point = Some(slot);
                state.max_layer = level;
            }
            Some(entry) => {
                self.link_node(&mut state, slot, level, entry);
                if level > state.max_layer {
                    state.max_layer = level;
                    state.entry_point = Some(slot);
                }
            }
        }

        // Registered last so a label never points at a half-linked slot.
        self.registry.insert(label, slot);
        Ok(())
    }

    /// Search for the `k` nearest neighbors of a query vector.
    ///
    /// Returns a max-heap ordered by descending distance, size <= k, with
    /// tombstoned points excluded from the results (they are still
    /// traversed). Fails on an empty index; the facade maps that to an
    /// empty result by contract.
    pub fn knn_search(&self, query: &[f32], k: usize) -> Result<BinaryHeap<Neighbor>> {
        let state = self.state.read();
        let entry = state
            .entry_point
            .ok_or_else(|| VicinityError::internal("search on an empty index"))?;
        if k == 0 {
            return Ok(BinaryHeap::new());
        }

        let mut q = query.to_vec();
        if self.config.space.normalizes() {
            space::normalize(&mut q);
        }

        let mut ep = entry;
        for layer in (1..=state.max_layer).rev() {
            ep = self.closest_at_layer(&state, &q, ep, layer);
        }

        let ef = self.ef_search().max(k);
        let candidates = self.search_layer(&state, &q, ep, ef, 0);

        let mut heap = BinaryHeap::with_capacity(k);
        for candidate in candidates {
            // Candidates arrive in ascending order, so the first k live
            // ones are the result set.
            if heap.len() >= k {
                break;
            }
            let node = &state.slots[candidate.slot as usize];
            if node.deleted {
                continue;
            }
            heap.push(Neighbor {
                distance: candidate.distance,
                label: node.label,
            });
        }
        Ok(heap)
    }

    /// Grow (or shrink) the maximum element capacity.
    ///
    /// Refuses to shrink below the stored element count; allocation
    /// failures are reported, never a panic.
    pub fn resize(&self, new_capacity: usize) -> Result<()> {
        let mut state = self.state.write();
        if new_capacity < state.slots.len() {
            return Err(VicinityError::ResizeTooSmall {
                requested: new_capacity,
                current: state.slots.len(),
            });
        }
        if new_capacity > state.slots.len() {
            let additional = new_capacity - state.slots.len();
            state
                .slots
                .try_reserve(additional)
                .map_err(|e| VicinityError::internal(format!("resize allocation failed: {e}")))?;
        }
        state.capacity = new_capacity;
        Ok(())
    }

    /// Tombstone the point stored under a label.
    ///
    /// Idempotent: re-marking an already-deleted point succeeds without
    /// changing the deleted count. Fails only for an unknown label.
    pub fn mark_deleted(&self, label: Label) -> Result<()> {
        let slot = self
            .registry
            .get(label)
            .ok_or(VicinityError::UnknownLabel(label))?;
        let mut state = self.state.write();
        let node = &mut state.slots[slot as usize];
        if !node.deleted {
            node.deleted = true;
            state.deleted += 1;
        }
        Ok(())
    }

    /// Reverse a tombstone. Idempotent, same failure condition as
    /// [`mark_deleted`](Self::mark_deleted).
    pub fn unmark_deleted(&self, label: Label) -> Result<()> {
        let slot = self
            .registry
            .get(label)
            .ok_or(VicinityError::UnknownLabel(label))?;
        let mut state = self.state.write();
        let node = &mut state.slots[slot as usize];
        if node.deleted {
            node.deleted = false;
            state.deleted -= 1;
        }
        Ok(())
    }

    /// Whether the point in a slot is tombstoned.
    pub fn is_deleted(&self, slot: SlotId) -> bool {
        let state = self.state.read();
        state
            .slots
            .get(slot as usize)
            .map(|node| node.deleted)
            .unwrap_or(false)
    }

    /// Overwrite the vector in a slot and refresh its graph neighborhood.
    ///
    /// With `relink_probability` (the facade fixes it at 1.0) the node is
    /// detached and relinked at its existing layers so its neighbor edges
    /// are recomputed rather than left stale. Tombstone state is untouched.
    pub fn update_in_place(
        &self,
        vector: &[f32],
        slot: SlotId,
        relink_probability: f32,
    ) -> Result<()> {
        // Sampled before the graph lock; the RNG mutex and the graph lock
        // are never held together.
        let relink = if relink_probability >= 1.0 {
            true
        } else if relink_probability <= 0.0 {
            false
        } else {
            self.rng.lock().random::<f32>() < relink_probability
        };

        let mut data = vector.to_vec();
        if self.config.space.normalizes() {
            space::normalize(&mut data);
        }

        let mut state = self.state.write();
        if slot as usize >= state.slots.len() {
            return Err(VicinityError::internal(format!("slot {slot} out of range")));
        }
        self.overwrite_slot(&mut state, slot, data, relink);
        Ok(())
    }

    /// Overwrite a slot's vector and optionally relink its neighborhood.
    /// Runs inside the caller's write guard; `slot` must be in range.
    fn overwrite_slot(&self, state: &mut GraphState, slot: SlotId, data: Vec<f32>, relink: bool) {
        let idx = slot as usize;
        state.slots[idx].vector = data;

        if relink && state.slots.len() > 1 {
            self.detach(state, slot);
            let level = state.slots[idx].links.len() - 1;
            let entry = if state.entry_point == Some(slot) {
                // The node under update cannot serve as its own entry;
                // fall back to the highest remaining node.
                state
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .max_by_key(|(_, node)| node.links.len())
                    .map(|(i, _)| i as SlotId)
            } else {
                state.entry_point
            };
            if let Some(entry) = entry {
                self.link_node(state, slot, level, entry);
            }
        }
    }

    /// Copy of the stored vector in a slot.
    pub fn vector_for(&self, slot: SlotId) -> Option<Vec<f32>> {
        let state = self.state.read();
        state.slots.get(slot as usize).map(|node| node.vector.clone())
    }

    /// Randomly select a layer for a new node.
    fn random_level(&self) -> usize {
        let mut rng = self.rng.lock();
        let uniform: f64 = rng.random();
        ((-uniform.ln() * self.level_mult) as usize).min(MAX_LEVEL)
    }

    /// Neighbor list cap per layer: 2M at layer 0, M above.
    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m * 2
        } else {
            self.config.m
        }
    }

    /// Greedy single-result descent step at one layer.
    fn closest_at_layer(
        &self,
        state: &GraphState,
        query: &[f32],
        entry: SlotId,
        layer: usize,
    ) -> SlotId {
        self.search_layer(state, query, entry, 1, layer)
            .first()
            .map(|c| c.slot)
            .unwrap_or(entry)
    }

    /// Beam search within one layer.
    ///
    /// Returns up to `ef` candidates in ascending distance order. Nodes
    /// that do not occupy `layer` contribute no edges but still seed the
    /// search when used as an entry.
    fn search_layer(
        &self,
        state: &GraphState,
        query: &[f32],
        entry: SlotId,
        ef: usize,
        layer: usize,
    ) -> Vec<Candidate> {
        let space = self.config.space;
        let mut visited: AHashSet<SlotId> = AHashSet::new();
        let mut to_visit = BinaryHeap::new(); // Min-heap of unexplored candidates
        let mut best: BinaryHeap<Candidate> = BinaryHeap::new(); // Max-heap bounded by ef

        let seed = Candidate {
            distance: space.distance(query, &state.slots[entry as usize].vector),
            slot: entry,
        };
        visited.insert(entry);
        to_visit.push(Reverse(seed));
        best.push(seed);

        while let Some(Reverse(current)) = to_visit.pop() {
            if let Some(farthest) = best.peek() {
                if current.distance > farthest.distance && best.len() >= ef {
                    break;
                }
            }

            let node = &state.slots[current.slot as usize];
            if layer >= node.links.len() {
                continue;
            }
            for &neighbor in &node.links[layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let candidate = Candidate {
                    distance: space.distance(query, &state.slots[neighbor as usize].vector),
                    slot: neighbor,
                };
                if best.len() < ef {
                    best.push(candidate);
                    to_visit.push(Reverse(candidate));
                } else if let Some(farthest) = best.peek() {
                    if candidate.distance < farthest.distance {
                        best.pop();
                        best.push(candidate);
                        to_visit.push(Reverse(candidate));
                    }
                }
            }
        }

        best.into_sorted_vec()
    }

    /// Link a node into the graph at layers `0..=level`.
    ///
    /// Descends greedily above `level`, then at each layer below runs an
    /// `ef_construction`-wide search, links bidirectionally to the closest
    /// M candidates, and clamps any overflowing neighbor lists.
    fn link_node(&self, state: &mut GraphState, slot: SlotId, level: usize, mut entry: SlotId) {
        let query = state.slots[slot as usize].vector.clone();
        let top = state.max_layer;

        for layer in ((level + 1)..=top).rev() {
            entry = self.closest_at_layer(state, &query, entry, layer);
        }

        for layer in (0..=level.min(top)).rev() {
            let candidates =
                self.search_layer(state, &query, entry, self.config.ef_construction, layer);
            // A candidate can only be linked at a layer it occupies; the
            // seed entry may sit below this layer after an update relink.
            let selected: Vec<SlotId> = candidates
                .iter()
                .map(|c| c.slot)
                .filter(|&s| s != slot && layer < state.slots[s as usize].links.len())
                .take(self.config.m)
                .collect();

            for &neighbor in &selected {
                state.slots[slot as usize].links[layer].push(neighbor);
                state.slots[neighbor as usize].links[layer].push(slot);

                let cap = self.max_links(layer);
                if state.slots[neighbor as usize].links[layer].len() > cap {
                    self.shrink_links(state, neighbor, layer, cap);
                }
            }

            if let Some(&first) = selected.first() {
                entry = first;
            }
        }
    }

    /// Keep only the closest `cap` neighbors of a node at one layer.
    fn shrink_links(&self, state: &mut GraphState, slot: SlotId, layer: usize, cap: usize) {
        let base = state.slots[slot as usize].vector.clone();
        let mut scored: Vec<Candidate> = state.slots[slot as usize].links[layer]
            .iter()
            .map(|&n| Candidate {
                distance: self.config.space.distance(&base, &state.slots[n as usize].vector),
                slot: n,
            })
            .collect();
        scored.sort();
        scored.truncate(cap);
        state.slots[slot as usize].links[layer] = scored.into_iter().map(|c| c.slot).collect();
    }

    /// Remove every edge touching a node, at all of its layers.
    fn detach(&self, state: &mut GraphState, slot: SlotId) {
        let layers = state.slots[slot as usize].links.len();
        for layer in 0..layers {
            let neighbors = std::mem::take(&mut state.slots[slot as usize].links[layer]);
            for neighbor in neighbors {
                state.slots[neighbor as usize].links[layer].retain(|&s| s != slot);
            }
        }
    }

    /// Rebuild an engine from a persisted snapshot.
    pub(crate) fn from_parts(
        config: HnswConfig,
        ef_search: usize,
        capacity: usize,
        entry_point: Option<SlotId>,
        max_layer: usize,
        slots: Vec<SlotNode>,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(entry) = entry_point {
            if entry as usize >= slots.len() {
                return Err(VicinityError::corrupted("entry point out of range"));
            }
        }
        if capacity < slots.len() {
            return Err(VicinityError::corrupted("capacity below stored count"));
        }

        let registry = LabelRegistry::new();
        let mut deleted = 0;
        for (slot, node) in slots.iter().enumerate() {
            if node.deleted {
                deleted += 1;
            }
            if node.links.is_empty() || node.links.len() > max_layer + 1 {
                return Err(VicinityError::corrupted(format!(
                    "slot {slot} occupies layers inconsistent with max layer {max_layer}"
                )));
            }
            // A CRC-valid image can still be logically inconsistent; a
            // dangling link target would panic at query time otherwise.
            for layer in &node.links {
                if layer.iter().any(|&target| target as usize >= slots.len()) {
                    return Err(VicinityError::corrupted(format!(
                        "slot {slot} links outside the stored {} slots",
                        slots.len()
                    )));
                }
            }
            if registry.insert(node.label, slot as SlotId).is_some() {
                return Err(VicinityError::corrupted(format!(
                    "duplicate label {} in image",
                    node.label
                )));
            }
        }
        if !slots.is_empty() {
            let highest = slots.iter().map(|n| n.links.len() - 1).max().unwrap_or(0);
            if highest != max_layer {
                return Err(VicinityError::corrupted(format!(
                    "max layer {max_layer} does not match highest stored layer {highest}"
                )));
            }
        }

        let state = GraphState {
            slots,
            capacity,
            entry_point,
            max_layer,
            deleted,
        };

        Ok(Self {
            level_mult: 1.0 / (config.m as f64).ln(),
            ef_search: AtomicUsize::new(ef_search),
            registry,
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config,
            state: RwLock::new(state),
        })
    }

    /// Read access to the graph state for snapshotting.
    pub(crate) fn state(&self) -> &RwLock<GraphState> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::SpaceKind;

    fn small_engine(capacity: usize) -> HnswEngine {
        HnswEngine::new(
            HnswConfig::new(2, capacity)
                .with_m(4)
                .with_ef_construction(16),
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_count() {
        let engine = small_engine(10);
        engine.insert(&[1.0, 0.0], 1).unwrap();
        engine.insert(&[0.0, 1.0], 2).unwrap();
        assert_eq!(engine.count(), 2);
        assert_eq!(engine.registry().len(), 2);
        assert_eq!(engine.deleted_count(), 0);
    }

    #[test]
    fn test_capacity_exhausted() {
        let engine = small_engine(2);
        engine.insert(&[1.0, 0.0], 1).unwrap();
        engine.insert(&[0.0, 1.0], 2).unwrap();

        let err = engine.insert(&[1.0, 1.0], 3).unwrap_err();
        assert!(matches!(
            err,
            VicinityError::CapacityExhausted { capacity: 2 }
        ));
        assert_eq!(engine.count(), 2);
    }

    #[test]
    fn test_insert_existing_label_updates_in_place() {
        let engine = small_engine(2);
        engine.insert(&[1.0, 0.0], 1).unwrap();
        engine.insert(&[0.0, 1.0], 2).unwrap();

        // Full index, but re-adding a known label refreshes it in place.
        engine.insert(&[5.0, 5.0], 1).unwrap();
        assert_eq!(engine.count(), 2);

        let slot = engine.registry().get(1).unwrap();
        assert_eq!(engine.vector_for(slot).unwrap(), vec![5.0, 5.0]);
    }

    #[test]
    fn test_search_empty_index_fails() {
        let engine = small_engine(4);
        assert!(engine.knn_search(&[1.0, 0.0], 3).is_err());
    }

    #[test]
    fn test_search_heap_is_descending() {
        let engine = small_engine(10);
        engine.insert(&[0.0, 0.0], 1).unwrap();
        engine.insert(&[1.0, 0.0], 2).unwrap();
        engine.insert(&[2.0, 0.0], 3).unwrap();

        let mut heap = engine.knn_search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(heap.len(), 3);

        // Max-heap: farthest pops first.
        let mut previous = f32::INFINITY;
        while let Some(neighbor) = heap.pop() {
            assert!(neighbor.distance <= previous);
            previous = neighbor.distance;
        }
    }

    #[test]
    fn test_search_excludes_tombstoned() {
        let engine = small_engine(10);
        engine.insert(&[0.0, 0.0], 1).unwrap();
        engine.insert(&[1.0, 0.0], 2).unwrap();
        engine.mark_deleted(1).unwrap();

        let heap = engine.knn_search(&[0.0, 0.0], 2).unwrap();
        let labels: Vec<Label> = heap.iter().map(|n| n.label).collect();
        assert_eq!(labels, vec![2]);
    }

    #[test]
    fn test_mark_unmark_idempotent() {
        let engine = small_engine(4);
        engine.insert(&[1.0, 0.0], 1).unwrap();

        engine.mark_deleted(1).unwrap();
        assert_eq!(engine.deleted_count(), 1);
        engine.mark_deleted(1).unwrap();
        assert_eq!(engine.deleted_count(), 1);

        engine.unmark_deleted(1).unwrap();
        assert_eq!(engine.deleted_count(), 0);
        engine.unmark_deleted(1).unwrap();
        assert_eq!(engine.deleted_count(), 0);
    }

    #[test]
    fn test_mark_unknown_label_fails() {
        let engine = small_engine(4);
        assert!(matches!(
            engine.mark_deleted(99).unwrap_err(),
            VicinityError::UnknownLabel(99)
        ));
        assert!(matches!(
            engine.unmark_deleted(99).unwrap_err(),
            VicinityError::UnknownLabel(99)
        ));
    }

    #[test]
    fn test_resize_guard() {
        let engine = small_engine(4);
        engine.insert(&[1.0, 0.0], 1).unwrap();
        engine.insert(&[0.0, 1.0], 2).unwrap();

        let err = engine.resize(1).unwrap_err();
        assert!(matches!(
            err,
            VicinityError::ResizeTooSmall {
                requested: 1,
                current: 2
            }
        ));
        assert_eq!(engine.capacity(), 4);

        engine.resize(8).unwrap();
        assert_eq!(engine.capacity(), 8);
    }

    #[test]
    fn test_update_relinks_and_searches() {
        let engine = small_engine(10);
        engine.insert(&[0.0, 0.0], 1).unwrap();
        engine.insert(&[10.0, 10.0], 2).unwrap();
        engine.insert(&[5.0, 5.0], 3).unwrap();

        let slot = engine.registry().get(3).unwrap();
        engine.update_in_place(&[100.0, 100.0], slot, 1.0).unwrap();

        assert_eq!(engine.vector_for(slot).unwrap(), vec![100.0, 100.0]);
        let heap = engine.knn_search(&[100.0, 100.0], 1).unwrap();
        let top = heap.peek().unwrap();
        assert_eq!(top.label, 3);
        assert_eq!(top.distance, 0.0);
    }

    #[test]
    fn test_cosine_space_normalizes_on_insert() {
        let engine = HnswEngine::new(
            HnswConfig::new(2, 10)
                .with_m(4)
                .with_ef_construction(16)
                .with_space(SpaceKind::Cosine),
        )
        .unwrap();
        engine.insert(&[3.0, 4.0], 1).unwrap();

        let slot = engine.registry().get(1).unwrap();
        let stored = engine.vector_for(slot).unwrap();
        let norm: f32 = stored.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ef_search_is_mutable() {
        let engine = small_engine(4);
        assert_eq!(engine.ef_search(), 50);
        engine.set_ef_search(128);
        assert_eq!(engine.ef_search(), 128);
    }

    #[test]
    fn test_racing_inserts_of_one_label_bind_one_slot() {
        use std::sync::{Arc, Barrier};

        let engine = Arc::new(small_engine(100));
        for round in 0..20u64 {
            let barrier = Arc::new(Barrier::new(2));
            let threads: Vec<_> = (0..2)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        let vector = [round as f32, t as f32];
                        barrier.wait();
                        engine.insert(&vector, round).unwrap();
                    })
                })
                .collect();
            for handle in threads {
                handle.join().unwrap();
            }

            // Both threads add the same fresh label; exactly one slot
            // may come out of it, whichever vector won.
            assert_eq!(engine.count(), round as usize + 1);
            assert_eq!(engine.registry().len(), round as usize + 1);
        }
    }

    fn snapshot_node(links: Vec<Vec<SlotId>>) -> SlotNode {
        SlotNode {
            label: 1,
            vector: vec![0.0, 0.0],
            deleted: false,
            links,
        }
    }

    #[test]
    fn test_from_parts_rejects_dangling_link_target() {
        let config = HnswConfig::new(2, 10).with_m(4).with_ef_construction(16);
        let slots = vec![snapshot_node(vec![vec![5]])];
        let err = HnswEngine::from_parts(config, 16, 10, Some(0), 0, slots).unwrap_err();
        assert!(matches!(err, VicinityError::Corrupted(_)));
    }

    #[test]
    fn test_from_parts_rejects_layer_above_max_layer() {
        let config = HnswConfig::new(2, 10).with_m(4).with_ef_construction(16);
        let slots = vec![snapshot_node(vec![Vec::new(); 3])];
        let err = HnswEngine::from_parts(config, 16, 10, Some(0), 0, slots).unwrap_err();
        assert!(matches!(err, VicinityError::Corrupted(_)));
    }

    #[test]
    fn test_from_parts_rejects_overstated_max_layer() {
        let config = HnswConfig::new(2, 10).with_m(4).with_ef_construction(16);
        let slots = vec![snapshot_node(vec![Vec::new()])];
        let err = HnswEngine::from_parts(config, 16, 10, Some(0), 2, slots).unwrap_err();
        assert!(matches!(err, VicinityError::Corrupted(_)));
    }
}
