//! Marshaling of engine search results into caller-visible form.
//!
//! The engine hands back a max-heap ordered by descending distance; callers
//! get a pair of parallel arrays in ascending distance order, closest
//! neighbor first. The conversion drains the heap back-to-front.

use std::collections::BinaryHeap;

use crate::engine::Neighbor;
use crate::registry::Label;

/// Search results as parallel label/distance arrays, ascending by distance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    /// Labels of the matched vectors, closest first.
    pub labels: Vec<Label>,
    /// Distances in the index's space, non-decreasing.
    pub distances: Vec<f32>,
}

impl SearchHits {
    /// Number of results.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the search matched nothing.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over `(label, distance)` pairs, closest first.
    pub fn iter(&self) -> impl Iterator<Item = (Label, f32)> + '_ {
        self.labels.iter().copied().zip(self.distances.iter().copied())
    }
}

/// Drain a descending-distance max-heap into ascending-order hits.
pub fn into_ascending(mut heap: BinaryHeap<Neighbor>) -> SearchHits {
    let n = heap.len();
    let mut labels = vec![0; n];
    let mut distances = vec![0.0; n];

    // The farthest result pops first and lands in the last cell.
    let mut i = n;
    while let Some(Neighbor { distance, label }) = heap.pop() {
        i -= 1;
        labels[i] = label;
        distances[i] = distance;
    }

    SearchHits { labels, distances }
}
