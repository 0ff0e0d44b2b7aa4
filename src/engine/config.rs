//! Configuration for HNSW graph construction and search.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VicinityError};
use crate::space::SpaceKind;

/// Configuration for an HNSW index.
///
/// Everything here is fixed at creation time except `ef_search`, which
/// stays mutable on the live engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Vector dimensionality, fixed for the index lifetime.
    pub dimension: usize,
    /// Maximum number of elements the index can hold before a resize.
    pub capacity: usize,
    /// Maximum number of neighbor edges per node per layer.
    pub m: usize,
    /// Size of the candidate set during graph construction.
    pub ef_construction: usize,
    /// Initial size of the candidate set during search.
    pub ef_search: usize,
    /// Random seed for reproducible layer assignment.
    pub seed: u64,
    /// Vector space to measure distances in.
    pub space: SpaceKind,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: 128,
            capacity: 1_000,
            m: 16,                // Typical value for good performance
            ef_construction: 200, // Higher values improve quality but slow construction
            ef_search: 50,        // Can be adjusted later via set_ef
            seed: 42,
            space: SpaceKind::Euclidean,
        }
    }
}

impl HnswConfig {
    /// Create a configuration with the given dimension and capacity.
    pub fn new(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            capacity,
            ..Default::default()
        }
    }

    /// Set the M parameter (neighbor edges per node per layer).
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    /// Set the ef_construction parameter.
    pub fn with_ef_construction(mut self, ef_construction: usize) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    /// Set the initial ef_search parameter.
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the vector space.
    pub fn with_space(mut self, space: SpaceKind) -> Self {
        self.space = space;
        self
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VicinityError::config("dimension must be > 0"));
        }
        if self.capacity == 0 {
            return Err(VicinityError::config("capacity must be > 0"));
        }
        if self.m < 2 {
            return Err(VicinityError::config("m must be >= 2"));
        }
        if self.ef_construction < self.m {
            return Err(VicinityError::config("ef_construction must be >= m"));
        }
        Ok(())
    }
}
