//! The graph engine behind the facade.
//!
//! Owns the HNSW graph, the label registry, and the persisted image format.
//! The facade talks to this module only through [`HnswEngine`]'s interface
//! and never inspects graph internals.

pub mod config;
pub mod graph;
pub mod persist;

pub use config::HnswConfig;
pub use graph::{HnswEngine, Neighbor};
