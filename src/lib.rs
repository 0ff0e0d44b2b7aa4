//! # Vicinity
//!
//! A mutable, concurrently-updatable approximate-nearest-neighbor (ANN)
//! index behind a small, handle-based facade.
//!
//! ## Features
//!
//! - HNSW graph index with squared-L2, inner-product, and cosine spaces
//! - Caller-assigned 64-bit labels with tombstone delete / undelete
//! - In-place vector updates with full neighborhood relinking
//! - Capacity resizing guarded against truncating live data
//! - Checksummed full-snapshot persistence
//! - Opaque process-wide handles for cross-boundary callers
//!
//! ## Example
//!
//! ```
//! use vicinity::{AnnIndex, HnswConfig};
//!
//! let index = AnnIndex::create(HnswConfig::new(4, 100)).unwrap();
//! index.add(&[1.0, 2.0, 3.0, 4.0], 7).unwrap();
//! let hits = index.search(&[1.0, 2.0, 3.0, 4.0], 1);
//! assert_eq!(hits.labels, vec![7]);
//! ```

pub mod engine;
pub mod error;
pub mod handle;
pub mod index;
pub mod marshal;
pub mod registry;
pub mod space;

pub use engine::{HnswConfig, HnswEngine, Neighbor};
pub use error::{Result, VicinityError};
pub use handle::{HandleTable, IndexHandle, handles};
pub use index::AnnIndex;
pub use marshal::SearchHits;
pub use registry::{Label, LabelRegistry, SlotId};
pub use space::SpaceKind;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
