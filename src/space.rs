//! Vector space selection and distance kernels.
//!
//! The facade picks a space once at creation time and hands it to the graph
//! engine. Distances are kept raw: squared Euclidean (no square root) and
//! negative inner product, so that "smaller is closer" holds uniformly and
//! an exact match scores 0.0 in the Euclidean space.

use serde::{Deserialize, Serialize};

/// The vector space an index measures distances in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpaceKind {
    /// Squared Euclidean (L2) distance.
    #[default]
    Euclidean,
    /// Negative inner product (higher dot product is closer).
    InnerProduct,
    /// Inner product over unit-normalized vectors.
    Cosine,
}

impl SpaceKind {
    /// Select a space from the single-character engine flag.
    ///
    /// `'i'` selects the inner-product space; any other flag silently falls
    /// back to squared L2. There is no error path by contract.
    pub fn from_flag(flag: char) -> Self {
        if flag == 'i' {
            SpaceKind::InnerProduct
        } else {
            SpaceKind::Euclidean
        }
    }

    /// Parse a space from its string name.
    ///
    /// `"ip"` is inner product, `"cosine"` is inner product with vector
    /// normalization, anything else falls back to squared L2.
    pub fn parse_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ip" => SpaceKind::InnerProduct,
            "cosine" => SpaceKind::Cosine,
            _ => SpaceKind::Euclidean,
        }
    }

    /// The single-character engine flag for this space.
    ///
    /// Cosine shares the inner-product flag; normalization is layered on
    /// top of the same kernel.
    pub fn flag(&self) -> char {
        match self {
            SpaceKind::Euclidean => 'l',
            SpaceKind::InnerProduct | SpaceKind::Cosine => 'i',
        }
    }

    /// Whether vectors must be unit-normalized before storage and search.
    pub fn normalizes(&self) -> bool {
        matches!(self, SpaceKind::Cosine)
    }

    /// Distance between two vectors of equal dimensionality.
    ///
    /// Dimensionality is a caller contract and is not validated here; the
    /// shorter slice bounds the computation.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SpaceKind::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
            SpaceKind::InnerProduct | SpaceKind::Cosine => {
                -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
            }
        }
    }

    /// Get the name of this space.
    pub fn name(&self) -> &'static str {
        match self {
            SpaceKind::Euclidean => "l2",
            SpaceKind::InnerProduct => "ip",
            SpaceKind::Cosine => "cosine",
        }
    }
}

/// Scale a vector to unit length in place.
///
/// Zero vectors are left near-zero rather than producing NaN thanks to the
/// epsilon in the divisor.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    let scale = 1.0 / (norm + 1e-15);
    for component in vector.iter_mut() {
        *component *= scale;
    }
}
