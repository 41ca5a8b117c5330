//! Feature extraction: sequence -> dense numeric vector.
//!
//! The optimization core only depends on the `FeatureExtractor` trait, so the
//! k-mer backend below can be swapped for a graph-kernel backend without
//! touching the training code.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Capability boundary between the sequence layer and the optimizer.
pub trait FeatureExtractor {
    /// Map a sequence to a fixed-dimensional feature vector.
    fn extract(&self, id: &str, sequence: &str) -> CoreResult<Vec<f64>>;

    /// Dimensionality of the vectors produced by `extract`.
    fn dims(&self) -> usize;
}

/// Hashed k-mer count features.
///
/// Slides a window of length `k` over the sequence, hashes each k-mer with
/// FNV-1a into one of `dims` buckets and L2-normalizes the resulting count
/// vector. Deterministic across runs and platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmerFeatureExtractor {
    pub k: usize,
    pub dims: usize,
}

impl Default for KmerFeatureExtractor {
    fn default() -> Self {
        Self { k: 4, dims: 1024 }
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

impl KmerFeatureExtractor {
    #[must_use]
    pub fn new(k: usize, dims: usize) -> Self {
        Self { k, dims }
    }
}

impl FeatureExtractor for KmerFeatureExtractor {
    fn extract(&self, id: &str, sequence: &str) -> CoreResult<Vec<f64>> {
        if sequence.len() < self.k {
            return Err(CoreError::Extraction {
                id: id.to_string(),
                reason: format!("sequence length {} is shorter than k={}", sequence.len(), self.k),
            });
        }

        let mut counts = vec![0.0_f64; self.dims];
        for window in sequence.as_bytes().windows(self.k) {
            let bucket = (fnv1a(window) % self.dims as u64) as usize;
            counts[bucket] += 1.0;
        }

        let norm = counts.iter().map(|c| c * c).sum::<f64>().sqrt();
        if norm > 0.0 {
            for c in &mut counts {
                *c /= norm;
            }
        }
        Ok(counts)
    }

    fn dims(&self) -> usize {
        self.dims
    }
}
