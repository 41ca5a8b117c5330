//! Prior-based example reweighting.
//!
//! When a k-mer prior table is supplied, every training example gets a weight
//! derived from the priors of its k-mers: frequent (high-prior) content is
//! down-weighted, and the weight shrinks further as `kmer_weight` grows. With
//! no table, every weight is 1.0.

use crate::error::{TrainError, TrainResult};
use seqmodel_core::{KmerPriorTable, SequenceSet};
use tracing::debug;

/// How the priors of a record's (possibly overlapping) k-mers combine into a
/// single per-record prior mass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorCombine {
    /// Arithmetic mean over all k-mer priors (default).
    #[default]
    Mean,
    /// Minimum prior: the rarest k-mer dominates.
    Min,
    /// Maximum prior: the most common k-mer dominates.
    Max,
}

impl PriorCombine {
    fn combine(self, priors: impl Iterator<Item = f64>) -> Option<f64> {
        match self {
            Self::Mean => {
                let (sum, n) = priors.fold((0.0, 0usize), |(s, n), p| (s + p, n + 1));
                (n > 0).then(|| sum / n as f64)
            }
            Self::Min => priors.fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.min(p)))),
            Self::Max => priors.fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.max(p)))),
        }
    }
}

/// One non-negative weight per record: `max(0, 1 - kmer_weight * prior)`.
///
/// Weights are recomputed fresh for every run and never persisted. A weight
/// vector that is zero across the whole dataset is a degenerate training set
/// and fails fast, before any optimizer work.
pub fn compute_weights(
    set: &SequenceSet,
    priors: Option<&KmerPriorTable>,
    kmer_weight: f64,
    combine: PriorCombine,
) -> TrainResult<Vec<f64>> {
    let Some(table) = priors else {
        return Ok(vec![1.0; set.len()]);
    };

    if kmer_weight < 0.0 {
        return Err(TrainError::InvalidInput(format!(
            "kmer-weight must be non-negative, got {kmer_weight}"
        )));
    }

    let k = table.k();
    let weights: Vec<f64> = set
        .records()
        .iter()
        .map(|rec| {
            let prior = combine
                .combine(rec.sequence.as_bytes().windows(k).map(|w| {
                    table.get(std::str::from_utf8(w).unwrap_or_default())
                }))
                // a record shorter than k carries no k-mer evidence
                .unwrap_or_else(|| table.min_prior());
            (1.0 - kmer_weight * prior).max(0.0)
        })
        .collect();

    if weights.iter().all(|w| *w == 0.0) {
        return Err(TrainError::InvalidInput(format!(
            "prior reweighting produced all-zero example weights \
             (kmer-weight {kmer_weight} too large for this prior table)"
        )));
    }

    debug!(
        n = weights.len(),
        zero = weights.iter().filter(|w| **w == 0.0).count(),
        "computed prior-based example weights"
    );
    Ok(weights)
}
