//! The outer/inner optimization loop.
//!
//! An `OptimizationRun` drives the weighted L2-SVM solver over a feature
//! matrix. The outer loop (`n_iter`) brackets the regularization strength;
//! each outer iteration the inner estimator (`n_inner_iter_estimator`) fits
//! one candidate per log-spaced lambda inside the current bracket and keeps
//! the best converged fit by balanced training accuracy. A run that cannot
//! produce a converged, better-than-chance fit within its budget fails with
//! `OptimizationFailed` and yields nothing.

use crate::error::{TrainError, TrainResult};
use crate::metrics::balanced_accuracy;
use crate::solver::{solve, SolverOptions, TrainingProblem};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Immutable per-invocation configuration. A snapshot of this structure is
/// embedded in every model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub n_iter: usize,
    pub n_inner_iter_estimator: usize,
    pub kmer_weight: f64,
    pub kmer_probs_path: Option<PathBuf>,
    pub kmer_len: usize,
    pub feature_dims: usize,
    pub seed: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_iter: 10,
            n_inner_iter_estimator: 10,
            kmer_weight: 1.0,
            kmer_probs_path: None,
            kmer_len: 4,
            feature_dims: 1024,
            seed: 1,
        }
    }
}

impl OptimizationConfig {
    pub fn validate(&self) -> TrainResult<()> {
        if self.n_iter == 0 {
            return Err(TrainError::InvalidInput("n-iter must be >= 1".to_string()));
        }
        if self.n_inner_iter_estimator == 0 {
            return Err(TrainError::InvalidInput(
                "n-inner-iter-estimator must be >= 1".to_string(),
            ));
        }
        if !self.kmer_weight.is_finite() || self.kmer_weight < 0.0 {
            return Err(TrainError::InvalidInput("kmer-weight must be >= 0".to_string()));
        }
        if self.kmer_len == 0 || self.feature_dims == 0 {
            return Err(TrainError::InvalidInput(
                "kmer length and feature dimensions must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A fitted linear model, in memory. Persistence is the controller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl FittedModel {
    /// Decision value `w·x + b` for one feature vector (no bias column).
    #[must_use]
    pub fn score(&self, features: &[f64]) -> f64 {
        self.weights.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + self.bias
    }
}

/// Regularization bracket in log10 space.
const LAMBDA_LOG_LO: f64 = -3.0;
const LAMBDA_LOG_HI: f64 = 3.0;

pub struct OptimizationRun<'a> {
    config: &'a OptimizationConfig,
}

impl<'a> OptimizationRun<'a> {
    #[must_use]
    pub fn new(config: &'a OptimizationConfig) -> Self {
        Self { config }
    }

    /// Fit a model over a feature matrix (no bias column), ±1 labels and
    /// per-example weights.
    pub fn run(
        &self,
        features: &[Vec<f64>],
        labels: &[f64],
        example_weights: &[f64],
    ) -> TrainResult<FittedModel> {
        self.config.validate()?;
        validate_inputs(features, labels, example_weights)?;

        let n_pos = labels.iter().filter(|y| **y > 0.0).count();
        let n_neg = labels.len() - n_pos;
        let m = labels.len() as f64;
        let (cost_pos, cost_neg) = (m / (2.0 * n_pos as f64), m / (2.0 * n_neg as f64));

        // dense rows with the bias input appended
        let dims = features[0].len();
        let rows: Vec<Vec<f64>> = features
            .iter()
            .map(|f| {
                let mut row = Vec::with_capacity(dims + 1);
                row.extend_from_slice(f);
                row.push(1.0);
                row
            })
            .collect();
        let costs: Vec<f64> = labels
            .iter()
            .zip(example_weights)
            .map(|(y, w)| if *y > 0.0 { cost_pos * w } else { cost_neg * w })
            .collect();
        let problem = TrainingProblem { rows, labels: labels.to_vec(), costs };

        let mut best: Option<(f64, f64, crate::solver::SolverOutcome)> = None; // (bacc, log_lambda, outcome)
        let (mut log_lo, mut log_hi) = (LAMBDA_LOG_LO, LAMBDA_LOG_HI);
        let inner = self.config.n_inner_iter_estimator;

        for outer in 0..self.config.n_iter {
            let step = if inner > 1 { (log_hi - log_lo) / (inner - 1) as f64 } else { 0.0 };
            let mut round_best_log = None;

            for j in 0..inner {
                let log_lambda = if inner > 1 {
                    log_lo + step * j as f64
                } else {
                    0.5 * (log_lo + log_hi)
                };
                let opts = SolverOptions {
                    lambda: 10f64.powf(log_lambda),
                    ..SolverOptions::default()
                };
                let outcome = solve(&problem, &opts);
                if !outcome.converged {
                    continue;
                }

                let bacc = balanced_accuracy(&outcome.outputs, labels);
                debug!(
                    outer = outer + 1,
                    lambda = opts.lambda,
                    balanced_accuracy = bacc,
                    iterations = outcome.iterations,
                    "inner estimator candidate"
                );
                if best.as_ref().map_or(true, |(b, _, _)| bacc > *b) {
                    round_best_log = Some(log_lambda);
                    best = Some((bacc, log_lambda, outcome));
                }
            }

            // zoom the bracket around the best candidate seen so far
            let center = round_best_log.or(best.as_ref().map(|(_, l, _)| *l));
            if let Some(center) = center {
                let half = if step > 0.0 { step } else { (log_hi - log_lo) / 4.0 };
                log_lo = center - half;
                log_hi = center + half;
            }
        }

        match best {
            Some((bacc, log_lambda, outcome)) if bacc > 0.5 => {
                info!(
                    balanced_accuracy = bacc,
                    lambda = 10f64.powf(log_lambda),
                    "optimization succeeded"
                );
                let (weights, bias) = split_bias(outcome.weights);
                Ok(FittedModel { weights, bias })
            }
            Some((bacc, _, _)) => Err(TrainError::OptimizationFailed(format!(
                "no separating solution within {} x {} iterations \
                 (best balanced training accuracy {bacc:.3} is not better than chance)",
                self.config.n_iter, self.config.n_inner_iter_estimator
            ))),
            None => Err(TrainError::OptimizationFailed(format!(
                "no candidate converged within {} x {} iterations",
                self.config.n_iter, self.config.n_inner_iter_estimator
            ))),
        }
    }
}

fn split_bias(mut weights: Vec<f64>) -> (Vec<f64>, f64) {
    let bias = weights.pop().unwrap_or(0.0);
    (weights, bias)
}

/// Degenerate datasets are input-validation failures, never solver failures.
fn validate_inputs(
    features: &[Vec<f64>],
    labels: &[f64],
    example_weights: &[f64],
) -> TrainResult<()> {
    if features.len() != labels.len() || features.len() != example_weights.len() {
        return Err(TrainError::InvalidInput(format!(
            "feature/label/weight lengths disagree: {} / {} / {}",
            features.len(),
            labels.len(),
            example_weights.len()
        )));
    }
    let n_pos = labels.iter().filter(|y| **y > 0.0).count();
    if n_pos == 0 || n_pos == labels.len() {
        return Err(TrainError::InvalidInput(
            "training set must contain both positive and negative examples".to_string(),
        ));
    }
    if example_weights.iter().all(|w| *w == 0.0) {
        return Err(TrainError::InvalidInput(
            "all example weights are zero".to_string(),
        ));
    }

    let dims = features[0].len();
    if dims == 0 || features.iter().any(|f| f.len() != dims) {
        return Err(TrainError::InvalidInput(
            "feature vectors must be non-empty and uniform in length".to_string(),
        ));
    }
    let has_variance = (0..dims).any(|j| {
        let first = features[0][j];
        features.iter().any(|f| (f[j] - first).abs() > 1e-12)
    });
    if !has_variance {
        return Err(TrainError::InvalidInput(
            "feature matrix has zero variance in every dimension".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(n_iter: usize, inner: usize) -> OptimizationConfig {
        OptimizationConfig { n_iter, n_inner_iter_estimator: inner, ..Default::default() }
    }

    fn separable() -> (Vec<Vec<f64>>, Vec<f64>) {
        (
            vec![
                vec![1.0, 0.9],
                vec![0.8, 1.1],
                vec![1.2, 0.8],
                vec![-1.0, -0.9],
                vec![-0.8, -1.1],
                vec![-1.2, -0.8],
            ],
            vec![1.0, 1.0, 1.0, -1.0, -1.0, -1.0],
        )
    }

    #[test]
    fn test_fit_separable_data() {
        let (features, labels) = separable();
        let cfg = config(2, 5);
        let model = OptimizationRun::new(&cfg)
            .run(&features, &labels, &vec![1.0; labels.len()])
            .unwrap();

        for (f, y) in features.iter().zip(&labels) {
            assert!(model.score(f) * y > 0.0, "training example misclassified");
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (features, labels) = separable();
        let cfg = config(2, 4);
        let w = vec![1.0; labels.len()];
        let a = OptimizationRun::new(&cfg).run(&features, &labels, &w).unwrap();
        let b = OptimizationRun::new(&cfg).run(&features, &labels, &w).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_contradictory_duplicates_fail_optimization() {
        // same rows under both labels: balanced accuracy is pinned at 0.5
        let features = vec![
            vec![1.0, 2.0],
            vec![3.0, 4.0],
            vec![1.0, 2.0],
            vec![3.0, 4.0],
        ];
        let labels = vec![1.0, 1.0, -1.0, -1.0];
        let cfg = config(2, 2);
        let err = OptimizationRun::new(&cfg)
            .run(&features, &labels, &vec![1.0; 4])
            .unwrap_err();
        assert!(matches!(err, TrainError::OptimizationFailed(_)));
    }

    #[test]
    fn test_single_class_is_invalid_input() {
        let features = vec![vec![1.0], vec![2.0]];
        let labels = vec![1.0, 1.0];
        let cfg = config(1, 1);
        let err = OptimizationRun::new(&cfg).run(&features, &labels, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, TrainError::InvalidInput(_)));
    }

    #[test]
    fn test_zero_variance_is_invalid_input() {
        let features = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        let labels = vec![1.0, -1.0];
        let cfg = config(1, 1);
        let err = OptimizationRun::new(&cfg).run(&features, &labels, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, TrainError::InvalidInput(_)));
    }

    #[test]
    fn test_all_zero_weights_is_invalid_input() {
        let (features, labels) = separable();
        let cfg = config(1, 1);
        let err = OptimizationRun::new(&cfg)
            .run(&features, &labels, &vec![0.0; labels.len()])
            .unwrap_err();
        assert!(matches!(err, TrainError::InvalidInput(_)));
    }

    #[test]
    fn test_config_validation() {
        assert!(config(0, 1).validate().is_err());
        assert!(config(1, 0).validate().is_err());
        let mut cfg = config(1, 1);
        cfg.kmer_weight = -1.0;
        assert!(cfg.validate().is_err());
    }
}
