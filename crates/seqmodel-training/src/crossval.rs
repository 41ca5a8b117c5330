//! Stratified k-fold cross-validation.
//!
//! Folds are stratified by label and dealt deterministically from a seeded
//! shuffle, so identical inputs and configuration always produce identical
//! folds. Per-fold fits are independent and run in parallel; the report is
//! aggregated by fold index, never by completion order.

use crate::error::{TrainError, TrainResult};
use crate::metrics::{accuracy, auroc, mean_std};
use crate::optimize::{OptimizationConfig, OptimizationRun};
use crate::predict::Predictor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use seqmodel_core::{FeatureExtractor, Label, SequenceSet};
use std::fmt;
use tracing::info;

/// Held-out metrics of one fold.
#[derive(Debug, Clone)]
pub struct FoldMetrics {
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub accuracy: f64,
    pub auroc: f64,
}

/// Per-fold and aggregate metrics. Emitted to standard output, never
/// persisted as a file.
#[derive(Debug, Clone)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldMetrics>,
}

impl CrossValidationReport {
    #[must_use]
    pub fn accuracy_mean_std(&self) -> (f64, f64) {
        mean_std(&self.folds.iter().map(|f| f.accuracy).collect::<Vec<_>>())
    }

    #[must_use]
    pub fn auroc_mean_std(&self) -> (f64, f64) {
        mean_std(&self.folds.iter().map(|f| f.auroc).collect::<Vec<_>>())
    }
}

impl fmt::Display for CrossValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = self.folds.len();
        for m in &self.folds {
            writeln!(
                f,
                "fold {:>2}/{k}: accuracy {:.3}, AUROC {:.3} (train {}, test {})",
                m.fold + 1,
                m.accuracy,
                m.auroc,
                m.train_size,
                m.test_size
            )?;
        }
        let (acc_mean, acc_std) = self.accuracy_mean_std();
        let (auc_mean, auc_std) = self.auroc_mean_std();
        write!(
            f,
            "cross-validation ({k} folds): accuracy {acc_mean:.3} \u{b1} {acc_std:.3}, \
             AUROC {auc_mean:.3} \u{b1} {auc_std:.3}"
        )
    }
}

pub struct CrossValidator {
    folds: usize,
}

impl CrossValidator {
    #[must_use]
    pub fn new(folds: usize) -> Self {
        Self { folds }
    }

    /// Hold out each fold in turn, fit on the remainder, score the held-out
    /// records. Any fold failure aborts the whole run; there is no partial
    /// report.
    pub fn run<F: FeatureExtractor + Clone + Sync>(
        &self,
        set: &SequenceSet,
        example_weights: &[f64],
        config: &OptimizationConfig,
        extractor: &F,
    ) -> TrainResult<CrossValidationReport> {
        if self.folds < 2 {
            return Err(TrainError::InvalidInput(format!(
                "cross-validation requires at least 2 folds, got {}",
                self.folds
            )));
        }

        let pos = set.indices_of(Label::Positive);
        let neg = set.indices_of(Label::Negative);
        if pos.len() < 2 || neg.len() < 2 {
            return Err(TrainError::InvalidInput(format!(
                "dataset too small to stratify: {} positive / {} negative records \
                 (need at least 2 of each)",
                pos.len(),
                neg.len()
            )));
        }

        // both classes have at least 2 records here, so k stays >= 2
        let k = self.folds.min(pos.len()).min(neg.len());

        // whole-batch feature extraction, shared across folds
        let features: Vec<Vec<f64>> = set
            .records()
            .iter()
            .map(|r| extractor.extract(&r.id, &r.sequence))
            .collect::<Result<_, _>>()
            .map_err(|e| TrainError::InvalidInput(e.to_string()))?;
        let labels: Vec<f64> = set.records().iter().map(|r| r.label.signed()).collect();

        // deterministic stratified assignment: seeded shuffle per class,
        // then deal round-robin into folds
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut pos = pos;
        let mut neg = neg;
        pos.shuffle(&mut rng);
        neg.shuffle(&mut rng);

        let mut fold_of = vec![0usize; set.len()];
        for (i, &idx) in pos.iter().enumerate() {
            fold_of[idx] = i % k;
        }
        for (i, &idx) in neg.iter().enumerate() {
            fold_of[idx] = i % k;
        }

        info!(folds = k, n = set.len(), "starting cross-validation");

        let folds: Vec<FoldMetrics> = (0..k)
            .into_par_iter()
            .map(|fold| {
                let (mut train_f, mut train_y, mut train_w) = (Vec::new(), Vec::new(), Vec::new());
                let (mut test_f, mut test_y) = (Vec::new(), Vec::new());
                for i in 0..set.len() {
                    if fold_of[i] == fold {
                        test_f.push(features[i].clone());
                        test_y.push(labels[i]);
                    } else {
                        train_f.push(features[i].clone());
                        train_y.push(labels[i]);
                        train_w.push(example_weights[i]);
                    }
                }

                let model = OptimizationRun::new(config).run(&train_f, &train_y, &train_w)?;
                let predictor = Predictor::from_model(model, extractor.clone());
                let scores = predictor.score_rows(&test_f);

                let metrics = FoldMetrics {
                    fold,
                    train_size: train_y.len(),
                    test_size: test_y.len(),
                    accuracy: accuracy(&scores, &test_y),
                    auroc: auroc(&scores, &test_y),
                };
                info!(
                    fold = fold + 1,
                    accuracy = metrics.accuracy,
                    auroc = metrics.auroc,
                    "fold complete"
                );
                Ok(metrics)
            })
            .collect::<TrainResult<Vec<_>>>()?;

        Ok(CrossValidationReport { folds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqmodel_core::KmerFeatureExtractor;
    use std::io::Write;
    use tempfile::TempDir;

    fn labeled_set(pos: &[&str], neg: &[&str]) -> SequenceSet {
        let dir = TempDir::new().unwrap();
        let write = |name: &str, seqs: &[&str]| {
            let path = dir.path().join(name);
            let mut f = std::fs::File::create(&path).unwrap();
            for (i, s) in seqs.iter().enumerate() {
                writeln!(f, ">{name}_{i}\n{s}").unwrap();
            }
            path
        };
        let p = write("pos", pos);
        let n = write("neg", neg);
        SequenceSet::merged(
            SequenceSet::from_fasta(&p, Label::Positive).unwrap(),
            SequenceSet::from_fasta(&n, Label::Negative).unwrap(),
        )
    }

    fn separable_set() -> SequenceSet {
        labeled_set(
            &["GGGGGGGGAAAA", "GGGGGGGGACAA", "GGGGGGGGAGAA", "GGGGGGGGATAA"],
            &["TTTTTTTTCCCC", "TTTTTTTTCACC", "TTTTTTTTCGCC", "TTTTTTTTCTCC"],
        )
    }

    fn config() -> OptimizationConfig {
        OptimizationConfig { n_iter: 1, n_inner_iter_estimator: 4, ..Default::default() }
    }

    #[test]
    fn test_cross_validation_on_separable_data() {
        let set = separable_set();
        let extractor = KmerFeatureExtractor::new(4, 256);
        let weights = vec![1.0; set.len()];

        let report = CrossValidator::new(2)
            .run(&set, &weights, &config(), &extractor)
            .unwrap();

        assert_eq!(report.folds.len(), 2);
        let (acc, _) = report.accuracy_mean_std();
        assert!(acc > 0.5, "separable data should beat chance, got {acc}");
    }

    #[test]
    fn test_folds_are_deterministic() {
        let set = separable_set();
        let extractor = KmerFeatureExtractor::new(4, 256);
        let weights = vec![1.0; set.len()];

        let a = CrossValidator::new(2).run(&set, &weights, &config(), &extractor).unwrap();
        let b = CrossValidator::new(2).run(&set, &weights, &config(), &extractor).unwrap();
        for (x, y) in a.folds.iter().zip(&b.folds) {
            assert_eq!(x.accuracy, y.accuracy);
            assert_eq!(x.auroc, y.auroc);
            assert_eq!(x.test_size, y.test_size);
        }
    }

    #[test]
    fn test_unstratifiable_dataset_is_invalid_input() {
        let set = labeled_set(&["GGGGGGGG"], &["TTTTTTTT", "TTTTTTTA"]);
        let extractor = KmerFeatureExtractor::new(4, 64);
        let weights = vec![1.0; set.len()];

        let err = CrossValidator::new(2)
            .run(&set, &weights, &config(), &extractor)
            .unwrap_err();
        assert!(matches!(err, TrainError::InvalidInput(_)));
    }

    #[test]
    fn test_fewer_than_two_folds_is_invalid_input() {
        let set = separable_set();
        let extractor = KmerFeatureExtractor::new(4, 256);
        let weights = vec![1.0; set.len()];

        for folds in [0, 1] {
            let err = CrossValidator::new(folds)
                .run(&set, &weights, &config(), &extractor)
                .unwrap_err();
            assert!(matches!(err, TrainError::InvalidInput(_)), "folds = {folds}");
        }
    }

    #[test]
    fn test_fold_count_capped_by_class_size() {
        let set = separable_set(); // 4 + 4 records
        let extractor = KmerFeatureExtractor::new(4, 256);
        let weights = vec![1.0; set.len()];

        let report = CrossValidator::new(10)
            .run(&set, &weights, &config(), &extractor)
            .unwrap();
        assert_eq!(report.folds.len(), 4);
    }

    #[test]
    fn test_report_display_mentions_aggregate() {
        let report = CrossValidationReport {
            folds: vec![
                FoldMetrics { fold: 0, train_size: 6, test_size: 2, accuracy: 1.0, auroc: 1.0 },
                FoldMetrics { fold: 1, train_size: 6, test_size: 2, accuracy: 0.5, auroc: 0.5 },
            ],
        };
        let text = report.to_string();
        assert!(text.contains("fold  1/2"));
        assert!(text.contains("cross-validation (2 folds)"));
        assert!(text.contains("0.750"));
    }
}
