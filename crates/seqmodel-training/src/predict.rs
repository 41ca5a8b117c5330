//! Batch scoring of sequences with a loaded model artifact.

use crate::artifact::ModelArtifact;
use crate::error::{TrainError, TrainResult};
use crate::optimize::FittedModel;
use seqmodel_core::{FeatureExtractor, KmerFeatureExtractor, SequenceSet};
use std::io::Write;
use tracing::debug;

/// Fixed output filename; external tooling keys off this name.
pub const PREDICTIONS_FILENAME: &str = "predictions.txt";

/// One scored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub id: String,
    pub score: f64,
    /// Thresholded class: +1 for score > 0, otherwise -1.
    pub label: i8,
}

pub struct Predictor<E: FeatureExtractor = KmerFeatureExtractor> {
    model: FittedModel,
    extractor: E,
}

impl Predictor<KmerFeatureExtractor> {
    #[must_use]
    pub fn from_artifact(artifact: &ModelArtifact) -> Self {
        Self { model: artifact.model(), extractor: artifact.feature_params.clone() }
    }
}

impl<E: FeatureExtractor> Predictor<E> {
    #[must_use]
    pub fn from_model(model: FittedModel, extractor: E) -> Self {
        Self { model, extractor }
    }

    /// Score every record, in input order.
    ///
    /// Failure policy: if feature extraction fails for any record (for
    /// example a sequence shorter than k), the whole batch fails and no
    /// partial result is returned. This is deterministic for identical
    /// input.
    pub fn score_set(&self, set: &SequenceSet) -> TrainResult<Vec<Prediction>> {
        let mut predictions = Vec::with_capacity(set.len());
        for rec in set.records() {
            let features = self
                .extractor
                .extract(&rec.id, &rec.sequence)
                .map_err(|e| TrainError::InvalidInput(e.to_string()))?;
            let score = self.model.score(&features);
            predictions.push(Prediction {
                id: rec.id.clone(),
                score,
                label: if score > 0.0 { 1 } else { -1 },
            });
        }
        debug!(count = predictions.len(), "scored prediction batch");
        Ok(predictions)
    }

    /// Raw decision values over pre-extracted feature rows, in input order.
    /// Used by cross-validation, which extracts features once up front and
    /// shares the rows across folds.
    #[must_use]
    pub fn score_rows(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.model.score(r)).collect()
    }
}

/// Write predictions as `id<TAB>score<TAB>label`, one line per record.
pub fn write_predictions<W: Write>(out: &mut W, predictions: &[Prediction]) -> TrainResult<()> {
    for p in predictions {
        writeln!(out, "{}\t{:.6}\t{}", p.id, p.score, p.label)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqmodel_core::Label;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn set_of(entries: &[(&str, &str)]) -> SequenceSet {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.fa");
        let mut f = std::fs::File::create(&path).unwrap();
        for (id, seq) in entries {
            writeln!(f, ">{id}\n{seq}").unwrap();
        }
        SequenceSet::from_fasta(&path, Label::Positive).unwrap()
    }

    fn predictor() -> Predictor {
        let extractor = KmerFeatureExtractor::new(2, 16);
        let model = FittedModel { weights: vec![0.1; 16], bias: -0.05 };
        Predictor::from_model(model, extractor)
    }

    #[test]
    fn test_predictions_preserve_input_order() {
        let set = set_of(&[("z_last", "ACGTACGT"), ("a_first", "GGGGCCCC")]);
        let preds = predictor().score_set(&set).unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].id, "z_last");
        assert_eq!(preds[1].id, "a_first");
    }

    #[test]
    fn test_short_record_fails_whole_batch() {
        let set = set_of(&[("ok", "ACGTACGT"), ("tiny", "A")]);
        let err = predictor().score_set(&set).unwrap_err();
        assert!(matches!(err, TrainError::InvalidInput(_)));
        assert!(err.to_string().contains("tiny"));
    }

    #[test]
    fn test_score_rows_matches_score_set() {
        let set = set_of(&[("a", "ACGTACGT"), ("b", "GGGGCCCC")]);
        let p = predictor();
        let extractor = KmerFeatureExtractor::new(2, 16);
        let rows: Vec<Vec<f64>> = set
            .records()
            .iter()
            .map(|r| extractor.extract(&r.id, &r.sequence).unwrap())
            .collect();

        let from_rows = p.score_rows(&rows);
        let from_set: Vec<f64> = p.score_set(&set).unwrap().into_iter().map(|x| x.score).collect();
        assert_eq!(from_rows, from_set);
    }

    #[test]
    fn test_write_predictions_format() {
        let preds = vec![
            Prediction { id: "a".to_string(), score: 1.25, label: 1 },
            Prediction { id: "b".to_string(), score: -0.5, label: -1 },
        ];
        let mut buf = Vec::new();
        write_predictions(&mut buf, &preds).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "a\t1.250000\t1\nb\t-0.500000\t-1\n");
    }

    #[test]
    fn test_label_thresholded_at_zero() {
        let set = set_of(&[("x", "ACGTACGT")]);
        let extractor = KmerFeatureExtractor::new(2, 16);
        let zero = Predictor::from_model(
            FittedModel { weights: vec![0.0; 16], bias: 0.0 },
            extractor,
        );
        let preds = zero.score_set(&set).unwrap();
        assert_eq!(preds[0].label, -1, "zero score counts as negative");
    }
}
