//! Classification metrics shared by the optimizer and cross-validation.

/// Fraction of examples where the score sign matches the label sign.
/// A score of exactly zero counts as a negative prediction.
#[must_use]
pub fn accuracy(scores: &[f64], labels: &[f64]) -> f64 {
    debug_assert_eq!(scores.len(), labels.len());
    if scores.is_empty() {
        return 0.0;
    }
    let correct = scores
        .iter()
        .zip(labels)
        .filter(|(s, y)| (**s > 0.0) == (**y > 0.0))
        .count();
    correct as f64 / scores.len() as f64
}

/// Mean of per-class accuracies; robust to class imbalance. A class with no
/// examples contributes nothing.
#[must_use]
pub fn balanced_accuracy(scores: &[f64], labels: &[f64]) -> f64 {
    debug_assert_eq!(scores.len(), labels.len());
    let (mut pos_ok, mut pos_n, mut neg_ok, mut neg_n) = (0usize, 0usize, 0usize, 0usize);
    for (s, y) in scores.iter().zip(labels) {
        if *y > 0.0 {
            pos_n += 1;
            if *s > 0.0 {
                pos_ok += 1;
            }
        } else {
            neg_n += 1;
            if *s <= 0.0 {
                neg_ok += 1;
            }
        }
    }
    let mut acc = 0.0;
    let mut classes = 0;
    if pos_n > 0 {
        acc += pos_ok as f64 / pos_n as f64;
        classes += 1;
    }
    if neg_n > 0 {
        acc += neg_ok as f64 / neg_n as f64;
        classes += 1;
    }
    if classes == 0 { 0.0 } else { acc / classes as f64 }
}

/// Area under the ROC curve. Counting formulation: over all
/// (positive, negative) pairs, the fraction where the positive outscores the
/// negative, with ties counting half.
#[must_use]
pub fn auroc(scores: &[f64], labels: &[f64]) -> f64 {
    debug_assert_eq!(scores.len(), labels.len());
    let positives: Vec<f64> =
        scores.iter().zip(labels).filter(|(_, y)| **y > 0.0).map(|(s, _)| *s).collect();
    let negatives: Vec<f64> =
        scores.iter().zip(labels).filter(|(_, y)| **y <= 0.0).map(|(s, _)| *s).collect();

    if positives.is_empty() || negatives.is_empty() {
        return 0.5;
    }

    let mut wins = 0.0;
    for p in &positives {
        for n in &negatives {
            if p > n {
                wins += 1.0;
            } else if (p - n).abs() < f64::EPSILON {
                wins += 0.5;
            }
        }
    }
    wins / (positives.len() * negatives.len()) as f64
}

/// Mean and (population) standard deviation.
#[must_use]
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, var.sqrt())
}
