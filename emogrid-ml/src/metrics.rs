//! Classification metrics over parallel label / prediction sequences.
//!
//! The label space is the sorted union of the class indices that occur in either
//! sequence. Classes without support (no true members) are skipped when averaging
//! per-class accuracy and recall; a class that is never predicted contributes a
//! precision of 0.

use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Confusion matrix, rows are true classes and columns are predicted classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<usize>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(labels: &[usize], predictions: &[usize]) -> Result<Self, MlError> {
        check_inputs(labels, predictions)?;

        let classes: Vec<usize> = labels
            .iter()
            .chain(predictions)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position = |class: usize| classes.binary_search(&class).unwrap_or_default();

        let mut counts = vec![vec![0; classes.len()]; classes.len()];
        for (&truth, &pred) in labels.iter().zip(predictions) {
            counts[position(truth)][position(pred)] += 1;
        }

        Ok(Self {
            labels: classes,
            counts,
        })
    }

    /// Element-wise sum of two matrices over the union of their labels.
    pub fn merge(&self, other: &Self) -> Self {
        let classes: Vec<usize> = self
            .labels
            .iter()
            .chain(&other.labels)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position = |class: usize| classes.binary_search(&class).unwrap_or_default();

        let mut counts = vec![vec![0; classes.len()]; classes.len()];
        for matrix in [self, other] {
            for (i, row) in matrix.counts.iter().enumerate() {
                for (j, &count) in row.iter().enumerate() {
                    counts[position(matrix.labels[i])][position(matrix.labels[j])] += count;
                }
            }
        }

        Self {
            labels: classes,
            counts,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn diagonal(&self, k: usize) -> usize {
        self.counts[k][k]
    }

    fn support(&self, k: usize) -> usize {
        self.counts[k].iter().sum()
    }

    fn predicted(&self, k: usize) -> usize {
        self.counts.iter().map(|row| row[k]).sum()
    }

    /// Per-class recall, `None` for classes without support.
    pub fn per_class_recall(&self) -> Vec<Option<f64>> {
        (0..self.num_classes())
            .map(|k| match self.support(k) {
                0 => None,
                support => Some(self.diagonal(k) as f64 / support as f64),
            })
            .collect()
    }

    /// Per-class precision, 0 for classes that were never predicted.
    pub fn per_class_precision(&self) -> Vec<f64> {
        (0..self.num_classes())
            .map(|k| match self.predicted(k) {
                0 => 0.0,
                predicted => self.diagonal(k) as f64 / predicted as f64,
            })
            .collect()
    }
}

/// Fraction of positions where the prediction equals the label.
pub fn accuracy(labels: &[usize], predictions: &[usize]) -> Result<f64, MlError> {
    check_inputs(labels, predictions)?;
    let correct = labels
        .iter()
        .zip(predictions)
        .filter(|(truth, pred)| truth == pred)
        .count();
    Ok(correct as f64 / labels.len() as f64)
}

/// Mean per-class accuracy (mean recall over classes with support).
pub fn per_class_accuracy(labels: &[usize], predictions: &[usize]) -> Result<f64, MlError> {
    let matrix = ConfusionMatrix::from_predictions(labels, predictions)?;
    Ok(nan_mean(&matrix.per_class_recall()))
}

/// Macro-averaged precision.
pub fn precision(labels: &[usize], predictions: &[usize]) -> Result<f64, MlError> {
    let matrix = ConfusionMatrix::from_predictions(labels, predictions)?;
    let per_class = matrix.per_class_precision();
    Ok(per_class.iter().sum::<f64>() / per_class.len() as f64)
}

/// Macro-averaged recall over classes with support.
pub fn recall(labels: &[usize], predictions: &[usize]) -> Result<f64, MlError> {
    let matrix = ConfusionMatrix::from_predictions(labels, predictions)?;
    Ok(nan_mean(&matrix.per_class_recall()))
}

/// All evaluation metrics for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub accuracy: f64,
    pub per_class_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub num_samples: usize,
}

impl MetricsReport {
    pub fn compute(labels: &[usize], predictions: &[usize]) -> Result<Self, MlError> {
        let matrix = ConfusionMatrix::from_predictions(labels, predictions)?;
        let recalls = matrix.per_class_recall();
        let precisions = matrix.per_class_precision();
        let mean_recall = nan_mean(&recalls);
        Ok(Self {
            accuracy: accuracy(labels, predictions)?,
            per_class_accuracy: mean_recall,
            precision: precisions.iter().sum::<f64>() / precisions.len() as f64,
            recall: mean_recall,
            num_samples: matrix.total(),
            confusion_matrix: matrix,
        })
    }
}

impl MetricsReport {
    /// Unweighted mean of per-fold scores; confusion matrices and sample counts are summed.
    pub fn mean(reports: &[MetricsReport]) -> Result<Self, MlError> {
        let (first, rest) = reports
            .split_first()
            .ok_or_else(|| MlError::invalid_input("cannot average zero metric reports"))?;
        let n = reports.len() as f64;
        let average = |score: fn(&MetricsReport) -> f64| reports.iter().map(score).sum::<f64>() / n;
        Ok(Self {
            accuracy: average(|r| r.accuracy),
            per_class_accuracy: average(|r| r.per_class_accuracy),
            precision: average(|r| r.precision),
            recall: average(|r| r.recall),
            confusion_matrix: rest
                .iter()
                .fold(first.confusion_matrix.clone(), |acc, r| acc.merge(&r.confusion_matrix)),
            num_samples: reports.iter().map(|r| r.num_samples).sum(),
        })
    }
}

fn check_inputs(labels: &[usize], predictions: &[usize]) -> Result<(), MlError> {
    if labels.len() != predictions.len() {
        return Err(MlError::invalid_input(format!(
            "labels and predictions differ in length ({} vs {})",
            labels.len(),
            predictions.len()
        )));
    }
    if labels.is_empty() {
        return Err(MlError::invalid_input("cannot score an empty prediction set"));
    }
    Ok(())
}

/// Mean over the defined entries. Never empty in practice: some class always has support.
fn nan_mean(values: &[Option<f64>]) -> f64 {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.is_empty() {
        return f64::NAN;
    }
    defined.iter().sum::<f64>() / defined.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 2], &[0, 1, 2]).unwrap(), 1.0);
        assert_eq!(accuracy(&[0, 1], &[1, 0]).unwrap(), 0.0);
        assert!(close(accuracy(&[0, 1, 1, 2], &[0, 1, 2, 2]).unwrap(), 0.75));
    }

    #[test]
    fn test_per_class_accuracy_perfect() {
        assert_eq!(per_class_accuracy(&[0, 1, 1, 0], &[0, 1, 1, 0]).unwrap(), 1.0);
    }

    #[test]
    fn test_per_class_accuracy_balances_classes() {
        // Class 0: 3/4 correct, class 1: 0/1 correct.
        let labels = [0, 0, 0, 0, 1];
        let preds = [0, 0, 0, 1, 0];
        assert!(close(per_class_accuracy(&labels, &preds).unwrap(), 0.375));
        assert!(close(accuracy(&labels, &preds).unwrap(), 0.6));
    }

    #[test]
    fn test_class_absent_from_labels_is_skipped() {
        // Class 2 is predicted but never a true label: zero support.
        let labels = [0, 0, 1, 1];
        let preds = [0, 2, 1, 1];
        let value = per_class_accuracy(&labels, &preds).unwrap();
        assert!(close(value, 0.75));
        assert!(close(recall(&labels, &preds).unwrap(), 0.75));
    }

    #[test]
    fn test_precision_zero_division_is_zero() {
        // Class 1 is never predicted.
        let labels = [0, 1, 0, 1];
        let preds = [0, 0, 0, 0];
        assert!(close(precision(&labels, &preds).unwrap(), 0.25));
        assert!(close(recall(&labels, &preds).unwrap(), 0.5));
    }

    #[test]
    fn test_confusion_matrix_layout() {
        let matrix = ConfusionMatrix::from_predictions(&[3, 5, 5], &[3, 3, 5]).unwrap();
        assert_eq!(matrix.labels, vec![3, 5]);
        assert_eq!(matrix.counts, vec![vec![1, 0], vec![1, 1]]);
        assert_eq!(matrix.total(), 3);
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let err = accuracy(&[0, 1], &[0]).unwrap_err();
        assert!(matches!(err, MlError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(matches!(precision(&[], &[]), Err(MlError::InvalidInput(_))));
    }

    #[test]
    fn test_report_bundles_metrics() {
        let labels = [0, 1, 2, 2];
        let preds = [0, 2, 2, 2];
        let report = MetricsReport::compute(&labels, &preds).unwrap();
        assert!(close(report.accuracy, 0.75));
        assert!(close(report.per_class_accuracy, 2.0 / 3.0));
        assert!(close(report.recall, 2.0 / 3.0));
        assert!(close(report.precision, (1.0 + 0.0 + 2.0 / 3.0) / 3.0));
        assert_eq!(report.num_samples, 4);
    }

    #[test]
    fn test_merge_aligns_labels() {
        let a = ConfusionMatrix::from_predictions(&[0, 1], &[0, 0]).unwrap();
        let b = ConfusionMatrix::from_predictions(&[1, 2], &[1, 2]).unwrap();
        let merged = a.merge(&b);
        assert_eq!(merged.labels, vec![0, 1, 2]);
        assert_eq!(
            merged.counts,
            vec![vec![1, 0, 0], vec![1, 1, 0], vec![0, 0, 1]]
        );
        assert_eq!(merged.total(), a.total() + b.total());
    }

    #[test]
    fn test_mean_over_folds() {
        let first = MetricsReport::compute(&[0, 1, 1, 0], &[0, 1, 1, 0]).unwrap();
        let second = MetricsReport::compute(&[0, 1], &[1, 0]).unwrap();
        let mean = MetricsReport::mean(&[first, second]).unwrap();
        assert!(close(mean.accuracy, 0.5));
        assert!(close(mean.per_class_accuracy, 0.5));
        assert_eq!(mean.num_samples, 6);
        assert_eq!(mean.confusion_matrix.counts, vec![vec![2, 1], vec![1, 2]]);
    }

    #[test]
    fn test_mean_of_nothing_is_rejected() {
        assert!(matches!(MetricsReport::mean(&[]), Err(MlError::InvalidInput(_))));
    }
}
