//! Per-epoch training history reported by a backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs_completed: usize,
    pub loss_history: Vec<f64>,
    pub val_loss_history: Vec<f64>,
    #[serde(default)]
    pub custom_metrics: HashMap<String, Vec<f64>>,
    pub best_epoch: Option<usize>,
    pub best_loss: Option<f64>,
    /// Set when early stopping ended training before the epoch budget.
    #[serde(default)]
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn record_epoch(&mut self, loss: f64, val_loss: Option<f64>) {
        self.loss_history.push(loss);
        if let Some(vl) = val_loss {
            self.val_loss_history.push(vl);
        }
        self.epochs_completed += 1;

        let check_loss = val_loss.unwrap_or(loss);
        if self.best_loss.is_none_or(|best| check_loss < best) {
            self.best_loss = Some(check_loss);
            self.best_epoch = Some(self.epochs_completed);
        }
    }

    pub fn add_custom_metric(&mut self, name: &str, value: f64) {
        self.custom_metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    /// Rebuild the derived fields from raw per-epoch losses.
    pub fn from_losses(loss: &[f64], val_loss: &[f64]) -> Self {
        let mut history = Self::default();
        for (epoch, &l) in loss.iter().enumerate() {
            history.record_epoch(l, val_loss.get(epoch).copied());
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_epoch_tracks_best_validation_loss() {
        let mut history = TrainingHistory::default();
        history.record_epoch(0.5, Some(0.6));
        history.record_epoch(0.3, Some(0.4));
        history.record_epoch(0.2, Some(0.45));
        assert_eq!(history.epochs_completed, 3);
        assert_eq!(history.best_epoch, Some(2));
        assert_eq!(history.best_loss, Some(0.4));
    }

    #[test]
    fn test_from_losses_without_validation() {
        let history = TrainingHistory::from_losses(&[0.9, 0.7, 0.8], &[]);
        assert_eq!(history.best_epoch, Some(2));
        assert!(history.val_loss_history.is_empty());
    }

    #[test]
    fn test_custom_metrics() {
        let mut history = TrainingHistory::default();
        history.add_custom_metric("val_accuracy", 0.4);
        history.add_custom_metric("val_accuracy", 0.5);
        assert_eq!(history.custom_metrics["val_accuracy"], vec![0.4, 0.5]);
    }
}
