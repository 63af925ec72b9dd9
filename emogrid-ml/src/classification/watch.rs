//! Wearable-sensor classifiers.

use super::neural::{ModelSpec, NeuralClassifier};
use super::params::{ModelConfig, check_dropout};
use super::topology::{Activation, LayerSpec, Topology};
use super::{EMOTIONS, Modality};
use crate::error::MlError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchDenseConfig {
    pub dense_units: usize,
    pub dropout: f64,
    pub hidden_layers: usize,
}

impl Default for WatchDenseConfig {
    fn default() -> Self {
        Self {
            dense_units: 512,
            dropout: 0.2,
            hidden_layers: 2,
        }
    }
}

impl ModelConfig for WatchDenseConfig {
    const KEYS: &'static [&'static str] = &["dense_units", "dropout", "hidden_layers"];

    fn validate(&self) -> Result<(), MlError> {
        check_dropout(self.dropout)?;
        if self.dense_units == 0 || self.hidden_layers == 0 {
            return Err(MlError::config(
                "dense_units and hidden_layers must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Fully connected network over flattened sensor windows.
pub struct WatchDense;

impl ModelSpec for WatchDense {
    type Config = WatchDenseConfig;

    const NAME: &'static str = "watch_dense";
    const MODALITY: Modality = Modality::Watch;

    fn topology(config: &WatchDenseConfig, input_shape: &[usize]) -> Topology {
        let mut topology = Topology::new(Self::NAME);
        topology
            .push(LayerSpec::Input {
                shape: input_shape.to_vec(),
                name: "raw".to_string(),
            })
            .push(LayerSpec::Flatten);
        for _ in 0..config.hidden_layers {
            topology
                .dense(config.dense_units, Activation::Linear)
                .dropout(config.dropout);
        }
        topology.classifier_head(EMOTIONS.len());
        topology
    }
}

pub type WatchDenseClassifier = NeuralClassifier<WatchDense>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_layers() {
        let config = WatchDenseConfig {
            dense_units: 4096,
            hidden_layers: 3,
            ..WatchDenseConfig::default()
        };
        let topology = WatchDense::topology(&config, &[200, 5]);
        assert_eq!(
            topology.layers[0],
            LayerSpec::Input {
                shape: vec![200, 5],
                name: "raw".into()
            }
        );
        assert_eq!(topology.count(|l| matches!(l, LayerSpec::Dense { units: 4096, .. })), 3);
        assert_eq!(topology.count(|l| matches!(l, LayerSpec::Dropout { .. })), 3);
        assert_eq!(topology.output_units(), Some(7));
    }

    #[test]
    fn test_rejects_zero_layers() {
        let config = WatchDenseConfig {
            hidden_layers: 0,
            ..WatchDenseConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
