//! Plant electrode signal classifiers.

use super::neural::{ModelSpec, NeuralClassifier};
use super::params::{ModelConfig, check_dropout};
use super::topology::{Activation, LayerSpec, Topology};
use super::{EMOTIONS, Modality};
use crate::error::MlError;
use serde::{Deserialize, Serialize};

fn input(shape: &[usize]) -> LayerSpec {
    LayerSpec::Input {
        shape: shape.to_vec(),
        name: "plant".to_string(),
    }
}

fn at_least_one(values: &[(&str, usize)]) -> Result<(), MlError> {
    match values.iter().find(|(_, v)| *v == 0) {
        Some((name, _)) => Err(MlError::config(format!("{name} must be at least 1"))),
        None => Ok(()),
    }
}

// --- LSTM ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantLstmConfig {
    pub lstm_units: usize,
    pub lstm_layers: usize,
    pub dropout: f64,
}

impl Default for PlantLstmConfig {
    fn default() -> Self {
        Self {
            lstm_units: 256,
            lstm_layers: 2,
            dropout: 0.2,
        }
    }
}

impl ModelConfig for PlantLstmConfig {
    const KEYS: &'static [&'static str] = &["lstm_units", "lstm_layers", "dropout"];

    fn validate(&self) -> Result<(), MlError> {
        check_dropout(self.dropout)?;
        at_least_one(&[("lstm_units", self.lstm_units), ("lstm_layers", self.lstm_layers)])
    }
}

/// Stacked LSTM over the raw electrode window.
pub struct PlantLstm;

impl ModelSpec for PlantLstm {
    type Config = PlantLstmConfig;

    const NAME: &'static str = "plant_lstm";
    const MODALITY: Modality = Modality::Plant;

    fn topology(config: &PlantLstmConfig, input_shape: &[usize]) -> Topology {
        let mut topology = Topology::new(Self::NAME);
        topology.push(input(input_shape));
        for layer in 0..config.lstm_layers {
            topology.push(LayerSpec::Lstm {
                units: config.lstm_units,
                return_sequences: layer + 1 < config.lstm_layers,
            });
        }
        topology.dropout(config.dropout).classifier_head(EMOTIONS.len());
        topology
    }
}

pub type PlantLstmClassifier = NeuralClassifier<PlantLstm>;

// --- Dense ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantDenseConfig {
    pub dense_units: usize,
    pub dense_layers: usize,
    pub dropout: f64,
}

impl Default for PlantDenseConfig {
    fn default() -> Self {
        Self {
            dense_units: 4096,
            dense_layers: 2,
            dropout: 0.2,
        }
    }
}

impl ModelConfig for PlantDenseConfig {
    const KEYS: &'static [&'static str] = &["dense_units", "dense_layers", "dropout"];

    fn validate(&self) -> Result<(), MlError> {
        check_dropout(self.dropout)?;
        at_least_one(&[("dense_units", self.dense_units), ("dense_layers", self.dense_layers)])
    }
}

/// Fully connected network over the flattened electrode window.
pub struct PlantDense;

impl ModelSpec for PlantDense {
    type Config = PlantDenseConfig;

    const NAME: &'static str = "plant_dense";
    const MODALITY: Modality = Modality::Plant;

    fn topology(config: &PlantDenseConfig, input_shape: &[usize]) -> Topology {
        let mut topology = Topology::new(Self::NAME);
        topology.push(input(input_shape)).push(LayerSpec::Flatten);
        for _ in 0..config.dense_layers {
            topology
                .dense(config.dense_units, Activation::Relu)
                .dropout(config.dropout);
        }
        topology.classifier_head(EMOTIONS.len());
        topology
    }
}

pub type PlantDenseClassifier = NeuralClassifier<PlantDense>;

// --- MFCC CNN ---

/// MFCC coefficients computed per frame.
pub const MFCC_COEFFICIENTS: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantMfccCnnConfig {
    pub conv_filters: usize,
    pub conv_layers: usize,
    pub conv_kernel_size: usize,
    pub dropout: f64,
    /// Compute MFCC features inside the network. When false the data pipeline
    /// is expected to deliver MFCC frames.
    pub preprocess: bool,
}

impl Default for PlantMfccCnnConfig {
    fn default() -> Self {
        Self {
            conv_filters: 96,
            conv_layers: 2,
            conv_kernel_size: 7,
            dropout: 0.2,
            preprocess: true,
        }
    }
}

impl ModelConfig for PlantMfccCnnConfig {
    const KEYS: &'static [&'static str] = &[
        "conv_filters",
        "conv_layers",
        "conv_kernel_size",
        "dropout",
        "preprocess",
    ];

    fn validate(&self) -> Result<(), MlError> {
        check_dropout(self.dropout)?;
        at_least_one(&[
            ("conv_filters", self.conv_filters),
            ("conv_layers", self.conv_layers),
            ("conv_kernel_size", self.conv_kernel_size),
        ])
    }
}

/// 1D convolutions over MFCC frames of the electrode signal.
pub struct PlantMfccCnn;

impl ModelSpec for PlantMfccCnn {
    type Config = PlantMfccCnnConfig;

    const NAME: &'static str = "plant_mfcc_cnn";
    const MODALITY: Modality = Modality::Plant;

    fn topology(config: &PlantMfccCnnConfig, input_shape: &[usize]) -> Topology {
        let mut topology = Topology::new(Self::NAME);
        topology.push(input(input_shape));
        if config.preprocess {
            topology.push(LayerSpec::Mfcc {
                coefficients: MFCC_COEFFICIENTS,
            });
        }
        for _ in 0..config.conv_layers {
            topology
                .push(LayerSpec::Conv1d {
                    filters: config.conv_filters,
                    kernel_size: config.conv_kernel_size,
                    activation: Activation::Relu,
                })
                .push(LayerSpec::MaxPool1d { pool_size: 2 });
        }
        topology
            .push(LayerSpec::GlobalAveragePool1d)
            .dropout(config.dropout)
            .classifier_head(EMOTIONS.len());
        topology
    }
}

pub type PlantMfccCnnClassifier = NeuralClassifier<PlantMfccCnn>;
