//! Framework-neutral description of a network topology.
//!
//! Classifiers describe their network as an ordered list of layers; the training
//! backend turns the description into a framework model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Tanh,
    Softmax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum LayerSpec {
    Input {
        shape: Vec<usize>,
        name: String,
    },
    /// Channel-wise mean subtraction expected by the VGG family.
    Vgg16Preprocess,
    /// A pretrained convolutional base without its classification head.
    Pretrained {
        architecture: String,
        weights: String,
        /// Number of leading base layers excluded from training.
        frozen_layers: usize,
    },
    /// MFCC feature extraction at the sample rate of the dataset being read.
    Mfcc { coefficients: usize },
    Flatten,
    Dense {
        units: usize,
        activation: Activation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regularizer: Option<L1L2>,
    },
    Dropout {
        rate: f64,
    },
    Lstm {
        units: usize,
        return_sequences: bool,
    },
    Conv1d {
        filters: usize,
        kernel_size: usize,
        activation: Activation,
    },
    MaxPool1d {
        pool_size: usize,
    },
    GlobalAveragePool1d,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct L1L2 {
    pub l1: f64,
    pub l2: f64,
}

impl L1L2 {
    /// `None` when both penalties are zero.
    pub fn new(l1: f64, l2: f64) -> Option<Self> {
        if l1 == 0.0 && l2 == 0.0 {
            None
        } else {
            Some(Self { l1, l2 })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub name: String,
    pub layers: Vec<LayerSpec>,
}

impl Topology {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            layers: Vec::new(),
        }
    }

    pub fn push(&mut self, layer: LayerSpec) -> &mut Self {
        self.layers.push(layer);
        self
    }

    pub fn dense(&mut self, units: usize, activation: Activation) -> &mut Self {
        self.push(LayerSpec::Dense {
            units,
            activation,
            regularizer: None,
        })
    }

    pub fn dropout(&mut self, rate: f64) -> &mut Self {
        self.push(LayerSpec::Dropout { rate })
    }

    /// Softmax head over `classes` outputs.
    pub fn classifier_head(&mut self, classes: usize) -> &mut Self {
        self.dense(classes, Activation::Softmax)
    }

    /// Number of outputs of the final dense layer.
    pub fn output_units(&self) -> Option<usize> {
        self.layers.iter().rev().find_map(|layer| match layer {
            LayerSpec::Dense { units, .. } => Some(*units),
            _ => None,
        })
    }

    pub fn count(&self, predicate: impl Fn(&LayerSpec) -> bool) -> usize {
        self.layers.iter().filter(|&l| predicate(l)).count()
    }
}

/// Number of leading layers selected by a Python-style `layers[:n]` slice.
pub fn sliced_prefix(total: usize, n: i64) -> usize {
    let magnitude = usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX);
    if n >= 0 {
        magnitude.min(total)
    } else {
        total.saturating_sub(magnitude)
    }
}
