//! Facial emotion classifiers.

use super::data::DatasetTransform;
use super::neural::{ModelSpec, NeuralClassifier};
use super::params::{ModelConfig, check_dropout};
use super::topology::{Activation, L1L2, LayerSpec, Topology, sliced_prefix};
use super::{EMOTIONS, Modality};
use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Layers in the VGG16 convolutional base, input layer included.
pub const VGG16_BASE_LAYERS: usize = 19;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vgg16Config {
    pub l1: f64,
    pub l2: f64,
    pub dropout: f64,
    /// Python slice bound over the base layers: `-4` trains only the last four.
    pub frozen_layers: i64,
    /// Two extra 4096-unit dense layers before the 1000-unit layer.
    pub deep: bool,
}

impl Default for Vgg16Config {
    fn default() -> Self {
        Self {
            l1: 0.0,
            l2: 0.0,
            dropout: 0.0,
            frozen_layers: -4,
            deep: true,
        }
    }
}

impl ModelConfig for Vgg16Config {
    const KEYS: &'static [&'static str] = &["l1", "l2", "dropout", "frozen_layers", "deep"];

    fn validate(&self) -> Result<(), MlError> {
        check_dropout(self.dropout)?;
        if self.l1 < 0.0 || self.l2 < 0.0 {
            return Err(MlError::config("l1 and l2 must be non-negative"));
        }
        Ok(())
    }
}

/// ImageNet-pretrained VGG16 with a dense emotion head.
pub struct Vgg16;

impl ModelSpec for Vgg16 {
    type Config = Vgg16Config;

    const NAME: &'static str = "vgg16";
    const MODALITY: Modality = Modality::Image;

    fn topology(config: &Vgg16Config, _input_shape: &[usize]) -> Topology {
        let regularizer = L1L2::new(config.l1, config.l2);
        let mut topology = Topology::new(Self::NAME);
        topology
            .push(LayerSpec::Input {
                shape: vec![48, 48, 3],
                name: "image".to_string(),
            })
            .push(LayerSpec::Vgg16Preprocess)
            .push(LayerSpec::Pretrained {
                architecture: "vgg16".to_string(),
                weights: "imagenet".to_string(),
                frozen_layers: sliced_prefix(VGG16_BASE_LAYERS, config.frozen_layers),
            })
            .push(LayerSpec::Flatten);

        let hidden: &[usize] = if config.deep { &[4096, 4096, 1000] } else { &[1000] };
        for &units in hidden {
            topology.push(LayerSpec::Dense {
                units,
                activation: Activation::Relu,
                regularizer,
            });
            if config.dropout > 0.0 {
                topology.dropout(config.dropout);
            }
        }
        topology.classifier_head(EMOTIONS.len());
        topology
    }

    fn dataset_transform() -> Option<DatasetTransform> {
        Some(DatasetTransform::GrayscaleToRgb)
    }
}

pub type Vgg16Classifier = NeuralClassifier<Vgg16>;
