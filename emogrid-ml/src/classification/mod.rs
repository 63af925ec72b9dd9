//! Classifier adapters.
//!
//! Every classifier exposes the same capability set through [`Classifier`]. The
//! concrete models are [`ModelSpec`] implementations plugged into the generic
//! [`NeuralClassifier`], which owns the backend, the data reader and the
//! trained/loaded state.

pub mod backend;
pub mod data;
pub mod image;
pub mod mock;
pub mod neural;
pub mod params;
pub mod plant;
pub mod registry;
pub mod topology;
pub mod watch;

pub use backend::{FitReport, FitRequest, ModelHandle, PythonBackend, TrainingBackend};
pub use data::{ConventionalDataReader, DataReader, DatasetSpec, DatasetTransform, Fold};
pub use mock::MockBackend;
pub use neural::{ModelSpec, NeuralClassifier, history_path};
pub use params::{LabelMode, ResolvedParameters, SeriesParameters, TrainingParameters};
pub use registry::{ClassifierFactory, ClassifierRegistry};
pub use topology::{Activation, LayerSpec, Topology};

use crate::error::MlError;
use crate::grid::ExpandedConfig;
use crate::history::TrainingHistory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Emotion classes, in output-unit order.
pub const EMOTIONS: [&str; 7] = [
    "anger", "surprise", "disgust", "joy", "fear", "sadness", "neutral",
];

/// Data source a classifier consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Image,
    Watch,
    Plant,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Watch => "watch",
            Self::Plant => "plant",
        }
    }

    /// Time-series modalities are cut into windows and accept window options.
    pub fn is_series(&self) -> bool {
        matches!(self, Self::Watch | Self::Plant)
    }
}

impl FromStr for Modality {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "watch" => Ok(Self::Watch),
            "plant" => Ok(Self::Plant),
            other => Err(MlError::config(format!("unknown modality '{other}'"))),
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Set {
    Train,
    Val,
    #[default]
    Test,
}

/// Capability set shared by all classifiers.
///
/// Every call takes a parameter mapping that is overlaid on the mapping the
/// classifier was constructed with; pass an empty mapping to use the
/// construction parameters unchanged.
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn modality(&self) -> Modality;

    fn is_trained(&self) -> bool;

    /// History of the most recent training run.
    fn history(&self) -> Option<&TrainingHistory>;

    /// Build a fresh topology, discarding any trained or loaded model.
    fn initialize_model(&mut self, parameters: &ExpandedConfig) -> Result<(), MlError>;

    /// Fit on the training split, validating on the validation split.
    async fn train(&mut self, parameters: &ExpandedConfig) -> Result<(), MlError>;

    /// Persist the trained model, returning where it was written.
    async fn save(&self, parameters: &ExpandedConfig) -> Result<PathBuf, MlError>;

    /// Make a previously saved model available for classification.
    async fn load(&mut self, parameters: &ExpandedConfig) -> Result<(), MlError>;

    /// Predicted class index for every sample of the configured split.
    async fn classify(&self, parameters: &ExpandedConfig) -> Result<Vec<usize>, MlError>;

    /// Ground-truth class indices of the split `classify` predicts.
    async fn labels(&self, parameters: &ExpandedConfig) -> Result<Vec<usize>, MlError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_parse_roundtrip() {
        for modality in [Modality::Image, Modality::Watch, Modality::Plant] {
            assert_eq!(modality.as_str().parse::<Modality>().unwrap(), modality);
        }
        assert!(matches!("audio".parse::<Modality>(), Err(MlError::Config(_))));
    }

    #[test]
    fn test_series_modalities() {
        assert!(!Modality::Image.is_series());
        assert!(Modality::Watch.is_series());
        assert!(Modality::Plant.is_series());
    }

    #[test]
    fn test_set_serde() {
        assert_eq!(serde_json::to_string(&Set::Val).unwrap(), "\"val\"");
        assert_eq!(Set::default(), Set::Test);
    }
}
