//! Lookup from `(modality, model)` names to classifier constructors.

use super::backend::TrainingBackend;
use super::data::DataReader;
use super::image::Vgg16;
use super::neural::{ModelSpec, NeuralClassifier};
use super::plant::{PlantDense, PlantLstm, PlantMfccCnn};
use super::watch::WatchDense;
use super::{Classifier, Modality};
use crate::error::MlError;
use crate::grid::ExpandedConfig;
use std::sync::Arc;

/// Builds classifiers for experiment specs.
pub trait ClassifierFactory: Send + Sync {
    fn create(
        &self,
        modality: &str,
        model: &str,
        parameters: &ExpandedConfig,
    ) -> Result<Box<dyn Classifier>, MlError>;
}

/// Every registered `(modality, model)` pair.
pub const MODELS: &[(Modality, &str)] = &[
    (Vgg16::MODALITY, Vgg16::NAME),
    (WatchDense::MODALITY, WatchDense::NAME),
    (PlantLstm::MODALITY, PlantLstm::NAME),
    (PlantDense::MODALITY, PlantDense::NAME),
    (PlantMfccCnn::MODALITY, PlantMfccCnn::NAME),
];

/// Factory over the built-in model families, sharing one backend and data reader.
#[derive(Clone)]
pub struct ClassifierRegistry {
    backend: Arc<dyn TrainingBackend>,
    reader: Arc<dyn DataReader>,
}

impl ClassifierRegistry {
    pub fn new(backend: Arc<dyn TrainingBackend>, reader: Arc<dyn DataReader>) -> Self {
        Self { backend, reader }
    }

    fn build<M: ModelSpec>(
        &self,
        parameters: &ExpandedConfig,
    ) -> Result<Box<dyn Classifier>, MlError> {
        let classifier = NeuralClassifier::<M>::new(
            parameters.clone(),
            Arc::clone(&self.backend),
            Arc::clone(&self.reader),
        )?;
        Ok(Box::new(classifier))
    }
}

impl ClassifierFactory for ClassifierRegistry {
    fn create(
        &self,
        modality: &str,
        model: &str,
        parameters: &ExpandedConfig,
    ) -> Result<Box<dyn Classifier>, MlError> {
        let modality: Modality = modality.parse()?;
        match (modality, model) {
            (Modality::Image, "vgg16") => self.build::<Vgg16>(parameters),
            (Modality::Watch, "watch_dense") => self.build::<WatchDense>(parameters),
            (Modality::Plant, "plant_lstm") => self.build::<PlantLstm>(parameters),
            (Modality::Plant, "plant_dense") => self.build::<PlantDense>(parameters),
            (Modality::Plant, "plant_mfcc_cnn") => self.build::<PlantMfccCnn>(parameters),
            _ => {
                let known: Vec<&str> = MODELS
                    .iter()
                    .filter(|(m, _)| *m == modality)
                    .map(|(_, name)| *name)
                    .collect();
                Err(MlError::config(format!(
                    "unknown {modality} model '{model}' (available: {})",
                    known.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::data::ConventionalDataReader;
    use crate::classification::mock::MockBackend;
    use serde_json::json;

    fn registry() -> ClassifierRegistry {
        ClassifierRegistry::new(
            Arc::new(MockBackend::perfect(vec![0, 1, 2])),
            Arc::new(ConventionalDataReader::new("data".into())),
        )
    }

    #[test]
    fn test_every_listed_model_is_constructible() {
        let registry = registry();
        for (modality, model) in MODELS {
            let classifier = registry
                .create(modality.as_str(), model, &ExpandedConfig::new())
                .unwrap();
            assert_eq!(classifier.name(), *model);
            assert_eq!(classifier.modality(), *modality);
            assert!(!classifier.is_trained());
        }
    }

    #[test]
    fn test_mismatched_modality_rejected() {
        let err = registry()
            .create("image", "plant_lstm", &ExpandedConfig::new())
            .err()
            .unwrap();
        match err {
            MlError::Config(msg) => {
                assert!(msg.contains("plant_lstm"));
                assert!(msg.contains("vgg16"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_modality_rejected() {
        let result = registry().create("audio", "vgg16", &ExpandedConfig::new());
        assert!(matches!(result, Err(MlError::Config(_))));
    }

    #[test]
    fn test_parameters_validated_at_construction() {
        let parameters = json!({"lstm_units": "many"})
            .as_object()
            .cloned()
            .unwrap();
        let result = registry().create("plant", "plant_lstm", &parameters);
        assert!(matches!(result, Err(MlError::Config(_))));

        let parameters = json!({"conv_filters": 32}).as_object().cloned().unwrap();
        let result = registry().create("plant", "plant_lstm", &parameters);
        assert!(matches!(result, Err(MlError::Config(_))));
    }
}
