//! Generic neural classifier composed from a model spec, a backend and a data reader.

use super::backend::{FitRequest, ModelHandle, OptimizerSpec, TrainingBackend, argmax};
use super::data::{DataReader, DatasetSpec, DatasetTransform};
use super::params::{ModelConfig, ResolvedParameters, resolve};
use super::topology::Topology;
use super::{Classifier, EMOTIONS, Modality, Set};
use crate::error::MlError;
use crate::grid::ExpandedConfig;
use crate::history::TrainingHistory;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Static description of one model family.
pub trait ModelSpec: Send + Sync + 'static {
    type Config: ModelConfig;

    const NAME: &'static str;
    const MODALITY: Modality;

    /// Layer description for the given options and reader input shape.
    fn topology(config: &Self::Config, input_shape: &[usize]) -> Topology;

    /// Mapping applied to every dataset this model reads.
    fn dataset_transform() -> Option<DatasetTransform> {
        None
    }
}

/// Training log written next to a saved model: `<model file name>.history.json`.
pub fn history_path(model_path: &Path) -> PathBuf {
    let mut name = model_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".history.json");
    model_path.with_file_name(name)
}

pub struct NeuralClassifier<M: ModelSpec> {
    parameters: ExpandedConfig,
    backend: Arc<dyn TrainingBackend>,
    reader: Arc<dyn DataReader>,
    topology: Option<Topology>,
    model: Option<ModelHandle>,
    is_trained: bool,
    history: Option<TrainingHistory>,
    _spec: PhantomData<fn() -> M>,
}

impl<M: ModelSpec> NeuralClassifier<M> {
    /// Create a classifier, validating `parameters` for this model.
    pub fn new(
        parameters: ExpandedConfig,
        backend: Arc<dyn TrainingBackend>,
        reader: Arc<dyn DataReader>,
    ) -> Result<Self, MlError> {
        resolve::<M::Config>(M::NAME, M::MODALITY, &parameters, &ExpandedConfig::new())?;
        Ok(Self {
            parameters,
            backend,
            reader,
            topology: None,
            model: None,
            is_trained: false,
            history: None,
            _spec: PhantomData,
        })
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_ref()
    }

    fn resolve(&self, overrides: &ExpandedConfig) -> Result<ResolvedParameters<M::Config>, MlError> {
        resolve::<M::Config>(M::NAME, M::MODALITY, &self.parameters, overrides)
    }

    fn save_path(params: &ResolvedParameters<M::Config>) -> PathBuf {
        params.training.save_path.clone().unwrap_or_else(|| {
            PathBuf::from("models")
                .join(M::MODALITY.as_str())
                .join(M::NAME)
        })
    }

    fn dataset(&self, params: &ResolvedParameters<M::Config>, which_set: Set) -> DatasetSpec {
        self.reader
            .emotion_data(
                M::MODALITY,
                &EMOTIONS,
                which_set,
                params.training.batch_size,
                &params.raw,
            )
            .with_transform(M::dataset_transform())
            .with_fold(params.training.fold())
    }

    fn build_topology(&mut self, params: &ResolvedParameters<M::Config>) {
        let input_shape = self.reader.input_shape(M::MODALITY, params.series.as_ref());
        let topology = M::topology(&params.model, &input_shape);
        debug!(
            model = M::NAME,
            layers = topology.layers.len(),
            ?input_shape,
            "Initialized topology"
        );
        self.topology = Some(topology);
    }
}

#[async_trait]
impl<M: ModelSpec> Classifier for NeuralClassifier<M> {
    fn name(&self) -> &str {
        M::NAME
    }

    fn modality(&self) -> Modality {
        M::MODALITY
    }

    fn is_trained(&self) -> bool {
        self.is_trained
    }

    fn history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }

    fn initialize_model(&mut self, parameters: &ExpandedConfig) -> Result<(), MlError> {
        let params = self.resolve(parameters)?;
        self.model = None;
        self.is_trained = false;
        self.build_topology(&params);
        Ok(())
    }

    async fn train(&mut self, parameters: &ExpandedConfig) -> Result<(), MlError> {
        let params = self.resolve(parameters)?;
        info!(
            model = M::NAME,
            epochs = params.training.epochs,
            batch_size = params.training.batch_size,
            learning_rate = params.training.learning_rate,
            "Training classifier"
        );

        if self.topology.is_none() {
            self.build_topology(&params);
        }
        let topology = self
            .topology
            .clone()
            .ok_or_else(|| MlError::state("topology missing after initialization"))?;

        let request = FitRequest {
            model: M::NAME.to_string(),
            topology,
            optimizer: OptimizerSpec::adam(params.training.learning_rate),
            loss: "categorical_crossentropy".to_string(),
            epochs: params.training.epochs,
            patience: params.training.patience,
            class_weighted: params.training.weighted,
            train: self.dataset(&params, Set::Train),
            validation: self.dataset(&params, Set::Val),
            initial: self.model.clone(),
        };

        let report = self.backend.fit(&request).await?;
        if report.history.loss_history.iter().any(|l| !l.is_finite()) {
            return Err(MlError::training(format!(
                "{} diverged: non-finite training loss",
                M::NAME
            )));
        }

        info!(
            model = M::NAME,
            epochs_completed = report.history.epochs_completed,
            best_epoch = report.history.best_epoch,
            best_loss = report.history.best_loss,
            stopped_early = report.history.stopped_early,
            "Training finished"
        );
        self.model = Some(report.model);
        self.history = Some(report.history);
        self.is_trained = true;
        Ok(())
    }

    async fn save(&self, parameters: &ExpandedConfig) -> Result<PathBuf, MlError> {
        let model = match (&self.model, self.is_trained) {
            (Some(model), true) => model,
            _ => {
                return Err(MlError::state(
                    "Model needs to be trained in order to save it!",
                ));
            }
        };
        let params = self.resolve(parameters)?;
        let path = Self::save_path(&params);
        self.backend.save(model, &path).await?;

        if let Some(history) = &self.history {
            let log_path = history_path(&path);
            if let Some(parent) = log_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&log_path, serde_json::to_vec_pretty(history)?).await?;
        }
        info!(model = M::NAME, path = %path.display(), "Saved model");
        Ok(path)
    }

    async fn load(&mut self, parameters: &ExpandedConfig) -> Result<(), MlError> {
        let params = self.resolve(parameters)?;
        let path = Self::save_path(&params);
        self.model = Some(self.backend.load(&path).await?);
        info!(model = M::NAME, path = %path.display(), "Loaded model");
        Ok(())
    }

    async fn classify(&self, parameters: &ExpandedConfig) -> Result<Vec<usize>, MlError> {
        let params = self.resolve(parameters)?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| MlError::state("Please load or train the model before inference!"))?;
        let dataset = self.dataset(&params, params.training.which_set);
        let probabilities = self.backend.predict(model, &dataset).await?;
        probabilities
            .iter()
            .map(|row| {
                argmax(row).ok_or_else(|| MlError::backend("empty probability row in prediction"))
            })
            .collect()
    }

    async fn labels(&self, parameters: &ExpandedConfig) -> Result<Vec<usize>, MlError> {
        let params = self.resolve(parameters)?;
        let dataset = self.dataset(&params, params.training.which_set);
        self.backend.labels(&dataset).await
    }
}
