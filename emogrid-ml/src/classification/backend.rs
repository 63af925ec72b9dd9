//! Training backend trait and the Python implementation.

use super::data::DatasetSpec;
use super::topology::Topology;
use crate::error::MlError;
use crate::history::TrainingHistory;
use crate::runtime::PythonRuntime;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reference to a model held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHandle {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSpec {
    pub name: String,
    pub learning_rate: f64,
}

impl OptimizerSpec {
    pub fn adam(learning_rate: f64) -> Self {
        Self {
            name: "adam".to_string(),
            learning_rate,
        }
    }
}

/// Everything a backend needs to fit one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitRequest {
    pub model: String,
    pub topology: Topology,
    pub optimizer: OptimizerSpec,
    pub loss: String,
    pub epochs: usize,
    /// Early-stopping patience on validation loss, restoring the best weights.
    pub patience: usize,
    pub class_weighted: bool,
    pub train: DatasetSpec,
    pub validation: DatasetSpec,
    /// Continue from this model instead of building `topology` from scratch.
    pub initial: Option<ModelHandle>,
}

#[derive(Debug, Clone)]
pub struct FitReport {
    pub model: ModelHandle,
    pub history: TrainingHistory,
}

/// Seam around the external training framework.
#[async_trait]
pub trait TrainingBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn fit(&self, request: &FitRequest) -> Result<FitReport, MlError>;

    /// Class probabilities, one row per sample.
    async fn predict(
        &self,
        model: &ModelHandle,
        dataset: &DatasetSpec,
    ) -> Result<Vec<Vec<f32>>, MlError>;

    async fn labels(&self, dataset: &DatasetSpec) -> Result<Vec<usize>, MlError>;

    async fn save(&self, model: &ModelHandle, path: &Path) -> Result<(), MlError>;

    async fn load(&self, path: &Path) -> Result<ModelHandle, MlError>;
}

/// Index of the largest probability; the first one wins ties.
pub fn argmax(row: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in row.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| p > b) {
            best = Some((i, p));
        }
    }
    best.map(|(i, _)| i)
}

#[derive(Debug, Deserialize)]
struct FitResponse {
    loss: Vec<f64>,
    #[serde(default)]
    val_loss: Vec<f64>,
    #[serde(default)]
    metrics: HashMap<String, Vec<f64>>,
    #[serde(default)]
    stopped_early: bool,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    probabilities: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct LabelsResponse {
    labels: Vec<usize>,
}

/// Backend that forwards every request to a Python script.
///
/// The script is invoked as `python <script> <action>` with a JSON request on
/// stdin and answers with a single JSON object on its last stdout line. Working
/// models are written below `scratch_dir`.
pub struct PythonBackend {
    runtime: PythonRuntime,
    script: PathBuf,
    scratch_dir: PathBuf,
}

impl PythonBackend {
    pub fn new(runtime: PythonRuntime, script: PathBuf, scratch_dir: PathBuf) -> Self {
        Self {
            runtime,
            script,
            scratch_dir,
        }
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        action: &str,
        input: serde_json::Value,
    ) -> Result<T, MlError> {
        let output = self.runtime.run_json(&self.script, action, &input).await?;
        serde_json::from_value(output)
            .map_err(|e| MlError::backend(format!("malformed '{action}' response: {e}")))
    }
}

#[async_trait]
impl TrainingBackend for PythonBackend {
    fn name(&self) -> &str {
        "python"
    }

    async fn fit(&self, request: &FitRequest) -> Result<FitReport, MlError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let output = self.scratch_dir.join(format!("{}-{id}", request.model));
        info!(
            model = %request.model,
            device = %self.runtime.device(),
            epochs = request.epochs,
            "Fitting model"
        );

        let response: FitResponse = self
            .request("fit", json!({ "request": request, "output": output }))
            .await?;

        let mut history = TrainingHistory::from_losses(&response.loss, &response.val_loss);
        for (name, values) in response.metrics {
            for value in values {
                history.add_custom_metric(&name, value);
            }
        }
        history.stopped_early = response.stopped_early;

        Ok(FitReport {
            model: ModelHandle { id, path: output },
            history,
        })
    }

    async fn predict(
        &self,
        model: &ModelHandle,
        dataset: &DatasetSpec,
    ) -> Result<Vec<Vec<f32>>, MlError> {
        let response: PredictResponse = self
            .request("predict", json!({ "model": model, "dataset": dataset }))
            .await?;
        Ok(response.probabilities)
    }

    async fn labels(&self, dataset: &DatasetSpec) -> Result<Vec<usize>, MlError> {
        let response: LabelsResponse = self.request("labels", json!({ "dataset": dataset })).await?;
        Ok(response.labels)
    }

    async fn save(&self, model: &ModelHandle, path: &Path) -> Result<(), MlError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let _: serde_json::Value = self
            .request(
                "save",
                json!({ "model": model, "path": path, "include_optimizer": false }),
            )
            .await?;
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<ModelHandle, MlError> {
        if !path.exists() {
            return Err(MlError::backend(format!(
                "no saved model at {}",
                path.display()
            )));
        }
        Ok(ModelHandle {
            id: uuid::Uuid::new_v4().to_string(),
            path: path.to_path_buf(),
        })
    }
}
