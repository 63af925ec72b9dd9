//! Experiment specs and their persisted result records.

use crate::error::MlError;
use crate::grid::ExpandedConfig;
use crate::history::TrainingHistory;
use crate::metrics::MetricsReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One unit of work: a modality, a model identifier and its resolved parameters.
///
/// Names are not checked here; an unknown modality or model fails when the
/// experiment is executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub modality: String,
    pub model: String,
    pub train_parameters: ExpandedConfig,
}

impl ExperimentSpec {
    pub fn new(modality: &str, model: &str, train_parameters: ExpandedConfig) -> Self {
        Self {
            modality: modality.to_string(),
            model: model.to_string(),
            train_parameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Completed,
    Failed,
}

/// Score of one cross-validation fold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: usize,
    pub metrics: MetricsReport,
    pub history: Option<TrainingHistory>,
    pub model_path: PathBuf,
}

/// Outcome of one executed experiment, written next to the other results of its project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub project: String,
    pub index: usize,
    pub spec: ExperimentSpec,
    pub status: ExperimentStatus,
    pub metrics: Option<MetricsReport>,
    pub history: Option<TrainingHistory>,
    pub model_path: Option<PathBuf>,
    /// Per-fold scores of a cross-validated run; `metrics` holds their mean.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folds: Vec<FoldResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExperimentRecord {
    pub fn file_name(index: usize) -> String {
        format!("{index:05}.json")
    }

    pub fn load(path: &Path) -> Result<Self, MlError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the record into `dir`, replacing any earlier record for the same index.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, MlError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(self.index));
        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(path)
    }
}
