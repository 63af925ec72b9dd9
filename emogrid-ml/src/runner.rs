//! Experiment runner: an ordered list of experiments executed one by one.

use crate::classification::{Classifier, ClassifierFactory};
use crate::error::MlError;
use crate::experiment::{ExperimentRecord, ExperimentSpec, ExperimentStatus, FoldResult};
use crate::grid::ExpandedConfig;
use crate::history::TrainingHistory;
use crate::metrics::MetricsReport;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one experiment that ran to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub index: usize,
    pub model: String,
    pub metrics: MetricsReport,
    pub model_path: PathBuf,
    pub record_path: PathBuf,
}

/// Everything a `run_all` call completed, in execution order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub project: String,
    pub completed: Vec<ExperimentOutcome>,
}

impl RunSummary {
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

/// How an experiment's classifier is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Train once and classify the configured split (the test split unless overridden).
    #[default]
    Holdout,
    /// Train a fresh classifier per fold, score each on its held-out fold and average.
    CrossValidation { splits: usize },
}

impl EvaluationMode {
    /// Cross-validation for two or more splits, holdout otherwise.
    pub fn from_splits(splits: usize) -> Self {
        if splits > 1 {
            Self::CrossValidation { splits }
        } else {
            Self::Holdout
        }
    }
}

struct Evaluation {
    metrics: MetricsReport,
    history: Option<TrainingHistory>,
    model_path: PathBuf,
    folds: Vec<FoldResult>,
}

pub struct ExperimentRunner {
    project: String,
    experiments: Vec<ExperimentSpec>,
    factory: Arc<dyn ClassifierFactory>,
    models_dir: PathBuf,
    results_dir: PathBuf,
    evaluation: EvaluationMode,
}

impl ExperimentRunner {
    pub fn new(project: &str, factory: Arc<dyn ClassifierFactory>) -> Self {
        Self {
            project: project.to_string(),
            experiments: Vec::new(),
            factory,
            models_dir: PathBuf::from("models"),
            results_dir: PathBuf::from("experiments/results"),
            evaluation: EvaluationMode::Holdout,
        }
    }

    pub fn with_evaluation(mut self, evaluation: EvaluationMode) -> Self {
        self.evaluation = evaluation;
        self
    }

    /// Set the root directories for saved models and result records.
    pub fn with_output(mut self, models_dir: PathBuf, results_dir: PathBuf) -> Self {
        self.models_dir = models_dir;
        self.results_dir = results_dir;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn evaluation(&self) -> EvaluationMode {
        self.evaluation
    }

    pub fn experiments(&self) -> &[ExperimentSpec] {
        &self.experiments
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Append one experiment per configuration, preserving order.
    pub fn add_grid_experiments(
        &mut self,
        modality: &str,
        model: &str,
        train_parameters: Vec<ExpandedConfig>,
    ) {
        let added = train_parameters.len();
        self.experiments.extend(
            train_parameters
                .into_iter()
                .map(|params| ExperimentSpec::new(modality, model, params)),
        );
        info!(
            project = %self.project,
            modality,
            model,
            added,
            total = self.experiments.len(),
            "Registered grid experiments"
        );
    }

    /// Run the experiments at `indices` sequentially, stopping at the first failure.
    pub async fn run_all(&self, indices: &[usize]) -> Result<RunSummary, MlError> {
        let mut summary = RunSummary {
            project: self.project.clone(),
            completed: Vec::with_capacity(indices.len()),
        };
        for &index in indices {
            let spec = self.experiments.get(index).ok_or(MlError::IndexOutOfBounds {
                index,
                len: self.experiments.len(),
            })?;
            summary.completed.push(self.run_one(index, spec).await?);
        }
        info!(
            project = %self.project,
            completed = summary.len(),
            "Finished experiment batch"
        );
        Ok(summary)
    }

    fn project_results_dir(&self) -> PathBuf {
        self.results_dir.join(&self.project)
    }

    /// Parameters as executed: `save_path` defaults to a per-experiment directory.
    fn effective_spec(&self, index: usize, spec: &ExperimentSpec) -> ExperimentSpec {
        let mut spec = spec.clone();
        if !spec.train_parameters.contains_key("save_path") {
            let path = self
                .models_dir
                .join(&self.project)
                .join(format!("{}_{index}", spec.model));
            spec.train_parameters.insert(
                "save_path".to_string(),
                Value::String(path.to_string_lossy().into_owned()),
            );
        }
        spec
    }

    async fn run_one(
        &self,
        index: usize,
        spec: &ExperimentSpec,
    ) -> Result<ExperimentOutcome, MlError> {
        let spec = self.effective_spec(index, spec);
        let started_at = Utc::now();
        info!(
            project = %self.project,
            index,
            modality = %spec.modality,
            model = %spec.model,
            evaluation = ?self.evaluation,
            "Running experiment"
        );

        let mut record = ExperimentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            project: self.project.clone(),
            index,
            spec: spec.clone(),
            status: ExperimentStatus::Failed,
            metrics: None,
            history: None,
            model_path: None,
            folds: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        match self.evaluate(index, &spec).await {
            Ok(evaluation) => {
                record.status = ExperimentStatus::Completed;
                record.metrics = Some(evaluation.metrics.clone());
                record.history = evaluation.history;
                record.model_path = Some(evaluation.model_path.clone());
                record.folds = evaluation.folds;
                record.finished_at = Utc::now();
                let record_path = record.save(&self.project_results_dir())?;
                info!(
                    project = %self.project,
                    index,
                    model = %spec.model,
                    accuracy = evaluation.metrics.accuracy,
                    per_class_accuracy = evaluation.metrics.per_class_accuracy,
                    precision = evaluation.metrics.precision,
                    recall = evaluation.metrics.recall,
                    folds = record.folds.len(),
                    "Experiment completed"
                );
                Ok(ExperimentOutcome {
                    index,
                    model: spec.model,
                    metrics: evaluation.metrics,
                    model_path: evaluation.model_path,
                    record_path,
                })
            }
            Err(e) => {
                record.finished_at = Utc::now();
                if let Err(write_err) = record.save(&self.project_results_dir()) {
                    warn!(index, error = %write_err, "Failed to write failure record");
                }
                warn!(project = %self.project, index, error = %e, "Experiment failed");
                Err(e)
            }
        }
    }

    async fn evaluate(&self, index: usize, spec: &ExperimentSpec) -> Result<Evaluation, MlError> {
        match self.evaluation {
            EvaluationMode::Holdout => self.train_and_score(spec, &ExpandedConfig::new()).await,
            EvaluationMode::CrossValidation { splits } => {
                self.cross_validate(index, spec, splits).await
            }
        }
    }

    /// One fold per split, each saved under `<save_path>/fold_<k>`.
    async fn cross_validate(
        &self,
        index: usize,
        spec: &ExperimentSpec,
        splits: usize,
    ) -> Result<Evaluation, MlError> {
        let base_path = spec
            .train_parameters
            .get("save_path")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .ok_or_else(|| MlError::config("save_path must be a string path"))?;

        let mut folds = Vec::with_capacity(splits);
        for fold in 0..splits {
            let fold_path = base_path.join(format!("fold_{fold}"));
            let mut call = ExpandedConfig::new();
            call.insert("cv_index".into(), Value::from(fold));
            call.insert("cv_splits".into(), Value::from(splits));
            call.insert("which_set".into(), Value::from("val"));
            call.insert(
                "save_path".into(),
                Value::String(fold_path.to_string_lossy().into_owned()),
            );

            let evaluation = self.train_and_score(spec, &call).await?;
            info!(
                project = %self.project,
                index,
                fold,
                splits,
                accuracy = evaluation.metrics.accuracy,
                "Fold completed"
            );
            folds.push(FoldResult {
                fold,
                metrics: evaluation.metrics,
                history: evaluation.history,
                model_path: evaluation.model_path,
            });
        }

        let scores: Vec<MetricsReport> = folds.iter().map(|f| f.metrics.clone()).collect();
        Ok(Evaluation {
            metrics: MetricsReport::mean(&scores)?,
            history: None,
            model_path: base_path,
            folds,
        })
    }

    /// Fresh classifier: train, classify, score, save.
    async fn train_and_score(
        &self,
        spec: &ExperimentSpec,
        call: &ExpandedConfig,
    ) -> Result<Evaluation, MlError> {
        let params = &spec.train_parameters;
        let mut classifier: Box<dyn Classifier> =
            self.factory.create(&spec.modality, &spec.model, params)?;

        classifier.train(call).await?;
        let predictions = classifier.classify(call).await?;
        let labels = classifier.labels(call).await?;
        let metrics = MetricsReport::compute(&labels, &predictions)?;
        let model_path = classifier.save(call).await?;

        Ok(Evaluation {
            metrics,
            history: classifier.history().cloned(),
            model_path,
            folds: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{ClassifierRegistry, ConventionalDataReader, Fold, MockBackend, Set};
    use serde_json::json;

    fn params(value: Value) -> ExpandedConfig {
        value.as_object().cloned().unwrap()
    }

    fn runner(backend: MockBackend, root: &std::path::Path) -> ExperimentRunner {
        let registry = ClassifierRegistry::new(
            Arc::new(backend),
            Arc::new(ConventionalDataReader::new(root.join("data"))),
        );
        ExperimentRunner::new("unit", Arc::new(registry))
            .with_output(root.join("models"), root.join("results"))
    }

    #[test]
    fn test_add_grid_experiments_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(MockBackend::perfect(vec![0]), dir.path());
        runner.add_grid_experiments(
            "plant",
            "plant_dense",
            vec![params(json!({"epochs": 1})), params(json!({"epochs": 2}))],
        );
        runner.add_grid_experiments("plant", "plant_lstm", vec![params(json!({"epochs": 3}))]);
        assert_eq!(runner.len(), 3);
        let models: Vec<&str> = runner.experiments().iter().map(|s| s.model.as_str()).collect();
        assert_eq!(models, vec!["plant_dense", "plant_dense", "plant_lstm"]);
        assert_eq!(runner.experiments()[1].train_parameters["epochs"], json!(2));
    }

    #[test]
    fn test_save_path_injected_unless_set() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(MockBackend::perfect(vec![0]), dir.path());

        let spec = ExperimentSpec::new("plant", "plant_dense", ExpandedConfig::new());
        let effective = runner.effective_spec(4, &spec);
        let expected = dir.path().join("models").join("unit").join("plant_dense_4");
        assert_eq!(
            effective.train_parameters["save_path"],
            json!(expected.to_string_lossy())
        );

        let spec = ExperimentSpec::new(
            "plant",
            "plant_dense",
            params(json!({"save_path": "custom/location"})),
        );
        let effective = runner.effective_spec(4, &spec);
        assert_eq!(effective.train_parameters["save_path"], json!("custom/location"));
    }

    #[tokio::test]
    async fn test_empty_indices_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(MockBackend::perfect(vec![0]), dir.path());
        let summary = runner.run_all(&[]).await.unwrap();
        assert!(summary.is_empty());
        assert!(!dir.path().join("results").exists());
    }

    #[tokio::test]
    async fn test_index_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(MockBackend::perfect(vec![0]), dir.path());
        let err = runner.run_all(&[0]).await.unwrap_err();
        assert!(matches!(err, MlError::IndexOutOfBounds { index: 0, len: 0 }));
    }

    #[tokio::test]
    async fn test_unknown_model_writes_failure_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(MockBackend::perfect(vec![0]), dir.path());
        runner.add_grid_experiments("plant", "resnet", vec![ExpandedConfig::new()]);

        let err = runner.run_all(&[0]).await.unwrap_err();
        assert!(matches!(err, MlError::Config(_)));

        let record_path = dir
            .path()
            .join("results")
            .join("unit")
            .join(ExperimentRecord::file_name(0));
        let record = ExperimentRecord::load(&record_path).unwrap();
        assert_eq!(record.status, ExperimentStatus::Failed);
        assert!(record.metrics.is_none());
    }

    #[test]
    fn test_evaluation_mode_from_splits() {
        assert_eq!(EvaluationMode::from_splits(0), EvaluationMode::Holdout);
        assert_eq!(EvaluationMode::from_splits(1), EvaluationMode::Holdout);
        assert_eq!(
            EvaluationMode::from_splits(5),
            EvaluationMode::CrossValidation { splits: 5 }
        );
    }

    #[tokio::test]
    async fn test_cross_validation_trains_one_model_per_fold() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new(vec![0, 1, 1, 2], vec![0, 1, 2, 2]));
        let registry = ClassifierRegistry::new(
            backend.clone(),
            Arc::new(ConventionalDataReader::new(dir.path().join("data"))),
        );
        let mut runner = ExperimentRunner::new("unit", Arc::new(registry))
            .with_output(dir.path().join("models"), dir.path().join("results"))
            .with_evaluation(EvaluationMode::CrossValidation { splits: 3 });
        runner.add_grid_experiments("plant", "plant_dense", vec![params(json!({"epochs": 2}))]);

        let summary = runner.run_all(&[0]).await.unwrap();
        let base = dir.path().join("models").join("unit").join("plant_dense_0");
        assert_eq!(summary.completed[0].model_path, base);
        assert_eq!(summary.completed[0].metrics.accuracy, 0.75);

        let fits = backend.fit_requests();
        assert_eq!(fits.len(), 3);
        for (k, fit) in fits.iter().enumerate() {
            let fold = Some(Fold { index: k, splits: 3 });
            assert_eq!(fit.train.fold, fold);
            assert_eq!(fit.validation.fold, fold);
            assert_eq!(fit.validation.which_set, Set::Val);
        }
        assert_eq!(
            backend.saved_paths(),
            (0..3).map(|k| base.join(format!("fold_{k}"))).collect::<Vec<_>>()
        );

        let record_path = dir
            .path()
            .join("results")
            .join("unit")
            .join(ExperimentRecord::file_name(0));
        let record = ExperimentRecord::load(&record_path).unwrap();
        assert_eq!(record.status, ExperimentStatus::Completed);
        assert_eq!(record.folds.len(), 3);
        assert_eq!(record.folds[2].fold, 2);
        assert!(record.folds.iter().all(|f| f.history.is_some()));
        assert!(record.history.is_none());
        let metrics = record.metrics.unwrap();
        assert_eq!(metrics.accuracy, 0.75);
        assert_eq!(metrics.num_samples, 12);
    }

    #[tokio::test]
    async fn test_cross_validation_stops_at_failing_fold() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::perfect(vec![0, 1]).failing_fit(1));
        let registry = ClassifierRegistry::new(
            backend.clone(),
            Arc::new(ConventionalDataReader::new(dir.path().join("data"))),
        );
        let mut runner = ExperimentRunner::new("unit", Arc::new(registry))
            .with_output(dir.path().join("models"), dir.path().join("results"))
            .with_evaluation(EvaluationMode::from_splits(4));
        runner.add_grid_experiments("plant", "plant_lstm", vec![ExpandedConfig::new()]);

        let err = runner.run_all(&[0]).await.unwrap_err();
        assert!(matches!(err, MlError::Training(_)));
        assert_eq!(backend.fit_requests().len(), 2);

        let record_path = dir
            .path()
            .join("results")
            .join("unit")
            .join(ExperimentRecord::file_name(0));
        let record = ExperimentRecord::load(&record_path).unwrap();
        assert_eq!(record.status, ExperimentStatus::Failed);
        assert!(record.folds.is_empty());
    }
}
