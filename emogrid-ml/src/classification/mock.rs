//! In-process backend with scripted answers, for tests and dry runs.

use super::backend::{FitReport, FitRequest, ModelHandle, TrainingBackend};
use super::data::DatasetSpec;
use crate::error::MlError;
use crate::history::TrainingHistory;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Backend that predicts a fixed sequence of classes and records every request.
pub struct MockBackend {
    labels: Vec<usize>,
    predictions: Vec<usize>,
    num_classes: usize,
    loss: Vec<f64>,
    fail_on_fit: Option<usize>,
    fits: Mutex<Vec<FitRequest>>,
    saved: Mutex<Vec<PathBuf>>,
}

impl MockBackend {
    pub fn new(labels: Vec<usize>, predictions: Vec<usize>) -> Self {
        let num_classes = labels
            .iter()
            .chain(&predictions)
            .max()
            .map_or(1, |m| m + 1);
        Self {
            labels,
            predictions,
            num_classes,
            loss: vec![1.2, 0.9, 0.7],
            fail_on_fit: None,
            fits: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Perfect predictions over `labels`.
    pub fn perfect(labels: Vec<usize>) -> Self {
        Self::new(labels.clone(), labels)
    }

    pub fn with_loss(mut self, loss: Vec<f64>) -> Self {
        self.loss = loss;
        self
    }

    /// Fail the `n`th fit request (0-based).
    pub fn failing_fit(mut self, n: usize) -> Self {
        self.fail_on_fit = Some(n);
        self
    }

    pub fn fit_requests(&self) -> Vec<FitRequest> {
        self.fits.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TrainingBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fit(&self, request: &FitRequest) -> Result<FitReport, MlError> {
        let mut fits = self.fits.lock().unwrap_or_else(|e| e.into_inner());
        let n = fits.len();
        fits.push(request.clone());
        if self.fail_on_fit == Some(n) {
            return Err(MlError::training(format!("scripted failure on fit {n}")));
        }
        let epochs = self.loss.len().min(request.epochs);
        Ok(FitReport {
            model: ModelHandle {
                id: format!("mock-{n}"),
                path: PathBuf::from(format!("scratch/{}-{n}", request.model)),
            },
            history: TrainingHistory::from_losses(&self.loss[..epochs], &[]),
        })
    }

    async fn predict(
        &self,
        _model: &ModelHandle,
        _dataset: &DatasetSpec,
    ) -> Result<Vec<Vec<f32>>, MlError> {
        Ok(self
            .predictions
            .iter()
            .map(|&class| {
                let mut row = vec![0.0; self.num_classes];
                row[class] = 1.0;
                row
            })
            .collect())
    }

    async fn labels(&self, _dataset: &DatasetSpec) -> Result<Vec<usize>, MlError> {
        Ok(self.labels.clone())
    }

    async fn save(&self, _model: &ModelHandle, path: &Path) -> Result<(), MlError> {
        tokio::fs::create_dir_all(path).await?;
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_path_buf());
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<ModelHandle, MlError> {
        if !path.exists() {
            return Err(MlError::backend(format!("no saved model at {}", path.display())));
        }
        Ok(ModelHandle {
            id: "mock-loaded".to_string(),
            path: path.to_path_buf(),
        })
    }
}
