//! # emogrid-ml: grid-search experiments for emotion classifiers
//!
//! Enumerates hyperparameter grids into an ordered experiment list, selects
//! the slice of that list a task owns, and runs each selected experiment:
//! build the classifier, train it, classify the test split, score the
//! predictions and persist model plus result record. Experiments are scored on a
//! held-out split or by k-fold cross-validation.
//!
//! Training and inference are delegated to a [`classification::TrainingBackend`];
//! the production backend drives a Python worker through [`PythonRuntime`].

// Foundation
pub mod config;
pub mod error;
pub mod runtime;

// Experiment enumeration and selection
pub mod grid;
pub mod shard;

// Classifiers and evaluation
pub mod classification;
pub mod history;
pub mod metrics;

// Execution
pub mod device;
pub mod experiment;
pub mod runner;

// Re-exports
pub use classification::{Classifier, ClassifierFactory, ClassifierRegistry, Modality};
pub use config::{DataConfig, EvaluationConfig, HarnessConfig, load_config};
pub use device::DeviceSelection;
pub use error::MlError;
pub use experiment::{ExperimentRecord, ExperimentSpec, ExperimentStatus, FoldResult};
pub use grid::{ExpandedConfig, ParameterGrid, expand, make_dictionaries};
pub use metrics::{ConfusionMatrix, MetricsReport};
pub use runner::{EvaluationMode, ExperimentOutcome, ExperimentRunner, RunSummary};
pub use runtime::PythonRuntime;
pub use shard::TaskShard;
