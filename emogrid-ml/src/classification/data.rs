//! Data reader collaborator.
//!
//! The reader does not load samples itself. It describes the dataset a backend
//! should read (location, split, batching, emotion subset and the raw parameter
//! mapping for windowing/augmentation) and knows the input shape per modality.

use super::params::SeriesParameters;
use super::{Modality, Set};
use crate::config::DataConfig;
use crate::grid::ExpandedConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-batch mapping applied by the backend after reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetTransform {
    GrayscaleToRgb,
}

/// One cross-validation fold of the pooled train and validation recordings.
///
/// With a fold set, the training split is every other fold and the validation
/// split is fold `index`. The test split is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub splits: usize,
}

/// Description of one dataset split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub modality: Modality,
    pub root: PathBuf,
    pub which_set: Set,
    pub batch_size: usize,
    pub emotions: Vec<String>,
    /// Only the training split is shuffled.
    pub shuffle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<DatasetTransform>,
    /// Samples per second of time-series modalities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fold: Option<Fold>,
    pub parameters: ExpandedConfig,
}

impl DatasetSpec {
    pub fn with_transform(mut self, transform: Option<DatasetTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_fold(mut self, fold: Option<Fold>) -> Self {
        self.fold = fold;
        self
    }
}

pub trait DataReader: Send + Sync {
    /// Shape of a single input sample, without the batch dimension.
    fn input_shape(&self, modality: Modality, series: Option<&SeriesParameters>) -> Vec<usize>;

    fn emotion_data(
        &self,
        modality: Modality,
        emotions: &[&str],
        which_set: Set,
        batch_size: usize,
        parameters: &ExpandedConfig,
    ) -> DatasetSpec;
}

/// Reader for the `<data_dir>/<modality>/<split>` directory layout.
#[derive(Debug, Clone)]
pub struct ConventionalDataReader {
    data_dir: PathBuf,
    layout: DataConfig,
}

impl ConventionalDataReader {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            layout: DataConfig::default(),
        }
    }

    pub fn with_layout(mut self, layout: DataConfig) -> Self {
        self.layout = layout;
        self
    }

    fn sample_rate(&self, modality: Modality) -> Option<usize> {
        match modality {
            Modality::Image => None,
            Modality::Watch => Some(self.layout.watch_sample_rate),
            Modality::Plant => Some(self.layout.plant_sample_rate),
        }
    }
}

fn window_samples(series: Option<&SeriesParameters>, rate: usize) -> usize {
    let window = series.map(|s| s.window).unwrap_or_else(|| SeriesParameters::default().window);
    (window * rate as f64).round().max(1.0) as usize
}

impl DataReader for ConventionalDataReader {
    fn input_shape(&self, modality: Modality, series: Option<&SeriesParameters>) -> Vec<usize> {
        let layout = &self.layout;
        match modality {
            Modality::Image => vec![layout.image_size, layout.image_size, 1],
            Modality::Watch => vec![
                window_samples(series, layout.watch_sample_rate),
                layout.watch_channels,
            ],
            Modality::Plant => vec![window_samples(series, layout.plant_sample_rate), 1],
        }
    }

    fn emotion_data(
        &self,
        modality: Modality,
        emotions: &[&str],
        which_set: Set,
        batch_size: usize,
        parameters: &ExpandedConfig,
    ) -> DatasetSpec {
        DatasetSpec {
            modality,
            root: self.data_dir.join(modality.as_str()),
            which_set,
            batch_size,
            emotions: emotions.iter().map(|e| e.to_string()).collect(),
            shuffle: which_set == Set::Train,
            transform: None,
            sample_rate: self.sample_rate(modality),
            fold: None,
            parameters: parameters.clone(),
        }
    }
}
