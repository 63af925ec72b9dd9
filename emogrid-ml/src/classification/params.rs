//! Typed training parameters.
//!
//! A parameter mapping is checked against the keys the target classifier accepts
//! (training keys, window keys for time-series modalities, and the model's own
//! keys) and then deserialized into typed structs. Unknown keys and mistyped
//! values are configuration errors.

use super::data::Fold;
use super::{Modality, Set};
use crate::error::MlError;
use crate::grid::ExpandedConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::path::PathBuf;

/// Keys shared by every classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParameters {
    pub epochs: usize,
    pub patience: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Weight the loss by inverse class frequency.
    pub weighted: bool,
    /// Balance the training split by undersampling.
    pub balanced: bool,
    pub augment: bool,
    pub save_path: Option<PathBuf>,
    pub which_set: Set,
    /// Held-out fold; unset trains on the fixed train/val splits.
    pub cv_index: Option<usize>,
    pub cv_splits: usize,
}

impl Default for TrainingParameters {
    fn default() -> Self {
        Self {
            epochs: 20,
            patience: 5,
            batch_size: 64,
            learning_rate: 0.0003,
            weighted: false,
            balanced: false,
            augment: false,
            save_path: None,
            which_set: Set::Test,
            cv_index: None,
            cv_splits: 5,
        }
    }
}

impl TrainingParameters {
    pub const KEYS: &'static [&'static str] = &[
        "epochs",
        "patience",
        "batch_size",
        "learning_rate",
        "weighted",
        "balanced",
        "augment",
        "save_path",
        "which_set",
        "cv_index",
        "cv_splits",
    ];

    /// Cross-validation fold selected by `cv_index`.
    pub fn fold(&self) -> Option<Fold> {
        self.cv_index.map(|index| Fold {
            index,
            splits: self.cv_splits,
        })
    }

    fn validate(&self) -> Result<(), MlError> {
        if self.epochs == 0 {
            return Err(MlError::config("epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(MlError::config("batch_size must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(MlError::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.cv_splits < 2 {
            return Err(MlError::config(format!(
                "cv_splits must be at least 2, got {}",
                self.cv_splits
            )));
        }
        if let Some(index) = self.cv_index
            && index >= self.cv_splits
        {
            return Err(MlError::config(format!(
                "cv_index {index} must be smaller than cv_splits {}",
                self.cv_splits
            )));
        }
        Ok(())
    }
}

/// Which annotation is used as the ground-truth emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    /// The emotion the stimulus was expected to evoke.
    #[default]
    Expected,
    /// The emotion detected on the participant's face.
    Faceapi,
    /// Samples where both annotations agree.
    Both,
}

/// Windowing of time-series modalities. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesParameters {
    pub window: f64,
    pub hop: f64,
    pub label_mode: LabelMode,
}

impl Default for SeriesParameters {
    fn default() -> Self {
        Self {
            window: 20.0,
            hop: 10.0,
            label_mode: LabelMode::Expected,
        }
    }
}

impl SeriesParameters {
    pub const KEYS: &'static [&'static str] = &["window", "hop", "label_mode"];

    fn validate(&self) -> Result<(), MlError> {
        if !(self.window > 0.0 && self.hop > 0.0) {
            return Err(MlError::config(format!(
                "window and hop must be positive, got window={} hop={}",
                self.window, self.hop
            )));
        }
        Ok(())
    }
}

/// Options specific to one model.
pub trait ModelConfig: DeserializeOwned + Default + Debug + Clone + Send + Sync {
    const KEYS: &'static [&'static str];

    fn validate(&self) -> Result<(), MlError> {
        Ok(())
    }
}

/// A parameter mapping after validation.
#[derive(Debug, Clone)]
pub struct ResolvedParameters<C> {
    pub training: TrainingParameters,
    pub series: Option<SeriesParameters>,
    pub model: C,
    /// The merged mapping, forwarded verbatim to the data pipeline.
    pub raw: ExpandedConfig,
}

/// Overlay `overrides` on `base` and validate the result for `model`.
pub fn resolve<C: ModelConfig>(
    model: &str,
    modality: Modality,
    base: &ExpandedConfig,
    overrides: &ExpandedConfig,
) -> Result<ResolvedParameters<C>, MlError> {
    let mut raw = base.clone();
    raw.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    let accepts = |key: &str| {
        TrainingParameters::KEYS.contains(&key)
            || C::KEYS.contains(&key)
            || (modality.is_series() && SeriesParameters::KEYS.contains(&key))
    };
    let mut unknown: Vec<&str> = raw.keys().map(String::as_str).filter(|k| !accepts(k)).collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(MlError::config(format!(
            "unknown parameter(s) for {model}: {}",
            unknown.join(", ")
        )));
    }

    let value = Value::Object(raw.clone());
    let training: TrainingParameters = parse(model, &value)?;
    training.validate()?;
    let series = if modality.is_series() {
        let series: SeriesParameters = parse(model, &value)?;
        series.validate()?;
        Some(series)
    } else {
        None
    };
    let config: C = parse(model, &value)?;
    config.validate()?;

    Ok(ResolvedParameters {
        training,
        series,
        model: config,
        raw,
    })
}

fn parse<T: DeserializeOwned>(model: &str, value: &Value) -> Result<T, MlError> {
    T::deserialize(value).map_err(|e| MlError::config(format!("invalid parameter for {model}: {e}")))
}

/// Shared check for dropout options.
pub(crate) fn check_dropout(rate: f64) -> Result<(), MlError> {
    if (0.0..1.0).contains(&rate) {
        Ok(())
    } else {
        Err(MlError::config(format!("dropout must be in [0, 1), got {rate}")))
    }
}
