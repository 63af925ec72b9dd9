//! Harness configuration.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> environment -> explicit file. The workspace file lives at
//! `.emogrid/config.toml`; environment keys use the `EMOGRID_` prefix with `__`
//! as the section separator (e.g. `EMOGRID_PYTHON__TIMEOUT_SECS`).

use crate::error::MlError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Project name used for output sub-directories and log fields.
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            paths: PathsConfig::default(),
            python: PythonConfig::default(),
            device: DeviceConfig::default(),
            data: DataConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

fn default_project() -> String {
    "plant_parameters".to_string()
}

/// Output and input locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory for saved models.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    /// Root directory for per-experiment result records.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Root directory of the prepared datasets.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            results_dir: default_results_dir(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("experiments/results")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Python training backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Path to Python executable.
    #[serde(default = "default_python_path")]
    pub python_path: PathBuf,
    /// Path to virtual environment (auto-detected if not set).
    #[serde(default)]
    pub venv_path: Option<PathBuf>,
    /// Script that executes backend requests.
    #[serde(default = "default_backend_script")]
    pub backend_script: PathBuf,
    /// Timeout for a single backend request (seconds).
    #[serde(default = "default_python_timeout")]
    pub timeout_secs: u64,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            python_path: default_python_path(),
            venv_path: None,
            backend_script: default_backend_script(),
            timeout_secs: default_python_timeout(),
        }
    }
}

fn default_python_path() -> PathBuf {
    PathBuf::from("python3")
}

fn default_backend_script() -> PathBuf {
    PathBuf::from("scripts/emogrid_backend.py")
}

fn default_python_timeout() -> u64 {
    48 * 3600
}

/// Accelerator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Number of visible accelerators on this host.
    #[serde(default)]
    pub accelerators: usize,
}

/// Sample layout of the prepared datasets.
///
/// The defaults match the recording setup: 48x48 grayscale face crops, watch
/// sensors resampled to 10 Hz over five channels (heart rate, three
/// acceleration axes, skin temperature) and plant potentials sampled at 10 kHz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_image_size")]
    pub image_size: usize,
    /// Watch samples per second.
    #[serde(default = "default_watch_sample_rate")]
    pub watch_sample_rate: usize,
    #[serde(default = "default_watch_channels")]
    pub watch_channels: usize,
    /// Plant samples per second.
    #[serde(default = "default_plant_sample_rate")]
    pub plant_sample_rate: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            image_size: default_image_size(),
            watch_sample_rate: default_watch_sample_rate(),
            watch_channels: default_watch_channels(),
            plant_sample_rate: default_plant_sample_rate(),
        }
    }
}

fn default_image_size() -> usize {
    48
}

fn default_watch_sample_rate() -> usize {
    10
}

fn default_watch_channels() -> usize {
    5
}

fn default_plant_sample_rate() -> usize {
    10_000
}

/// How each experiment is scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of cross-validation folds; 1 scores a single model on the held-out test split.
    #[serde(default = "default_cv_splits")]
    pub cv_splits: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            cv_splits: default_cv_splits(),
        }
    }
}

fn default_cv_splits() -> usize {
    1
}

impl HarnessConfig {
    pub fn to_toml_string(&self) -> Result<String, MlError> {
        toml::to_string_pretty(self).map_err(|e| MlError::config(e.to_string()))
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit config file
/// 2. Environment variables (prefixed with `EMOGRID_`)
/// 3. Workspace-local config (`.emogrid/config.toml`)
/// 4. User config (`~/.config/emogrid/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<HarnessConfig, MlError> {
    let mut figment = Figment::from(Serialized::defaults(HarnessConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "emogrid", "emogrid") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".emogrid").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    figment = figment.merge(Env::prefixed("EMOGRID_").split("__"));

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(MlError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment.extract().map_err(|e| MlError::from(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.project, "plant_parameters");
        assert_eq!(config.paths.models_dir, PathBuf::from("models"));
        assert_eq!(config.python.python_path, PathBuf::from("python3"));
        assert_eq!(config.device.accelerators, 0);
        assert_eq!(config.data.plant_sample_rate, 10_000);
        assert_eq!(config.evaluation.cv_splits, 1);
    }

    #[test]
    fn test_data_layout_and_folds_from_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "grid.toml",
                r#"
                [data]
                plant_sample_rate = 1000

                [evaluation]
                cv_splits = 5
                "#,
            )?;
            let config = load_config(None, Some(&jail.directory().join("grid.toml"))).unwrap();
            assert_eq!(config.data.plant_sample_rate, 1000);
            assert_eq!(config.data.watch_channels, 5);
            assert_eq!(config.evaluation.cv_splits, 5);
            Ok(())
        });
    }

    #[test]
    fn test_workspace_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir(".emogrid")?;
            jail.create_file(
                ".emogrid/config.toml",
                r#"
                project = "watch_sweep"

                [device]
                accelerators = 2
                "#,
            )?;
            let config = load_config(Some(jail.directory()), None).unwrap();
            assert_eq!(config.project, "watch_sweep");
            assert_eq!(config.device.accelerators, 2);
            assert_eq!(config.python.timeout_secs, 48 * 3600);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_workspace_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir(".emogrid")?;
            jail.create_file(".emogrid/config.toml", "project = \"from_file\"")?;
            jail.set_env("EMOGRID_PROJECT", "from_env");
            jail.set_env("EMOGRID_PYTHON__TIMEOUT_SECS", "60");
            let config = load_config(Some(jail.directory()), None).unwrap();
            assert_eq!(config.project, "from_env");
            assert_eq!(config.python.timeout_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let err = load_config(None, Some(Path::new("/nonexistent/emogrid.toml"))).unwrap_err();
        assert!(matches!(err, MlError::Config(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let text = HarnessConfig::default().to_toml_string().unwrap();
        let parsed: HarnessConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.paths.results_dir, PathBuf::from("experiments/results"));
        assert_eq!(parsed.data, DataConfig::default());
        assert!(text.contains("[evaluation]"));
    }
}
