//! Managed Python subprocess execution.
//!
//! The training framework runs in a Python process. Each request is one process:
//! the request is written as JSON to stdin, the response is read as JSON from stdout.

use crate::config::PythonConfig;
use crate::device::DeviceSelection;
use crate::error::MlError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Managed Python subprocess runner.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python_path: PathBuf,
    venv_path: Option<PathBuf>,
    workspace: PathBuf,
    timeout: Duration,
    device: DeviceSelection,
}

impl PythonRuntime {
    pub fn with_config(config: &PythonConfig, workspace: PathBuf, device: DeviceSelection) -> Self {
        Self {
            python_path: config.python_path.clone(),
            venv_path: config.venv_path.clone().or_else(detect_venv),
            workspace,
            timeout: Duration::from_secs(config.timeout_secs),
            device,
        }
    }

    pub fn device(&self) -> DeviceSelection {
        self.device
    }

    /// Get the effective Python command (accounting for venv).
    fn python_cmd(&self) -> PathBuf {
        if let Some(venv) = &self.venv_path {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.python_path.clone()
        }
    }

    /// Run `script action` with `input` on stdin and parse stdout as JSON.
    pub async fn run_json(
        &self,
        script: &Path,
        action: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, MlError> {
        let payload = serde_json::to_vec(input)?;
        debug!(
            script = %script.display(),
            action,
            device = %self.device,
            "Running Python backend request"
        );

        let result = tokio::time::timeout(self.timeout, async {
            let mut child = Command::new(self.python_cmd())
                .arg(script)
                .arg(action)
                .envs(self.device.env_vars())
                .current_dir(&self.workspace)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| MlError::Python(format!("Failed to spawn Python: {e}")))?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await?;
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| MlError::Python(format!("Failed to wait for Python: {e}")))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(MlError::Python(format!(
                    "Backend request '{action}' failed (exit {}): {}",
                    output.status,
                    stderr.trim()
                )));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            // The framework may print progress before the response; the response is the last line.
            let last_line = stdout.lines().rev().find(|l| !l.trim().is_empty());
            match last_line {
                None => Ok(serde_json::Value::Null),
                Some(line) => serde_json::from_str(line.trim())
                    .map_err(|e| MlError::Python(format!("Invalid JSON output: {e}"))),
            }
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(MlError::Timeout(format!(
                "Backend request '{action}' timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Detect a virtual environment in common locations.
fn detect_venv() -> Option<PathBuf> {
    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        let path = PathBuf::from(venv);
        if path.exists() {
            return Some(path);
        }
    }

    [".venv", "venv"]
        .iter()
        .map(PathBuf::from)
        .find(|path| path.join("pyvenv.cfg").exists())
}
