//! Accelerator selection for a worker task.
//!
//! Selection is computed once at startup and handed to the training backend,
//! which applies it to the environment of each framework process it launches.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeviceSelection {
    /// Leave device visibility to the framework.
    #[default]
    FrameworkDefault,
    /// Expose only the given accelerator, with memory growth disabled.
    Accelerator { index: usize },
}

impl DeviceSelection {
    /// Pick the accelerator for `task_id` given the number of visible accelerators.
    ///
    /// With exactly two accelerators, even tasks run on accelerator 1 and odd tasks
    /// on accelerator 0. Any other count keeps the framework default.
    pub fn for_task(task_id: usize, accelerators: usize) -> Self {
        if accelerators != 2 {
            return Self::FrameworkDefault;
        }
        let index = if task_id % 2 == 0 { 1 } else { 0 };
        Self::Accelerator { index }
    }

    /// Environment variables a framework process needs to honour this selection.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::FrameworkDefault => Vec::new(),
            Self::Accelerator { index } => vec![
                ("CUDA_VISIBLE_DEVICES", index.to_string()),
                ("TF_FORCE_GPU_ALLOW_GROWTH", "false".to_string()),
            ],
        }
    }
}

impl std::fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FrameworkDefault => write!(f, "framework default"),
            Self::Accelerator { index } => write!(f, "accelerator {index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_accelerators_alternate() {
        assert_eq!(
            DeviceSelection::for_task(0, 2),
            DeviceSelection::Accelerator { index: 1 }
        );
        assert_eq!(
            DeviceSelection::for_task(1, 2),
            DeviceSelection::Accelerator { index: 0 }
        );
        assert_eq!(
            DeviceSelection::for_task(6, 2),
            DeviceSelection::Accelerator { index: 1 }
        );
    }

    #[test]
    fn test_other_counts_use_framework_default() {
        for accelerators in [0, 1, 3, 8] {
            assert_eq!(
                DeviceSelection::for_task(1, accelerators),
                DeviceSelection::FrameworkDefault
            );
        }
    }

    #[test]
    fn test_env_vars() {
        assert!(DeviceSelection::FrameworkDefault.env_vars().is_empty());
        let vars = DeviceSelection::Accelerator { index: 0 }.env_vars();
        assert_eq!(vars[0], ("CUDA_VISIBLE_DEVICES", "0".to_string()));
        assert_eq!(vars[1], ("TF_FORCE_GPU_ALLOW_GROWTH", "false".to_string()));
    }
}
