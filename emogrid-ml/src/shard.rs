//! Modulo partitioning of experiment indices across worker tasks.

use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// The slice of experiments assigned to one worker task.
///
/// Task `t` of `n` owns every index `i` with `i % n == t`. Across all task ids the
/// shards partition `0..total` with no overlap and no omission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawShard")]
pub struct TaskShard {
    task_id: usize,
    num_tasks: usize,
}

#[derive(Deserialize)]
struct RawShard {
    task_id: usize,
    num_tasks: usize,
}

impl TryFrom<RawShard> for TaskShard {
    type Error = MlError;

    fn try_from(raw: RawShard) -> Result<Self, Self::Error> {
        Self::new(raw.task_id, raw.num_tasks)
    }
}

impl TaskShard {
    pub fn new(task_id: usize, num_tasks: usize) -> Result<Self, MlError> {
        if num_tasks == 0 {
            return Err(MlError::config("num_tasks must be at least 1"));
        }
        if task_id >= num_tasks {
            return Err(MlError::config(format!(
                "task_id {task_id} must be smaller than num_tasks {num_tasks}"
            )));
        }
        Ok(Self { task_id, num_tasks })
    }

    /// The single-task default: one worker owning every experiment.
    pub fn single() -> Self {
        Self {
            task_id: 0,
            num_tasks: 1,
        }
    }

    pub fn task_id(&self) -> usize {
        self.task_id
    }

    pub fn num_tasks(&self) -> usize {
        self.num_tasks
    }

    /// Ascending indices of `0..total` owned by this task.
    pub fn indices(&self, total: usize) -> Vec<usize> {
        (self.task_id..total).step_by(self.num_tasks).collect()
    }

    pub fn len(&self, total: usize) -> usize {
        if self.task_id >= total {
            0
        } else {
            (total - self.task_id).div_ceil(self.num_tasks)
        }
    }
}

impl Default for TaskShard {
    fn default() -> Self {
        Self::single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_task_owns_everything() {
        let shard = TaskShard::single();
        assert_eq!(shard.indices(5), vec![0, 1, 2, 3, 4]);
        assert!(shard.indices(0).is_empty());
    }

    #[test]
    fn test_modulo_slices() {
        assert_eq!(TaskShard::new(0, 3).unwrap().indices(8), vec![0, 3, 6]);
        assert_eq!(TaskShard::new(1, 3).unwrap().indices(8), vec![1, 4, 7]);
        assert_eq!(TaskShard::new(2, 3).unwrap().indices(8), vec![2, 5]);
    }

    #[test]
    fn test_more_tasks_than_experiments() {
        let shard = TaskShard::new(4, 6).unwrap();
        assert!(shard.indices(3).is_empty());
        assert_eq!(shard.len(3), 0);
    }

    #[test]
    fn test_len_matches_indices() {
        for total in 0..20 {
            for num_tasks in 1..6 {
                for task_id in 0..num_tasks {
                    let shard = TaskShard::new(task_id, num_tasks).unwrap();
                    assert_eq!(shard.len(total), shard.indices(total).len());
                }
            }
        }
    }

    #[test]
    fn test_rejects_task_id_out_of_range() {
        let err = TaskShard::new(2, 2).unwrap_err();
        assert!(matches!(err, MlError::Config(_)));
    }

    #[test]
    fn test_rejects_zero_tasks() {
        assert!(matches!(TaskShard::new(0, 0), Err(MlError::Config(_))));
    }

    #[test]
    fn test_deserialize_validates_assignment() {
        let shard: TaskShard = serde_json::from_value(json!({"task_id": 1, "num_tasks": 3})).unwrap();
        assert_eq!(shard.indices(8), vec![1, 4, 7]);

        let err = serde_json::from_value::<TaskShard>(json!({"task_id": 7, "num_tasks": 2}))
            .unwrap_err();
        assert!(err.to_string().contains("task_id 7"));
        assert!(serde_json::from_value::<TaskShard>(json!({"task_id": 3, "num_tasks": 0})).is_err());
    }
}
