//! emogrid CLI: runs this task's share of the plant parameter grid search.
//!
//! Invoked as `emogrid [TASK_ID] [NUM_TASKS]`; independent processes with
//! distinct task ids split the experiment list between them.

mod grids;

use anyhow::Context;
use clap::Parser;
use emogrid_ml::classification::{ConventionalDataReader, PythonBackend};
use emogrid_ml::{
    ClassifierRegistry, DeviceSelection, EvaluationMode, ExperimentRunner, HarnessConfig,
    PythonRuntime, TaskShard, load_config,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// emogrid: sharded grid search over emotion classifiers
#[derive(Parser, Debug)]
#[command(name = "emogrid", version, about, long_about = None)]
struct Cli {
    /// Index of this task (0-based)
    task_id: Option<usize>,

    /// Total number of tasks sharing the experiment list
    num_tasks: Option<usize>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Print this task's experiments without running them
    #[arg(long)]
    dry_run: bool,

    /// Print the merged configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Task assignment; both positionals are required to leave the single-task default.
    fn shard(&self) -> anyhow::Result<TaskShard> {
        match (self.task_id, self.num_tasks) {
            (Some(task_id), Some(num_tasks)) => {
                TaskShard::new(task_id, num_tasks).context("Invalid task assignment")
            }
            (Some(task_id), None) => {
                warn!(task_id, "NUM_TASKS missing, running as the only task");
                Ok(TaskShard::single())
            }
            _ => Ok(TaskShard::single()),
        }
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn build_runner(
    config: &HarnessConfig,
    workspace: &Path,
    device: DeviceSelection,
) -> ExperimentRunner {
    let models_dir = resolve(workspace, &config.paths.models_dir);
    let runtime = PythonRuntime::with_config(&config.python, workspace.to_path_buf(), device);
    let backend = PythonBackend::new(
        runtime,
        resolve(workspace, &config.python.backend_script),
        models_dir.join(".scratch"),
    );
    let reader = ConventionalDataReader::new(resolve(workspace, &config.paths.data_dir))
        .with_layout(config.data.clone());
    let registry = ClassifierRegistry::new(Arc::new(backend), Arc::new(reader));

    ExperimentRunner::new(&config.project, Arc::new(registry))
        .with_output(models_dir, resolve(workspace, &config.paths.results_dir))
        .with_evaluation(EvaluationMode::from_splits(config.evaluation.cv_splits))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "emogrid", "emogrid")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "emogrid.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .with_context(|| format!("Workspace not found: {}", cli.workspace.display()))?;

    let config = load_config(Some(&workspace), cli.config.as_deref())
        .context("Configuration error")?;

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let shard = cli.shard()?;
    let device = DeviceSelection::for_task(shard.task_id(), config.device.accelerators);
    info!(
        project = %config.project,
        task_id = shard.task_id(),
        num_tasks = shard.num_tasks(),
        %device,
        "Starting task"
    );

    let mut runner = build_runner(&config, &workspace, device);
    grids::register_plant_grids(&mut runner);

    let indices = shard.indices(runner.len());
    println!(
        "Running {} out of {} experiments.",
        indices.len(),
        runner.len()
    );

    if cli.dry_run {
        for &index in &indices {
            let spec = &runner.experiments()[index];
            println!(
                "{index:>5}  {}/{}  {}",
                spec.modality,
                spec.model,
                serde_json::Value::Object(spec.train_parameters.clone())
            );
        }
        return Ok(());
    }

    let summary = runner
        .run_all(&indices)
        .await
        .context("Experiment run aborted")?;
    info!(
        project = %summary.project,
        completed = summary.len(),
        "All assigned experiments finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_positionals_select_shard() {
        let cli = Cli::try_parse_from(["emogrid", "3", "8"]).unwrap();
        let shard = cli.shard().unwrap();
        assert_eq!((shard.task_id(), shard.num_tasks()), (3, 8));
    }

    #[test]
    fn test_missing_positionals_default_to_single_task() {
        let cli = Cli::try_parse_from(["emogrid"]).unwrap();
        assert_eq!(cli.shard().unwrap(), TaskShard::single());

        let cli = Cli::try_parse_from(["emogrid", "5"]).unwrap();
        assert_eq!(cli.shard().unwrap(), TaskShard::single());
    }

    #[test]
    fn test_non_integer_task_id_is_parse_error() {
        assert!(Cli::try_parse_from(["emogrid", "first", "2"]).is_err());
    }

    #[test]
    fn test_task_id_out_of_range_fails() {
        let cli = Cli::try_parse_from(["emogrid", "4", "4"]).unwrap();
        assert!(cli.shard().is_err());
    }

    #[test]
    fn test_options() {
        let cli = Cli::try_parse_from([
            "emogrid", "-vv", "--dry-run", "-c", "grid.toml", "-w", "/tmp", "0", "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.dry_run);
        assert_eq!(cli.config, Some(PathBuf::from("grid.toml")));
        assert_eq!(cli.workspace, PathBuf::from("/tmp"));
        assert!(!cli.print_config);

        let cli = Cli::try_parse_from(["emogrid", "--print-config"]).unwrap();
        assert!(cli.print_config);
        assert_eq!(cli.task_id, None);
    }

    #[test]
    fn test_printed_config_lists_data_and_evaluation() {
        let mut config = HarnessConfig::default();
        config.evaluation.cv_splits = 5;
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("plant_sample_rate = 10000"));
        assert!(text.contains("cv_splits = 5"));
    }

    #[test]
    fn test_cv_splits_select_evaluation_mode() {
        let mut config = HarnessConfig::default();
        let runner = build_runner(&config, Path::new("/srv/emogrid"), DeviceSelection::default());
        assert_eq!(runner.evaluation(), EvaluationMode::Holdout);

        config.evaluation.cv_splits = 5;
        let runner = build_runner(&config, Path::new("/srv/emogrid"), DeviceSelection::default());
        assert_eq!(
            runner.evaluation(),
            EvaluationMode::CrossValidation { splits: 5 }
        );
    }

    #[test]
    fn test_relative_paths_resolve_against_workspace() {
        let ws = Path::new("/srv/emogrid");
        assert_eq!(resolve(ws, Path::new("models")), PathBuf::from("/srv/emogrid/models"));
        assert_eq!(resolve(ws, Path::new("/data")), PathBuf::from("/data"));
    }

    #[test]
    fn test_plant_grids_registered_in_order() {
        let config = HarnessConfig::default();
        let mut runner = build_runner(&config, Path::new("/srv/emogrid"), DeviceSelection::default());
        grids::register_plant_grids(&mut runner);
        assert_eq!(runner.len(), 2400);
        assert_eq!(runner.experiments()[0].model, "plant_lstm");
        assert_eq!(runner.experiments()[864].model, "plant_dense");
        assert_eq!(runner.experiments()[864 + 384].model, "plant_mfcc_cnn");
    }
}
