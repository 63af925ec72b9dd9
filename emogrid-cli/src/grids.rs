//! Built-in experiment grids for the plant parameter study.

use emogrid_ml::{ExpandedConfig, ExperimentRunner, make_dictionaries};
use serde_json::{Value, json};

type Sweeps = Vec<(&'static str, Vec<Value>)>;

/// Options shared by every plant grid.
fn base() -> Value {
    json!({"epochs": 50, "patience": 10, "batch_size": 64})
}

/// Windowing, labelling and weighting sweeps appended to every plant grid.
fn data_sweeps() -> Sweeps {
    vec![
        ("label_mode", vec![json!("expected"), json!("faceapi")]),
        ("window", vec![json!(5), json!(10), json!(20)]),
        ("hop", vec![json!(5), json!(10)]),
        ("weighted", vec![json!(false), json!(true)]),
    ]
}

fn lr_sweep() -> (&'static str, Vec<Value>) {
    ("learning_rate", vec![json!(0.0003), json!(0.001)])
}

fn dropout_sweep() -> (&'static str, Vec<Value>) {
    ("dropout", vec![json!(0), json!(0.2)])
}

pub fn plant_lstm() -> Vec<ExpandedConfig> {
    let mut sweeps = vec![
        lr_sweep(),
        ("lstm_units", vec![json!(64), json!(256), json!(1024)]),
        ("lstm_layers", vec![json!(1), json!(2), json!(3)]),
        dropout_sweep(),
    ];
    sweeps.extend(data_sweeps());
    make_dictionaries(base(), sweeps)
}

pub fn plant_dense() -> Vec<ExpandedConfig> {
    let mut sweeps = vec![
        lr_sweep(),
        ("dense_units", vec![json!(1024), json!(4096)]),
        ("dense_layers", vec![json!(2), json!(4)]),
        dropout_sweep(),
    ];
    sweeps.extend(data_sweeps());
    make_dictionaries(base(), sweeps)
}

pub fn plant_mfcc_cnn() -> Vec<ExpandedConfig> {
    let mut sweeps = vec![
        lr_sweep(),
        ("conv_filters", vec![json!(64), json!(128)]),
        ("conv_layers", vec![json!(2), json!(3)]),
        ("conv_kernel_size", vec![json!(3), json!(5), json!(7)]),
        dropout_sweep(),
    ];
    sweeps.extend(data_sweeps());
    let mut base = base();
    base["preprocess"] = json!(false);
    make_dictionaries(base, sweeps)
}

/// Register the LSTM, dense and MFCC-CNN plant grids, in that order.
pub fn register_plant_grids(runner: &mut ExperimentRunner) {
    for (model, configs) in [
        ("plant_lstm", plant_lstm()),
        ("plant_dense", plant_dense()),
        ("plant_mfcc_cnn", plant_mfcc_cnn()),
    ] {
        runner.add_grid_experiments("plant", model, configs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grid_sizes() {
        assert_eq!(plant_lstm().len(), 864);
        assert_eq!(plant_dense().len(), 384);
        assert_eq!(plant_mfcc_cnn().len(), 1152);
    }

    #[test]
    fn test_last_declared_sweep_varies_fastest() {
        let configs = plant_lstm();
        assert_eq!(configs[0]["weighted"], json!(false));
        assert_eq!(configs[1]["weighted"], json!(true));
        assert_eq!(configs[0]["learning_rate"], configs[431]["learning_rate"]);
        assert_eq!(configs[432]["learning_rate"], json!(0.001));
    }

    #[test]
    fn test_first_dense_config() {
        let first = plant_dense().remove(0);
        assert_eq!(
            Value::Object(first),
            json!({
                "epochs": 50,
                "patience": 10,
                "batch_size": 64,
                "learning_rate": 0.0003,
                "dense_units": 1024,
                "dense_layers": 2,
                "dropout": 0,
                "label_mode": "expected",
                "window": 5,
                "hop": 5,
                "weighted": false,
            })
        );
    }

    #[test]
    fn test_mfcc_grid_disables_in_network_preprocessing() {
        assert!(
            plant_mfcc_cnn()
                .iter()
                .all(|c| c["preprocess"] == json!(false))
        );
    }
}
