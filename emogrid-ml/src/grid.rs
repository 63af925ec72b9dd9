//! Parameter grid expansion.
//!
//! A grid is a base configuration plus an ordered list of swept options. Expanding
//! it yields one [`ExpandedConfig`] per point of the Cartesian product of the
//! swept values. Enumeration is lexicographic in declaration order: the first
//! declared sweep varies slowest and the last declared sweep varies fastest.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A fully resolved configuration: option name to scalar value.
pub type ExpandedConfig = serde_json::Map<String, Value>;

/// One swept option and its candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub name: String,
    pub values: Vec<Value>,
}

/// Base options plus swept options, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub base: ExpandedConfig,
    pub sweeps: Vec<Sweep>,
}

impl ParameterGrid {
    pub fn new(base: ExpandedConfig) -> Self {
        Self {
            base,
            sweeps: Vec::new(),
        }
    }

    /// Declare a swept option.
    ///
    /// Declaring the same name twice replaces the earlier values but keeps the
    /// original position in the enumeration order.
    pub fn sweep<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        match self.sweeps.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.values = values,
            None => self.sweeps.push(Sweep {
                name: name.to_string(),
                values,
            }),
        }
        self
    }

    /// Number of configurations `expand` will produce.
    pub fn len(&self) -> usize {
        self.sweeps.iter().map(|s| s.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize every combination.
    pub fn expand(&self) -> Vec<ExpandedConfig> {
        let mut configs = vec![self.base.clone()];
        for sweep in &self.sweeps {
            let mut new_configs = Vec::with_capacity(configs.len() * sweep.values.len());
            for config in &configs {
                for value in &sweep.values {
                    let mut c = config.clone();
                    c.insert(sweep.name.clone(), value.clone());
                    new_configs.push(c);
                }
            }
            configs = new_configs;
        }
        configs
    }
}

/// Expand `base` over the swept options in the order they are given.
pub fn expand<I, K>(base: &ExpandedConfig, swept: I) -> Vec<ExpandedConfig>
where
    I: IntoIterator<Item = (K, Vec<Value>)>,
    K: AsRef<str>,
{
    swept
        .into_iter()
        .fold(ParameterGrid::new(base.clone()), |grid, (name, values)| {
            grid.sweep(name.as_ref(), values)
        })
        .expand()
}

/// Build the list of training dictionaries for one model family.
///
/// `base` must be a JSON object; anything else is treated as an empty base.
pub fn make_dictionaries<I, K>(base: Value, swept: I) -> Vec<ExpandedConfig>
where
    I: IntoIterator<Item = (K, Vec<Value>)>,
    K: AsRef<str>,
{
    let base = match base {
        Value::Object(map) => map,
        _ => ExpandedConfig::new(),
    };
    expand(&base, swept)
}
