use crate::cli::{GraphArgs, PredictArgs};
use crate::error::{CliError, Result};
use megnet::core::graph::expansion::GaussianExpansion;
use megnet::model::config::MegnetConfig;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_SEED: u64 = 42;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialConverterConfig {
    #[serde(rename = "element-types")]
    element_types: Option<Vec<String>>,
    cutoff: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialExpansionConfig {
    initial: Option<f64>,
    #[serde(rename = "final")]
    final_: Option<f64>,
    #[serde(rename = "num-centers")]
    num_centers: Option<usize>,
    width: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialNormalizationConfig {
    #[serde(rename = "data-mean")]
    data_mean: Option<f64>,
    #[serde(rename = "data-std")]
    data_std: Option<f64>,
}

/// The CLI configuration file as written by the user; every table is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialMegnetConfig {
    model: Option<MegnetConfig>,
    converter: Option<PartialConverterConfig>,
    expansion: Option<PartialExpansionConfig>,
    normalization: Option<PartialNormalizationConfig>,
}

/// Fully resolved settings for the `predict` command.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSettings {
    pub model: MegnetConfig,
    pub expansion: GaussianExpansion,
    pub seed: u64,
}

/// Fully resolved settings for the `graph` command.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSettings {
    /// `None` lets the structure's own elements define the node types.
    pub element_types: Option<Vec<String>>,
    pub cutoff: f64,
}

impl PartialMegnetConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolves the converter settings; CLI arguments win over the file, and the
    /// `[converter]` table wins over `[model]`.
    pub fn merge_graph_args(self, args: &GraphArgs) -> Result<GraphSettings> {
        let converter = self.converter.unwrap_or_default();
        let model = self.model.unwrap_or_default();

        let element_types = if !args.element_types.is_empty() {
            Some(args.element_types.clone())
        } else if let Some(types) = converter.element_types {
            Some(types)
        } else if !model.element_types.is_empty() {
            Some(model.element_types)
        } else {
            None
        };

        let cutoff = args.cutoff.or(converter.cutoff).unwrap_or(model.cutoff);
        validate_cutoff(cutoff)?;
        Ok(GraphSettings {
            element_types,
            cutoff,
        })
    }

    pub fn merge_predict_args(mut self, args: &PredictArgs) -> Result<PredictionSettings> {
        self.apply_set_values(&args.set_values)?;

        let mut model = self.model.unwrap_or_default();
        let converter = self.converter.unwrap_or_default();
        let expansion = self.expansion.unwrap_or_default();
        let normalization = self.normalization.unwrap_or_default();

        if let Some(types) = converter.element_types {
            model.element_types = types;
        }
        if model.element_types.is_empty() {
            return Err(CliError::Config(
                "Element types are required in `[converter]` or `[model]` to assign node types.".to_string(),
            ));
        }
        model.num_node_types.get_or_insert(model.element_types.len());

        model.cutoff = args.cutoff.or(converter.cutoff).unwrap_or(model.cutoff);
        validate_cutoff(model.cutoff)?;

        if let Some(mean) = normalization.data_mean {
            model.data_mean = mean;
        }
        if let Some(std) = normalization.data_std {
            model.data_std = std;
        }

        let defaults = GaussianExpansion::default();
        let expansion = GaussianExpansion::new(
            expansion.initial.unwrap_or(defaults.initial),
            expansion.final_.unwrap_or(model.cutoff),
            expansion.num_centers.unwrap_or(model.edge_embedding_dim),
            expansion.width.unwrap_or(defaults.width),
        );

        Ok(PredictionSettings {
            model,
            expansion,
            seed: args.seed.unwrap_or(DEFAULT_SEED),
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            let float = || {
                value_str.parse::<f64>().map_err(|_| {
                    CliError::Config(format!("Invalid float value for {}: {}", key, value_str))
                })
            };
            let integer = || {
                value_str.parse::<usize>().map_err(|_| {
                    CliError::Config(format!("Invalid integer value for {}: {}", key, value_str))
                })
            };

            match key {
                "converter.cutoff" => {
                    self.converter.get_or_insert_with(Default::default).cutoff = Some(float()?);
                }
                "expansion.width" => {
                    self.expansion.get_or_insert_with(Default::default).width = Some(float()?);
                }
                "expansion.num-centers" => {
                    self.expansion.get_or_insert_with(Default::default).num_centers = Some(integer()?);
                }
                "normalization.data-mean" => {
                    self.normalization.get_or_insert_with(Default::default).data_mean = Some(float()?);
                }
                "normalization.data-std" => {
                    self.normalization.get_or_insert_with(Default::default).data_std = Some(float()?);
                }
                "model.act" => {
                    self.model.get_or_insert_with(Default::default).act = value_str.to_string();
                }
                "model.num-blocks" => {
                    self.model.get_or_insert_with(Default::default).num_blocks = integer()?;
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_cutoff(cutoff: f64) -> Result<()> {
    if cutoff > 0.0 && cutoff.is_finite() {
        Ok(())
    } else {
        Err(CliError::Config(format!("The cutoff must be positive, got {}", cutoff)))
    }
}
