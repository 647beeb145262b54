use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// Construction arguments of a [`Megnet`](super::megnet::Megnet) model.
///
/// These are the `model_args` stored next to the weights in a
/// [`ModelRecord`](super::megnet::ModelRecord). Missing fields in a serialized
/// config fall back to the [`Default`] architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct MegnetConfig {
    pub node_embedding_dim: usize,
    pub edge_embedding_dim: usize,
    pub attr_embedding_dim: usize,
    pub num_blocks: usize,
    pub hiddens: Vec<usize>,
    pub conv_hiddens: Vec<usize>,
    pub s2s_num_layers: usize,
    pub s2s_num_iters: usize,
    pub output_hiddens: Vec<usize>,
    /// Activation name, checked when the model is built.
    pub act: String,
    pub is_classification: bool,
    /// Feed the state attributes to the first block without encoding them.
    pub include_states: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropout: Option<f64>,
    pub element_types: Vec<String>,
    pub cutoff: f64,
    pub data_mean: f64,
    pub data_std: f64,
    /// Size of the node-type embedding table; without it node features must be dense.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_node_types: Option<usize>,
}

impl Default for MegnetConfig {
    fn default() -> Self {
        Self {
            node_embedding_dim: 16,
            edge_embedding_dim: 100,
            attr_embedding_dim: 2,
            num_blocks: 3,
            hiddens: vec![64, 32],
            conv_hiddens: vec![64, 64, 32],
            s2s_num_layers: 1,
            s2s_num_iters: 3,
            output_hiddens: vec![32, 16],
            act: "swish".to_string(),
            is_classification: true,
            include_states: false,
            dropout: None,
            element_types: Vec::new(),
            cutoff: 4.0,
            data_mean: 0.0,
            data_std: 1.0,
            num_node_types: None,
        }
    }
}

#[derive(Default)]
pub struct MegnetConfigBuilder {
    node_embedding_dim: Option<usize>,
    edge_embedding_dim: Option<usize>,
    attr_embedding_dim: Option<usize>,
    num_blocks: Option<usize>,
    hiddens: Option<Vec<usize>>,
    conv_hiddens: Option<Vec<usize>>,
    s2s_num_layers: Option<usize>,
    s2s_num_iters: Option<usize>,
    output_hiddens: Option<Vec<usize>>,
    act: Option<String>,
    is_classification: Option<bool>,
    include_states: Option<bool>,
    dropout: Option<f64>,
    element_types: Option<Vec<String>>,
    cutoff: Option<f64>,
    data_mean: Option<f64>,
    data_std: Option<f64>,
    num_node_types: Option<usize>,
}

impl MegnetConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_embedding_dim(mut self, dim: usize) -> Self {
        self.node_embedding_dim = Some(dim);
        self
    }
    pub fn edge_embedding_dim(mut self, dim: usize) -> Self {
        self.edge_embedding_dim = Some(dim);
        self
    }
    pub fn attr_embedding_dim(mut self, dim: usize) -> Self {
        self.attr_embedding_dim = Some(dim);
        self
    }
    pub fn num_blocks(mut self, n: usize) -> Self {
        self.num_blocks = Some(n);
        self
    }
    pub fn hiddens(mut self, dims: Vec<usize>) -> Self {
        self.hiddens = Some(dims);
        self
    }
    pub fn conv_hiddens(mut self, dims: Vec<usize>) -> Self {
        self.conv_hiddens = Some(dims);
        self
    }
    pub fn s2s_num_layers(mut self, n: usize) -> Self {
        self.s2s_num_layers = Some(n);
        self
    }
    pub fn s2s_num_iters(mut self, n: usize) -> Self {
        self.s2s_num_iters = Some(n);
        self
    }
    pub fn output_hiddens(mut self, dims: Vec<usize>) -> Self {
        self.output_hiddens = Some(dims);
        self
    }
    pub fn act(mut self, name: impl Into<String>) -> Self {
        self.act = Some(name.into());
        self
    }
    pub fn is_classification(mut self, flag: bool) -> Self {
        self.is_classification = Some(flag);
        self
    }
    pub fn include_states(mut self, flag: bool) -> Self {
        self.include_states = Some(flag);
        self
    }
    pub fn dropout(mut self, p: f64) -> Self {
        self.dropout = Some(p);
        self
    }
    pub fn element_types(mut self, types: Vec<String>) -> Self {
        self.element_types = Some(types);
        self
    }
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn data_mean(mut self, mean: f64) -> Self {
        self.data_mean = Some(mean);
        self
    }
    pub fn data_std(mut self, std: f64) -> Self {
        self.data_std = Some(std);
        self
    }
    pub fn num_node_types(mut self, n: usize) -> Self {
        self.num_node_types = Some(n);
        self
    }

    /// The layer sizes are required; everything else falls back to the defaults.
    pub fn build(self) -> Result<MegnetConfig, ConfigError> {
        let defaults = MegnetConfig::default();
        Ok(MegnetConfig {
            node_embedding_dim: self
                .node_embedding_dim
                .ok_or(ConfigError::MissingParameter("node_embedding_dim"))?,
            edge_embedding_dim: self
                .edge_embedding_dim
                .ok_or(ConfigError::MissingParameter("edge_embedding_dim"))?,
            attr_embedding_dim: self
                .attr_embedding_dim
                .ok_or(ConfigError::MissingParameter("attr_embedding_dim"))?,
            num_blocks: self
                .num_blocks
                .ok_or(ConfigError::MissingParameter("num_blocks"))?,
            hiddens: self
                .hiddens
                .ok_or(ConfigError::MissingParameter("hiddens"))?,
            conv_hiddens: self
                .conv_hiddens
                .ok_or(ConfigError::MissingParameter("conv_hiddens"))?,
            s2s_num_layers: self
                .s2s_num_layers
                .ok_or(ConfigError::MissingParameter("s2s_num_layers"))?,
            s2s_num_iters: self
                .s2s_num_iters
                .ok_or(ConfigError::MissingParameter("s2s_num_iters"))?,
            output_hiddens: self
                .output_hiddens
                .ok_or(ConfigError::MissingParameter("output_hiddens"))?,
            act: self.act.unwrap_or(defaults.act),
            is_classification: self.is_classification.unwrap_or(defaults.is_classification),
            include_states: self.include_states.unwrap_or(defaults.include_states),
            dropout: self.dropout,
            element_types: self.element_types.unwrap_or_default(),
            cutoff: self.cutoff.unwrap_or(defaults.cutoff),
            data_mean: self.data_mean.unwrap_or(defaults.data_mean),
            data_std: self.data_std.unwrap_or(defaults.data_std),
            num_node_types: self.num_node_types,
        })
    }
}
