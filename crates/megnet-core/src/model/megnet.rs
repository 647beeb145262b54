use super::config::MegnetConfig;
use super::error::ModelError;
use crate::core::graph::crystal_graph::CrystalGraph;
use crate::core::graph::transform::{GraphTransform, Identity};
use crate::nn::activation::Activation;
use crate::nn::block::MegnetBlock;
use crate::nn::dropout::Dropout;
use crate::nn::embedding::Embedding;
use crate::nn::error::NnError;
use crate::nn::mlp::Mlp;
use crate::nn::ops::hstack;
use crate::nn::params::{ParamInit, Parameterized, StateDict, join};
use crate::nn::set2set::{EdgeSet2Set, Set2Set};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Node input of a forward pass.
#[derive(Debug, Clone, Copy)]
pub enum NodeFeatures<'a> {
    /// Per-node indices into the node-type embedding.
    Types(&'a [usize]),
    /// Ready-made features, one row per node, `node_embedding_dim` columns.
    Dense(&'a DMatrix<f64>),
}

/// A model together with the arguments needed to rebuild it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub model_args: MegnetConfig,
    pub state_dict: StateDict,
}

/// The MEGNet graph network.
///
/// Edge, node and state features are encoded to `hiddens.last()` columns, passed
/// through `num_blocks` residual [`MegnetBlock`]s, pooled with Set2Set over nodes
/// and edges, and projected to a single output by the output MLP.
#[derive(Debug)]
pub struct Megnet {
    config: MegnetConfig,
    is_classification: bool,
    include_states: bool,
    node_embed: Option<Embedding>,
    edge_encoder: Mlp,
    node_encoder: Mlp,
    attr_encoder: Mlp,
    blocks: Vec<MegnetBlock>,
    node_s2s: Set2Set,
    edge_s2s: EdgeSet2Set,
    output_proj: Mlp,
    dropout: Option<Dropout>,
    graph_transformations: Vec<Box<dyn GraphTransform>>,
}

fn validate_dimensions(config: &MegnetConfig) -> Result<(), ModelError> {
    let invalid = |msg: &str| Err(ModelError::InvalidDimensions(msg.to_string()));

    if config.num_blocks == 0 {
        return invalid("num_blocks must be at least 1");
    }
    if config.node_embedding_dim == 0 || config.edge_embedding_dim == 0 || config.attr_embedding_dim == 0 {
        return invalid("embedding dims must be positive");
    }
    let (Some(&hidden_out), Some(&conv_out)) = (config.hiddens.last(), config.conv_hiddens.last()) else {
        return invalid("hiddens and conv_hiddens must not be empty");
    };
    let all_dims = config
        .hiddens
        .iter()
        .chain(&config.conv_hiddens)
        .chain(&config.output_hiddens);
    if all_dims.copied().any(|d| d == 0) {
        return invalid("hidden layer sizes must be positive");
    }
    if hidden_out != conv_out {
        return Err(ModelError::InvalidDimensions(format!(
            "the last entry of hiddens ({hidden_out}) must equal the last entry of conv_hiddens ({conv_out}) for the residual connections"
        )));
    }
    if config.s2s_num_layers == 0 {
        return invalid("s2s_num_layers must be at least 1");
    }
    if config.num_node_types == Some(0) {
        return invalid("num_node_types must be positive");
    }
    if let Some(p) = config.dropout {
        if !(0.0..1.0).contains(&p) {
            return Err(ModelError::InvalidDimensions(format!(
                "dropout probability must be in [0, 1), got {p}"
            )));
        }
    }
    Ok(())
}

impl Megnet {
    /// Builds a model with freshly initialized weights.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Activation`] for an unknown activation name and
    /// [`ModelError::InvalidDimensions`] for layer sizes that cannot be wired together.
    #[instrument(skip_all, name = "megnet_new", fields(num_blocks = config.num_blocks))]
    pub fn new(config: MegnetConfig, init: &mut ParamInit) -> Result<Self, ModelError> {
        let activation: Activation = config.act.parse()?;
        validate_dimensions(&config)?;

        let hiddens = &config.hiddens;
        let conv_hiddens = &config.conv_hiddens;
        let dims_from = |first: usize| [&[first][..], hiddens].concat();

        let node_embed = config
            .num_node_types
            .map(|n| Embedding::new(n, config.node_embedding_dim, init));
        let edge_encoder = Mlp::new(&dims_from(config.edge_embedding_dim), activation, true, init);
        let node_encoder = Mlp::new(&dims_from(config.node_embedding_dim), activation, true, init);
        let attr_encoder = Mlp::new(&dims_from(config.attr_embedding_dim), activation, true, init);

        let blocks_in_dim = hiddens[hiddens.len() - 1];
        let block_out_dim = conv_hiddens[conv_hiddens.len() - 1];
        let mut blocks = Vec::with_capacity(config.num_blocks);
        blocks.push(MegnetBlock::new(&[blocks_in_dim], conv_hiddens, activation, config.dropout, true, init));
        for _ in 1..config.num_blocks {
            blocks.push(MegnetBlock::new(&dims_from(block_out_dim), conv_hiddens, activation, config.dropout, true, init));
        }

        let edge_s2s = EdgeSet2Set::new(block_out_dim, config.s2s_num_iters, config.s2s_num_layers, init);
        let node_s2s = Set2Set::new(block_out_dim, config.s2s_num_iters, config.s2s_num_layers, init);

        // Both Set2Set readouts double their width; the state adds one more block_out_dim.
        let output_dims = [&[2 * 2 * block_out_dim + block_out_dim][..], &config.output_hiddens, &[1]].concat();
        let output_proj = Mlp::new(&output_dims, activation, false, init);

        let graph_transformations: Vec<Box<dyn GraphTransform>> = (0..config.num_blocks)
            .map(|_| Box::new(Identity) as Box<dyn GraphTransform>)
            .collect();

        let model = Self {
            is_classification: config.is_classification,
            include_states: config.include_states,
            dropout: config.dropout.filter(|p| *p > 0.0).map(Dropout::new),
            node_embed,
            edge_encoder,
            node_encoder,
            attr_encoder,
            blocks,
            node_s2s,
            edge_s2s,
            output_proj,
            graph_transformations,
            config,
        };
        debug!(num_parameters = model.num_parameters(), "MEGNet model built.");
        Ok(model)
    }

    /// Replaces the per-block graph transformations (identity by default).
    pub fn with_graph_transformations(
        mut self,
        transformations: Vec<Box<dyn GraphTransform>>,
    ) -> Result<Self, ModelError> {
        if transformations.len() != self.blocks.len() {
            return Err(ModelError::TransformationCount {
                expected: self.blocks.len(),
                found: transformations.len(),
            });
        }
        self.graph_transformations = transformations;
        Ok(self)
    }

    pub fn config(&self) -> &MegnetConfig {
        &self.config
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_parameters(&self) -> usize {
        self.state_dict().num_scalars()
    }

    /// Predicts the property of one graph.
    ///
    /// `edge_feat` has one row per edge and `edge_embedding_dim` columns;
    /// `state_attr` has `attr_embedding_dim` entries, or `hiddens.last()` entries
    /// when `include_states` is set.
    #[instrument(level = "debug", skip_all, fields(num_nodes = graph.num_nodes(), num_edges = graph.num_edges()))]
    pub fn forward(
        &self,
        graph: &CrystalGraph,
        edge_feat: &DMatrix<f64>,
        node_feat: NodeFeatures<'_>,
        state_attr: &[f64],
    ) -> Result<f64, ModelError> {
        let mut edges = self.edge_encoder.forward(edge_feat)?;
        let mut nodes = match node_feat {
            NodeFeatures::Types(types) => {
                let embed = self.node_embed.as_ref().ok_or(ModelError::MissingNodeEmbedding)?;
                self.node_encoder.forward(&embed.forward(types)?)?
            }
            NodeFeatures::Dense(features) => self.node_encoder.forward(features)?,
        };
        let state = DMatrix::from_row_slice(1, state_attr.len(), state_attr);
        let mut state = if self.include_states {
            state
        } else {
            self.attr_encoder.forward(&state)?
        };

        let mut graph = Cow::Borrowed(graph);
        for (block, transform) in self.blocks.iter().zip(&self.graph_transformations) {
            graph = transform.apply(graph);
            (edges, nodes, state) = block.forward(&graph, &edges, &nodes, &state)?;
        }

        let node_vec = self.node_s2s.forward(&graph, &nodes)?;
        let edge_vec = self.edge_s2s.forward(&graph, &edges)?;
        let mut vec = hstack(&[&node_vec, &edge_vec, &state]);
        if let Some(dropout) = &self.dropout {
            vec = dropout.forward(vec);
        }

        let output = self.output_proj.forward(&vec)?[(0, 0)];
        Ok(if self.is_classification {
            Activation::Sigmoid.apply(output)
        } else {
            output
        })
    }

    /// All weights keyed by their parameter path.
    pub fn state_dict(&self) -> StateDict {
        let mut dict = StateDict::new();
        self.collect_parameters("", &mut dict);
        dict
    }

    /// Loads every weight from `dict`.
    ///
    /// The dictionary must hold exactly the model's parameters with matching
    /// shapes; on error the model is left unchanged.
    pub fn load_state_dict(&mut self, dict: &StateDict) -> Result<(), ModelError> {
        let current = self.state_dict();
        let expected: BTreeSet<&String> = current.keys().collect();
        if let Some(extra) = dict.keys().find(|k| !expected.contains(k)) {
            return Err(NnError::UnexpectedParameter(extra.clone()).into());
        }
        for (name, value) in current.iter() {
            dict.fetch(name, value.shape())?;
        }
        self.load_parameters("", dict)?;
        Ok(())
    }

    /// Exports the construction arguments and weights.
    pub fn as_dict(&self) -> ModelRecord {
        ModelRecord {
            model_args: self.config.clone(),
            state_dict: self.state_dict(),
        }
    }

    /// Rebuilds a model from [`as_dict`](Self::as_dict) output.
    ///
    /// Graph transformations are not part of the record and reset to identity.
    pub fn from_dict(record: &ModelRecord) -> Result<Self, ModelError> {
        let mut model = Self::new(record.model_args.clone(), &mut ParamInit::from_seed(0))?;
        model.load_state_dict(&record.state_dict)?;
        Ok(model)
    }
}

impl Parameterized for Megnet {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        if let Some(embed) = &self.node_embed {
            embed.collect_parameters(&join(prefix, "node_embed"), out);
        }
        self.edge_encoder.collect_parameters(&join(prefix, "edge_encoder"), out);
        self.node_encoder.collect_parameters(&join(prefix, "node_encoder"), out);
        self.attr_encoder.collect_parameters(&join(prefix, "attr_encoder"), out);
        for (index, block) in self.blocks.iter().enumerate() {
            block.collect_parameters(&join(prefix, &format!("blocks.{index}")), out);
        }
        self.edge_s2s.collect_parameters(&join(prefix, "edge_s2s"), out);
        self.node_s2s.collect_parameters(&join(prefix, "node_s2s"), out);
        self.output_proj.collect_parameters(&join(prefix, "output_proj"), out);
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        if let Some(embed) = &mut self.node_embed {
            embed.load_parameters(&join(prefix, "node_embed"), dict)?;
        }
        self.edge_encoder.load_parameters(&join(prefix, "edge_encoder"), dict)?;
        self.node_encoder.load_parameters(&join(prefix, "node_encoder"), dict)?;
        self.attr_encoder.load_parameters(&join(prefix, "attr_encoder"), dict)?;
        for (index, block) in self.blocks.iter_mut().enumerate() {
            block.load_parameters(&join(prefix, &format!("blocks.{index}")), dict)?;
        }
        self.edge_s2s.load_parameters(&join(prefix, "edge_s2s"), dict)?;
        self.node_s2s.load_parameters(&join(prefix, "node_s2s"), dict)?;
        self.output_proj.load_parameters(&join(prefix, "output_proj"), dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::MegnetConfigBuilder;

    fn small_config() -> MegnetConfig {
        MegnetConfigBuilder::new()
            .node_embedding_dim(4)
            .edge_embedding_dim(6)
            .attr_embedding_dim(2)
            .num_blocks(2)
            .hiddens(vec![8, 4])
            .conv_hiddens(vec![6, 4])
            .s2s_num_layers(1)
            .s2s_num_iters(2)
            .output_hiddens(vec![5])
            .num_node_types(3)
            .build()
            .unwrap()
    }

    fn triangle() -> CrystalGraph {
        CrystalGraph::from_edges(3, vec![0, 1, 1, 2, 2, 0], vec![1, 0, 2, 1, 0, 2])
    }

    fn edge_features(graph: &CrystalGraph, dim: usize) -> DMatrix<f64> {
        DMatrix::from_fn(graph.num_edges(), dim, |r, c| ((r + 1) * (c + 2)) as f64 * 0.05)
    }

    #[test]
    fn rejects_unknown_activation() {
        let mut config = small_config();
        config.act = "relu".to_string();
        let err = Megnet::new(config, &mut ParamInit::from_seed(0)).unwrap_err();
        assert!(matches!(err, ModelError::Activation(_)));
        assert!(err.to_string().contains("please try using swish, sigmoid, tanh, softplus2"));
    }

    #[test]
    fn rejects_dimensions_that_break_the_residual() {
        let mut config = small_config();
        config.conv_hiddens = vec![6, 5];
        assert!(matches!(
            Megnet::new(config, &mut ParamInit::from_seed(0)),
            Err(ModelError::InvalidDimensions(_))
        ));

        let mut config = small_config();
        config.num_blocks = 0;
        assert!(Megnet::new(config, &mut ParamInit::from_seed(0)).is_err());

        let mut config = small_config();
        config.hiddens.clear();
        assert!(Megnet::new(config, &mut ParamInit::from_seed(0)).is_err());
    }

    #[test]
    fn classification_output_is_a_probability() {
        let model = Megnet::new(small_config(), &mut ParamInit::from_seed(1)).unwrap();
        let graph = triangle();
        let out = model
            .forward(&graph, &edge_features(&graph, 6), NodeFeatures::Types(&[0, 1, 2]), &[0.0, 0.0])
            .unwrap();
        assert!(out > 0.0 && out < 1.0);
    }

    #[test]
    fn dense_node_features_skip_the_embedding() {
        let mut config = small_config();
        config.num_node_types = None;
        config.is_classification = false;
        let model = Megnet::new(config, &mut ParamInit::from_seed(2)).unwrap();
        let graph = triangle();
        let nodes = DMatrix::from_element(3, 4, 0.3);
        let out = model
            .forward(&graph, &edge_features(&graph, 6), NodeFeatures::Dense(&nodes), &[0.1, 0.2])
            .unwrap();
        assert!(out.is_finite());

        let err = model
            .forward(&graph, &edge_features(&graph, 6), NodeFeatures::Types(&[0, 0, 0]), &[0.0, 0.0])
            .unwrap_err();
        assert_eq!(err, ModelError::MissingNodeEmbedding);
    }

    #[test]
    fn included_states_bypass_the_state_encoder() {
        let mut config = small_config();
        config.include_states = true;
        let model = Megnet::new(config, &mut ParamInit::from_seed(3)).unwrap();
        let graph = triangle();
        let edges = edge_features(&graph, 6);

        assert!(model.forward(&graph, &edges, NodeFeatures::Types(&[0, 1, 2]), &[0.1; 4]).is_ok());
        assert!(matches!(
            model.forward(&graph, &edges, NodeFeatures::Types(&[0, 1, 2]), &[0.1; 2]),
            Err(ModelError::Layer { .. })
        ));
    }

    #[test]
    fn graph_without_edges_still_predicts() {
        let model = Megnet::new(small_config(), &mut ParamInit::from_seed(4)).unwrap();
        let graph = CrystalGraph::from_edges(2, vec![], vec![]);
        let out = model
            .forward(&graph, &DMatrix::zeros(0, 6), NodeFeatures::Types(&[0, 2]), &[0.0, 0.0])
            .unwrap();
        assert!(out.is_finite());
    }

    #[test]
    fn wrong_edge_feature_width_is_reported() {
        let model = Megnet::new(small_config(), &mut ParamInit::from_seed(0)).unwrap();
        let graph = triangle();
        let err = model
            .forward(&graph, &edge_features(&graph, 5), NodeFeatures::Types(&[0, 1, 2]), &[0.0, 0.0])
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::Layer {
                source: NnError::FeatureMismatch {
                    layer: "linear",
                    expected: 6,
                    found: 5
                }
            }
        );
    }

    #[test]
    fn state_dict_names_follow_the_layer_tree() {
        let model = Megnet::new(small_config(), &mut ParamInit::from_seed(0)).unwrap();
        let dict = model.state_dict();
        for name in [
            "node_embed.weight",
            "edge_encoder.layers.1.bias",
            "attr_encoder.layers.0.weight",
            "blocks.0.conv.edge_func.layers.1.weight",
            "blocks.1.edge_func.layers.0.weight",
            "node_s2s.lstm.weight_ih_l0",
            "edge_s2s.lstm.bias_hh_l0",
            "output_proj.layers.1.weight",
        ] {
            assert!(dict.get(name).is_some(), "missing {name}");
        }
        assert!(dict.get("blocks.0.edge_func.layers.0.weight").is_none());
        assert_eq!(dict.get("output_proj.layers.0.weight").unwrap().shape(), (5, 20));
        assert_eq!(model.num_parameters(), dict.num_scalars());
    }

    #[test]
    fn dict_round_trip_reproduces_predictions() {
        let model = Megnet::new(small_config(), &mut ParamInit::from_seed(11)).unwrap();
        let graph = triangle();
        let edges = edge_features(&graph, 6);
        let expected = model
            .forward(&graph, &edges, NodeFeatures::Types(&[2, 1, 0]), &[0.5, -0.5])
            .unwrap();

        let record = model.as_dict();
        let restored = Megnet::from_dict(&record).unwrap();
        let actual = restored
            .forward(&graph, &edges, NodeFeatures::Types(&[2, 1, 0]), &[0.5, -0.5])
            .unwrap();
        assert_eq!(actual, expected);
        assert_eq!(restored.state_dict(), record.state_dict);
    }

    #[test]
    fn load_state_dict_is_strict() {
        let mut model = Megnet::new(small_config(), &mut ParamInit::from_seed(0)).unwrap();
        let before = model.state_dict();

        let mut extra = before.clone();
        extra.insert("unused.weight".to_string(), DMatrix::zeros(1, 1));
        assert_eq!(
            model.load_state_dict(&extra),
            Err(NnError::UnexpectedParameter("unused.weight".to_string()).into())
        );

        let mut reshaped = before.clone();
        reshaped.insert("output_proj.layers.1.bias".to_string(), DMatrix::zeros(2, 1));
        assert!(matches!(
            model.load_state_dict(&reshaped),
            Err(ModelError::Layer {
                source: NnError::ParameterShape { .. }
            })
        ));
        assert_eq!(model.state_dict(), before);

        let mut missing = StateDict::new();
        missing.insert("node_embed.weight".to_string(), before.get("node_embed.weight").unwrap().clone());
        assert!(matches!(
            model.load_state_dict(&missing),
            Err(ModelError::Layer {
                source: NnError::MissingParameter(_)
            })
        ));
    }

    #[test]
    fn transformation_count_must_match_blocks() {
        let model = Megnet::new(small_config(), &mut ParamInit::from_seed(0)).unwrap();
        let err = model
            .with_graph_transformations(vec![Box::new(Identity)])
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::TransformationCount {
                expected: 2,
                found: 1
            }
        );
    }
}
