use super::error::ModelError;
use super::megnet::{Megnet, NodeFeatures};
use crate::core::graph::crystal_graph::CrystalGraph;
use crate::core::graph::expansion::GaussianExpansion;
use tracing::instrument;

/// Predicts a property in physical units from a converted graph.
///
/// Edge features are the Gaussian expansion of the bond lengths, node features
/// are the graph's node types, and the raw network output is rescaled as
/// `data_std · output + data_mean`.
#[derive(Debug)]
pub struct MegnetCalculator {
    model: Megnet,
    expansion: GaussianExpansion,
    data_mean: f64,
    data_std: f64,
}

impl MegnetCalculator {
    /// Uses the normalization stored in the model's config.
    ///
    /// # Errors
    ///
    /// Fails if the expansion width differs from the model's edge embedding
    /// dim, the model has no node-type embedding, or the embedding has fewer
    /// rows than there are element types.
    pub fn new(model: Megnet, expansion: GaussianExpansion) -> Result<Self, ModelError> {
        let edge_dim = model.config().edge_embedding_dim;
        if expansion.num_centers != edge_dim {
            return Err(ModelError::InvalidDimensions(format!(
                "bond expansion has {} centers but the model expects {edge_dim} edge features",
                expansion.num_centers
            )));
        }
        let Some(num_node_types) = model.config().num_node_types else {
            return Err(ModelError::MissingNodeEmbedding);
        };
        let num_elements = model.config().element_types.len();
        if num_node_types < num_elements {
            return Err(ModelError::InvalidDimensions(format!(
                "node embedding covers {num_node_types} types but {num_elements} element types are configured"
            )));
        }
        let (data_mean, data_std) = (model.config().data_mean, model.config().data_std);
        Ok(Self {
            model,
            expansion,
            data_mean,
            data_std,
        })
    }

    pub fn with_normalization(mut self, data_mean: f64, data_std: f64) -> Self {
        self.data_mean = data_mean;
        self.data_std = data_std;
        self
    }

    pub fn model(&self) -> &Megnet {
        &self.model
    }

    pub fn expansion(&self) -> &GaussianExpansion {
        &self.expansion
    }

    #[instrument(level = "debug", skip_all, fields(num_nodes = graph.num_nodes()))]
    pub fn predict(&self, graph: &CrystalGraph, state_attr: &[f64]) -> Result<f64, ModelError> {
        let edge_attr = self.expansion.expand(&graph.bond_distances());
        let output = self
            .model
            .forward(graph, &edge_attr, NodeFeatures::Types(graph.node_type()), state_attr)?;
        Ok(self.data_std * output + self.data_mean)
    }
}
