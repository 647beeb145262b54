use crate::core::graph::converter::GraphError;
use crate::model::error::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Failed to build the graph of structure #{index} ({formula}): {source}")]
    Graph {
        index: usize,
        formula: String,
        #[source]
        source: GraphError,
    },

    #[error("Prediction failed for structure #{index} ({formula}): {source}")]
    Prediction {
        index: usize,
        formula: String,
        #[source]
        source: ModelError,
    },

    #[error("No element types configured; the model cannot assign node types")]
    NoElementTypes,
}
