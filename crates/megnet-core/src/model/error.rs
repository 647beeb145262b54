use crate::nn::activation::ActivationError;
use crate::nn::error::NnError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ModelError {
    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error("Invalid model dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Expected one graph transformation per block ({expected}), got {found}")]
    TransformationCount { expected: usize, found: usize },

    #[error("Node types were given, but the model has no node embedding (set num-node-types)")]
    MissingNodeEmbedding,

    #[error("Layer evaluation failed: {source}")]
    Layer {
        #[from]
        source: NnError,
    },
}
