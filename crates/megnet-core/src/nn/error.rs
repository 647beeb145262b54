use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum NnError {
    #[error("{layer}: expected {expected} input features, found {found}")]
    FeatureMismatch {
        layer: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{layer}: expected {expected} rows, found {found}")]
    RowMismatch {
        layer: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Embedding index {index} is out of range for {num_embeddings} embeddings")]
    IndexOutOfRange { index: usize, num_embeddings: usize },
    #[error("Missing parameter '{0}' in state dict")]
    MissingParameter(String),
    #[error("Unexpected parameter '{0}' in state dict")]
    UnexpectedParameter(String),
    #[error("Parameter '{name}' has shape {found:?}, expected {expected:?}")]
    ParameterShape {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
}
