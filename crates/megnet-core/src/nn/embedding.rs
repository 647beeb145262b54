use super::error::NnError;
use super::params::{ParamInit, Parameterized, StateDict, join};
use nalgebra::DMatrix;

/// A lookup table mapping an integer type to a learned feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// `num_embeddings × dim`.
    weight: DMatrix<f64>,
}

impl Embedding {
    /// Rows start uniformly distributed with unit variance.
    pub fn new(num_embeddings: usize, dim: usize, init: &mut ParamInit) -> Self {
        Self {
            weight: init.uniform(num_embeddings, dim, 3.0f64.sqrt()),
        }
    }

    pub fn num_embeddings(&self) -> usize {
        self.weight.nrows()
    }

    pub fn dim(&self) -> usize {
        self.weight.ncols()
    }

    pub fn forward(&self, indices: &[usize]) -> Result<DMatrix<f64>, NnError> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.num_embeddings()) {
            return Err(NnError::IndexOutOfRange {
                index,
                num_embeddings: self.num_embeddings(),
            });
        }
        Ok(DMatrix::from_fn(indices.len(), self.dim(), |row, col| {
            self.weight[(indices[row], col)]
        }))
    }
}

impl Parameterized for Embedding {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        out.insert(join(prefix, "weight"), self.weight.clone());
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        self.weight = dict.fetch(&join(prefix, "weight"), self.weight.shape())?;
        Ok(())
    }
}
