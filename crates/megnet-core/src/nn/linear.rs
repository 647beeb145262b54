use super::error::NnError;
use super::params::{ParamInit, Parameterized, StateDict, join};
use nalgebra::DMatrix;

/// A fully connected layer `y = x Wᵀ + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    /// `out_features × in_features`.
    weight: DMatrix<f64>,
    /// `out_features × 1`.
    bias: DMatrix<f64>,
}

impl Linear {
    pub fn new(in_features: usize, out_features: usize, init: &mut ParamInit) -> Self {
        Self {
            weight: init.fan_in(out_features, in_features, in_features),
            bias: init.fan_in(out_features, 1, in_features),
        }
    }

    pub fn from_weights(weight: DMatrix<f64>, bias: DMatrix<f64>) -> Self {
        assert_eq!(bias.shape(), (weight.nrows(), 1), "bias must be a column of length out_features");
        Self { weight, bias }
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, NnError> {
        if x.ncols() != self.in_features() {
            return Err(NnError::FeatureMismatch {
                layer: "linear",
                expected: self.in_features(),
                found: x.ncols(),
            });
        }
        let mut y = x * self.weight.transpose();
        for (mut column, b) in y.column_iter_mut().zip(self.bias.iter()) {
            column.add_scalar_mut(*b);
        }
        Ok(y)
    }
}

impl Parameterized for Linear {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        out.insert(join(prefix, "weight"), self.weight.clone());
        out.insert(join(prefix, "bias"), self.bias.clone());
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        self.weight = dict.fetch(&join(prefix, "weight"), self.weight.shape())?;
        self.bias = dict.fetch(&join(prefix, "bias"), self.bias.shape())?;
        Ok(())
    }
}
