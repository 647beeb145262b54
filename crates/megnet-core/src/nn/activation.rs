use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Undefined activation type '{0}', please try using swish, sigmoid, tanh, softplus2")]
pub struct ActivationError(pub String);

/// Activation functions available to MEGNet layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Activation {
    /// `x · sigmoid(x)`, also known as SiLU.
    #[default]
    Swish,
    Sigmoid,
    Tanh,
    /// `softplus(x) - ln 2`, a softplus shifted to pass through the origin.
    SoftPlus2,
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
fn softplus(x: f64) -> f64 {
    // ln(1 + e^x) without overflow for large |x|.
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

impl Activation {
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Swish => x * sigmoid(x),
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
            Activation::SoftPlus2 => softplus(x) - std::f64::consts::LN_2,
        }
    }

    pub fn apply_matrix(&self, mut m: DMatrix<f64>) -> DMatrix<f64> {
        m.apply(|x| *x = self.apply(*x));
        m
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Swish => "swish",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::SoftPlus2 => "softplus2",
        }
    }
}

impl FromStr for Activation {
    type Err = ActivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swish" => Ok(Activation::Swish),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softplus2" => Ok(Activation::SoftPlus2),
            other => Err(ActivationError(other.to_string())),
        }
    }
}

impl TryFrom<String> for Activation {
    type Error = ActivationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Activation> for String {
    fn from(value: Activation) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
