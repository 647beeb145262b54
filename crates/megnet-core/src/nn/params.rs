use super::error::NnError;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named model weights, keyed by dotted parameter paths such as
/// `blocks.0.conv.edge_func.layers.1.weight`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict(BTreeMap<String, DMatrix<f64>>);

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, value: DMatrix<f64>) {
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&DMatrix<f64>> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DMatrix<f64>> {
        self.0.get_mut(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DMatrix<f64>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of scalar weights.
    pub fn num_scalars(&self) -> usize {
        self.0.values().map(|m| m.len()).sum()
    }

    /// Fetches `name` and checks it has the expected shape.
    pub fn fetch(&self, name: &str, shape: (usize, usize)) -> Result<DMatrix<f64>, NnError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| NnError::MissingParameter(name.to_string()))?;
        if value.shape() != shape {
            return Err(NnError::ParameterShape {
                name: name.to_string(),
                expected: shape,
                found: value.shape(),
            });
        }
        Ok(value.clone())
    }
}

/// Joins a parameter path prefix and a local name.
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// A layer that owns named weights.
pub trait Parameterized {
    /// Writes every weight into `out` under `prefix`.
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict);

    /// Replaces every weight with the entry of the same name in `dict`.
    ///
    /// # Errors
    ///
    /// Fails on a missing entry or a shape mismatch; weights loaded before the
    /// failure keep their new values.
    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError>;
}

/// Deterministic weight initialization.
///
/// Dense and recurrent weights follow the usual fan-in scaling
/// `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
#[derive(Debug, Clone)]
pub struct ParamInit {
    rng: StdRng,
}

impl ParamInit {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn uniform(&mut self, rows: usize, cols: usize, bound: f64) -> DMatrix<f64> {
        if bound <= 0.0 {
            return DMatrix::zeros(rows, cols);
        }
        DMatrix::from_fn(rows, cols, |_, _| self.rng.gen_range(-bound..bound))
    }

    pub fn fan_in(&mut self, rows: usize, cols: usize, fan_in: usize) -> DMatrix<f64> {
        let bound = if fan_in == 0 {
            0.0
        } else {
            1.0 / (fan_in as f64).sqrt()
        };
        self.uniform(rows, cols, bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_skips_empty_prefix() {
        assert_eq!(join("", "weight"), "weight");
        assert_eq!(join("encoder.layers.0", "bias"), "encoder.layers.0.bias");
    }

    #[test]
    fn fetch_checks_presence_and_shape() {
        let mut dict = StateDict::new();
        dict.insert("w".to_string(), DMatrix::zeros(2, 3));

        assert_eq!(dict.fetch("w", (2, 3)).unwrap().shape(), (2, 3));
        assert_eq!(
            dict.fetch("w", (3, 2)),
            Err(NnError::ParameterShape {
                name: "w".to_string(),
                expected: (3, 2),
                found: (2, 3)
            })
        );
        assert_eq!(
            dict.fetch("b", (1, 1)),
            Err(NnError::MissingParameter("b".to_string()))
        );
        assert_eq!(dict.num_scalars(), 6);
    }

    #[test]
    fn same_seed_gives_same_weights() {
        let a = ParamInit::from_seed(7).fan_in(4, 3, 3);
        let b = ParamInit::from_seed(7).fan_in(4, 3, 3);
        let c = ParamInit::from_seed(8).fan_in(4, 3, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let bound = 1.0 / 3.0f64.sqrt();
        assert!(a.iter().all(|w| w.abs() < bound));
    }
}
