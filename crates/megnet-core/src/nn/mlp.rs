use super::activation::Activation;
use super::error::NnError;
use super::linear::Linear;
use super::params::{ParamInit, Parameterized, StateDict, join};
use nalgebra::DMatrix;

/// A stack of linear layers between consecutive `dims`.
///
/// The activation follows every layer except the last one, which is activated
/// only when `activate_last` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    layers: Vec<Linear>,
    activation: Activation,
    activate_last: bool,
}

impl Mlp {
    /// Builds the stack.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two dims are given.
    pub fn new(dims: &[usize], activation: Activation, activate_last: bool, init: &mut ParamInit) -> Self {
        assert!(dims.len() >= 2, "an MLP needs at least an input and an output dim");
        let layers = dims
            .windows(2)
            .map(|pair| Linear::new(pair[0], pair[1], init))
            .collect();
        Self {
            layers,
            activation,
            activate_last,
        }
    }

    pub fn in_features(&self) -> usize {
        self.layers[0].in_features()
    }

    pub fn out_features(&self) -> usize {
        self.layers[self.layers.len() - 1].out_features()
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn forward(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, NnError> {
        let last = self.layers.len() - 1;
        let mut h = x.clone();
        for (index, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h)?;
            if index != last || self.activate_last {
                h = self.activation.apply_matrix(h);
            }
        }
        Ok(h)
    }
}

impl Parameterized for Mlp {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        for (index, layer) in self.layers.iter().enumerate() {
            layer.collect_parameters(&join(prefix, &format!("layers.{index}")), out);
        }
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.load_parameters(&join(prefix, &format!("layers.{index}")), dict)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_layer(n: usize) -> Linear {
        Linear::from_weights(DMatrix::identity(n, n), DMatrix::zeros(n, 1))
    }

    #[test]
    fn builds_one_layer_per_consecutive_pair() {
        let mlp = Mlp::new(&[5, 8, 3], Activation::Swish, true, &mut ParamInit::from_seed(0));
        assert_eq!(mlp.depth(), 2);
        assert_eq!(mlp.in_features(), 5);
        assert_eq!(mlp.out_features(), 3);
        let y = mlp.forward(&DMatrix::zeros(4, 5)).unwrap();
        assert_eq!(y.shape(), (4, 3));
    }

    #[test]
    fn last_layer_activation_is_optional() {
        let x = DMatrix::from_row_slice(1, 2, &[-1.0, 2.0]);
        let activated = Mlp {
            layers: vec![identity_layer(2), identity_layer(2)],
            activation: Activation::Tanh,
            activate_last: true,
        };
        let plain = Mlp {
            activate_last: false,
            ..activated.clone()
        };
        let once = x.map(f64::tanh);
        assert_eq!(plain.forward(&x).unwrap(), once);
        assert_eq!(activated.forward(&x).unwrap(), once.map(f64::tanh));
    }

    #[test]
    fn parameter_names_are_indexed_by_layer() {
        let mlp = Mlp::new(&[2, 3, 1], Activation::Sigmoid, false, &mut ParamInit::from_seed(0));
        let mut dict = StateDict::new();
        mlp.collect_parameters("head", &mut dict);
        let names: Vec<&String> = dict.keys().collect();
        assert_eq!(
            names,
            vec!["head.layers.0.bias", "head.layers.0.weight", "head.layers.1.bias", "head.layers.1.weight"]
        );
    }

    #[test]
    #[should_panic(expected = "at least an input and an output dim")]
    fn single_dim_is_rejected() {
        Mlp::new(&[4], Activation::Swish, true, &mut ParamInit::from_seed(0));
    }
}
