use super::error::NnError;
use super::params::{ParamInit, Parameterized, StateDict, join};
use nalgebra::{DMatrix, DVector};

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, PartialEq)]
struct LstmLayer {
    /// `4·hidden × input`, gate blocks ordered input, forget, cell, output.
    weight_ih: DMatrix<f64>,
    /// `4·hidden × hidden`.
    weight_hh: DMatrix<f64>,
    bias_ih: DMatrix<f64>,
    bias_hh: DMatrix<f64>,
}

/// Hidden and cell state of every layer of an [`Lstm`].
#[derive(Debug, Clone, PartialEq)]
pub struct LstmState {
    pub h: Vec<DVector<f64>>,
    pub c: Vec<DVector<f64>>,
}

/// A stacked LSTM evaluated one time step at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Lstm {
    input_size: usize,
    hidden_size: usize,
    layers: Vec<LstmLayer>,
}

impl Lstm {
    pub fn new(input_size: usize, hidden_size: usize, num_layers: usize, init: &mut ParamInit) -> Self {
        let layers = (0..num_layers)
            .map(|layer| {
                let in_size = if layer == 0 { input_size } else { hidden_size };
                LstmLayer {
                    weight_ih: init.fan_in(4 * hidden_size, in_size, hidden_size),
                    weight_hh: init.fan_in(4 * hidden_size, hidden_size, hidden_size),
                    bias_ih: init.fan_in(4 * hidden_size, 1, hidden_size),
                    bias_hh: init.fan_in(4 * hidden_size, 1, hidden_size),
                }
            })
            .collect();
        Self {
            input_size,
            hidden_size,
            layers,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn zero_state(&self) -> LstmState {
        LstmState {
            h: vec![DVector::zeros(self.hidden_size); self.layers.len()],
            c: vec![DVector::zeros(self.hidden_size); self.layers.len()],
        }
    }

    /// Advances every layer by one step and returns the top layer's hidden state.
    pub fn step(&self, input: &DVector<f64>, state: &mut LstmState) -> Result<DVector<f64>, NnError> {
        if input.len() != self.input_size {
            return Err(NnError::FeatureMismatch {
                layer: "lstm",
                expected: self.input_size,
                found: input.len(),
            });
        }

        let hs = self.hidden_size;
        let mut x = input.clone();
        for (index, layer) in self.layers.iter().enumerate() {
            let gates = &layer.weight_ih * &x
                + &layer.weight_hh * &state.h[index]
                + layer.bias_ih.column(0)
                + layer.bias_hh.column(0);

            let i = gates.rows(0, hs).map(sigmoid);
            let f = gates.rows(hs, hs).map(sigmoid);
            let g = gates.rows(2 * hs, hs).map(f64::tanh);
            let o = gates.rows(3 * hs, hs).map(sigmoid);

            let c = f.component_mul(&state.c[index]) + i.component_mul(&g);
            let h = o.component_mul(&c.map(f64::tanh));
            state.c[index] = c;
            state.h[index] = h.clone();
            x = h;
        }
        Ok(x)
    }
}

impl Parameterized for Lstm {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        for (index, layer) in self.layers.iter().enumerate() {
            out.insert(join(prefix, &format!("weight_ih_l{index}")), layer.weight_ih.clone());
            out.insert(join(prefix, &format!("weight_hh_l{index}")), layer.weight_hh.clone());
            out.insert(join(prefix, &format!("bias_ih_l{index}")), layer.bias_ih.clone());
            out.insert(join(prefix, &format!("bias_hh_l{index}")), layer.bias_hh.clone());
        }
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        for (index, layer) in self.layers.iter_mut().enumerate() {
            layer.weight_ih = dict.fetch(&join(prefix, &format!("weight_ih_l{index}")), layer.weight_ih.shape())?;
            layer.weight_hh = dict.fetch(&join(prefix, &format!("weight_hh_l{index}")), layer.weight_hh.shape())?;
            layer.bias_ih = dict.fetch(&join(prefix, &format!("bias_ih_l{index}")), layer.bias_ih.shape())?;
            layer.bias_hh = dict.fetch(&join(prefix, &format!("bias_hh_l{index}")), layer.bias_hh.shape())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed(input_size: usize, hidden_size: usize, num_layers: usize) -> Lstm {
        let mut lstm = Lstm::new(input_size, hidden_size, num_layers, &mut ParamInit::from_seed(0));
        for layer in &mut lstm.layers {
            layer.weight_ih.fill(0.0);
            layer.weight_hh.fill(0.0);
            layer.bias_ih.fill(0.0);
            layer.bias_hh.fill(0.0);
        }
        lstm
    }

    #[test]
    fn zero_weights_give_zero_output() {
        let lstm = zeroed(4, 2, 2);
        let mut state = lstm.zero_state();
        let h = lstm.step(&DVector::from_element(4, 1.0), &mut state).unwrap();
        // i = f = o = 0.5, g = 0, so c stays 0 and h = 0.
        assert_eq!(h, DVector::zeros(2));
        assert_eq!(state.c[1], DVector::zeros(2));
    }

    #[test]
    fn cell_gate_bias_drives_state() {
        let mut lstm = zeroed(1, 1, 1);
        // Gate rows: [i, f, g, o]; push g towards tanh(1).
        lstm.layers[0].bias_ih[(2, 0)] = 1.0;
        let mut state = lstm.zero_state();
        let h = lstm.step(&DVector::zeros(1), &mut state).unwrap();
        let c = 0.5 * 1.0f64.tanh();
        assert!((state.c[0][0] - c).abs() < 1e-12);
        assert!((h[0] - 0.5 * c.tanh()).abs() < 1e-12);
    }

    #[test]
    fn stacked_layers_take_hidden_size_input() {
        let lstm = Lstm::new(6, 3, 2, &mut ParamInit::from_seed(1));
        let mut dict = StateDict::new();
        lstm.collect_parameters("lstm", &mut dict);
        assert_eq!(dict.get("lstm.weight_ih_l0").unwrap().shape(), (12, 6));
        assert_eq!(dict.get("lstm.weight_ih_l1").unwrap().shape(), (12, 3));
        assert_eq!(dict.len(), 8);
    }

    #[test]
    fn step_rejects_wrong_input_size() {
        let lstm = Lstm::new(4, 2, 1, &mut ParamInit::from_seed(0));
        let mut state = lstm.zero_state();
        assert!(matches!(
            lstm.step(&DVector::zeros(3), &mut state),
            Err(NnError::FeatureMismatch { layer: "lstm", .. })
        ));
    }
}
