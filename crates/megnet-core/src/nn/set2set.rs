use super::error::NnError;
use super::lstm::Lstm;
use super::ops::softmax;
use super::params::{ParamInit, Parameterized, StateDict, join};
use crate::core::graph::crystal_graph::CrystalGraph;
use nalgebra::{DMatrix, DVector};

/// Set2Set readout: an attention-based, order-invariant pooling of a set of
/// feature rows.
///
/// Starting from `q* = 0`, each iteration runs an LSTM step on `q*` to get a
/// query `q`, attends over the rows `x_k` with weights `softmax(x_k · q)`, and sets
/// `q* = [q, Σ α_k x_k]`. The output has twice the input width.
#[derive(Debug, Clone, PartialEq)]
pub struct Set2Set {
    input_dim: usize,
    n_iters: usize,
    lstm: Lstm,
}

impl Set2Set {
    pub fn new(input_dim: usize, n_iters: usize, n_layers: usize, init: &mut ParamInit) -> Self {
        Self {
            input_dim,
            n_iters,
            lstm: Lstm::new(2 * input_dim, input_dim, n_layers, init),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        2 * self.input_dim
    }

    /// Pools `features` (one row per set element) into a `1 × 2·input_dim` row.
    ///
    /// An empty set reads out zeros, leaving only the LSTM query in `q*`.
    pub fn pool(&self, features: &DMatrix<f64>) -> Result<DMatrix<f64>, NnError> {
        if features.ncols() != self.input_dim {
            return Err(NnError::FeatureMismatch {
                layer: "set2set",
                expected: self.input_dim,
                found: features.ncols(),
            });
        }

        let d = self.input_dim;
        let mut state = self.lstm.zero_state();
        let mut q_star = DVector::zeros(2 * d);
        for _ in 0..self.n_iters {
            let q = self.lstm.step(&q_star, &mut state)?;
            let readout = if features.nrows() == 0 {
                DVector::zeros(d)
            } else {
                let logits: Vec<f64> = features.row_iter().map(|row| row.transpose().dot(&q)).collect();
                let alpha = softmax(&logits);
                features.transpose() * DVector::from_vec(alpha)
            };
            q_star.rows_mut(0, d).copy_from(&q);
            q_star.rows_mut(d, d).copy_from(&readout);
        }
        Ok(DMatrix::from_row_slice(1, 2 * d, q_star.as_slice()))
    }

    /// Pools node features over the nodes of `graph`.
    pub fn forward(&self, graph: &CrystalGraph, node_feat: &DMatrix<f64>) -> Result<DMatrix<f64>, NnError> {
        if node_feat.nrows() != graph.num_nodes() {
            return Err(NnError::RowMismatch {
                layer: "set2set",
                expected: graph.num_nodes(),
                found: node_feat.nrows(),
            });
        }
        self.pool(node_feat)
    }
}

impl Parameterized for Set2Set {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        self.lstm.collect_parameters(&join(prefix, "lstm"), out);
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        self.lstm.load_parameters(&join(prefix, "lstm"), dict)
    }
}

/// Set2Set pooling over the edges of a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSet2Set(Set2Set);

impl EdgeSet2Set {
    pub fn new(input_dim: usize, n_iters: usize, n_layers: usize, init: &mut ParamInit) -> Self {
        Self(Set2Set::new(input_dim, n_iters, n_layers, init))
    }

    pub fn output_dim(&self) -> usize {
        self.0.output_dim()
    }

    pub fn forward(&self, graph: &CrystalGraph, edge_feat: &DMatrix<f64>) -> Result<DMatrix<f64>, NnError> {
        if edge_feat.nrows() != graph.num_edges() {
            return Err(NnError::RowMismatch {
                layer: "edge_set2set",
                expected: graph.num_edges(),
                found: edge_feat.nrows(),
            });
        }
        self.0.pool(edge_feat)
    }
}

impl Parameterized for EdgeSet2Set {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        self.0.collect_parameters(prefix, out);
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        self.0.load_parameters(prefix, dict)
    }
}
