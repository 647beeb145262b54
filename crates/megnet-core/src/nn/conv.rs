use super::activation::Activation;
use super::error::NnError;
use super::mlp::Mlp;
use super::ops::{broadcast_row, gather_rows, hstack, mean_rows, scatter_mean};
use super::params::{ParamInit, Parameterized, StateDict, join};
use crate::core::graph::crystal_graph::CrystalGraph;
use nalgebra::DMatrix;
use tracing::trace;

/// The MEGNet graph convolution: sequential edge, node and state updates.
///
/// - edges: `e'_ij = φe([v_i, v_j, e_ij, u])`
/// - nodes: `v'_i = φv([v_i, mean of e' over edges into i, u])`
/// - state: `u' = φu([u, mean of e', mean of v'])`
///
/// Every update MLP activates its last layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MegnetGraphConv {
    edge_func: Mlp,
    node_func: Mlp,
    attr_func: Mlp,
}

impl MegnetGraphConv {
    pub fn new(edge_func: Mlp, node_func: Mlp, attr_func: Mlp) -> Self {
        Self {
            edge_func,
            node_func,
            attr_func,
        }
    }

    /// Builds the three update MLPs from their layer dims.
    pub fn from_dims(
        edge_dims: &[usize],
        node_dims: &[usize],
        attr_dims: &[usize],
        activation: Activation,
        init: &mut ParamInit,
    ) -> Self {
        Self::new(
            Mlp::new(edge_dims, activation, true, init),
            Mlp::new(node_dims, activation, true, init),
            Mlp::new(attr_dims, activation, true, init),
        )
    }

    fn edge_update(
        &self,
        graph: &CrystalGraph,
        edge_feat: &DMatrix<f64>,
        node_feat: &DMatrix<f64>,
        state: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, NnError> {
        let v_src = gather_rows(node_feat, graph.src());
        let v_dst = gather_rows(node_feat, graph.dst());
        let u = broadcast_row(state, graph.num_edges());
        self.edge_func.forward(&hstack(&[&v_src, &v_dst, edge_feat, &u]))
    }

    fn node_update(
        &self,
        graph: &CrystalGraph,
        edge_feat: &DMatrix<f64>,
        node_feat: &DMatrix<f64>,
        state: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, NnError> {
        let incoming = scatter_mean(edge_feat, graph.dst(), graph.num_nodes());
        let u = broadcast_row(state, graph.num_nodes());
        self.node_func.forward(&hstack(&[node_feat, &incoming, &u]))
    }

    fn state_update(
        &self,
        edge_feat: &DMatrix<f64>,
        node_feat: &DMatrix<f64>,
        state: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, NnError> {
        let ue = mean_rows(edge_feat);
        let un = mean_rows(node_feat);
        self.attr_func.forward(&hstack(&[state, &ue, &un]))
    }

    /// Runs one round of message passing, returning updated `(edges, nodes, state)`.
    pub fn forward(
        &self,
        graph: &CrystalGraph,
        edge_feat: &DMatrix<f64>,
        node_feat: &DMatrix<f64>,
        state: &DMatrix<f64>,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>, DMatrix<f64>), NnError> {
        check_rows("megnet_conv.edges", edge_feat, graph.num_edges())?;
        check_rows("megnet_conv.nodes", node_feat, graph.num_nodes())?;
        check_rows("megnet_conv.state", state, 1)?;

        let edges = self.edge_update(graph, edge_feat, node_feat, state)?;
        let nodes = self.node_update(graph, &edges, node_feat, state)?;
        let state = self.state_update(&edges, &nodes, state)?;
        trace!(
            num_edges = edges.nrows(),
            num_nodes = nodes.nrows(),
            "Graph convolution finished."
        );
        Ok((edges, nodes, state))
    }
}

fn check_rows(layer: &'static str, m: &DMatrix<f64>, expected: usize) -> Result<(), NnError> {
    if m.nrows() != expected {
        return Err(NnError::RowMismatch {
            layer,
            expected,
            found: m.nrows(),
        });
    }
    Ok(())
}

impl Parameterized for MegnetGraphConv {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        self.edge_func.collect_parameters(&join(prefix, "edge_func"), out);
        self.node_func.collect_parameters(&join(prefix, "node_func"), out);
        self.attr_func.collect_parameters(&join(prefix, "attr_func"), out);
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        self.edge_func.load_parameters(&join(prefix, "edge_func"), dict)?;
        self.node_func.load_parameters(&join(prefix, "node_func"), dict)?;
        self.attr_func.load_parameters(&join(prefix, "attr_func"), dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::linear::Linear;

    const TOLERANCE: f64 = 1e-12;

    fn sum_layer(input: usize) -> Mlp {
        // Single output summing all inputs; tanh keeps it easy to check by hand.
        let mut mlp = Mlp::new(&[input, 1], Activation::Tanh, true, &mut ParamInit::from_seed(0));
        let mut dict = StateDict::new();
        let linear = Linear::from_weights(DMatrix::from_element(1, input, 1.0), DMatrix::zeros(1, 1));
        linear.collect_parameters("layers.0", &mut dict);
        mlp.load_parameters("", &dict).unwrap();
        mlp
    }

    fn path_graph() -> CrystalGraph {
        // 0 -> 1, 1 -> 0, 1 -> 2; node 0 receives one edge, node 2 one, node 1 one.
        CrystalGraph::from_edges(3, vec![0, 1, 1], vec![1, 0, 2])
    }

    #[test]
    fn output_shapes_follow_graph_and_hidden_dims() {
        let graph = path_graph();
        let conv = MegnetGraphConv::from_dims(&[8, 5, 4], &[8, 4], &[6, 4], Activation::Swish, &mut ParamInit::from_seed(1));
        let e = DMatrix::from_element(3, 2, 0.1);
        let v = DMatrix::from_element(3, 2, 0.2);
        let u = DMatrix::from_element(1, 2, 0.3);

        let (e2, v2, u2) = conv.forward(&graph, &e, &v, &u).unwrap();
        assert_eq!(e2.shape(), (3, 4));
        assert_eq!(v2.shape(), (3, 4));
        assert_eq!(u2.shape(), (1, 4));
    }

    #[test]
    fn updates_match_hand_computation() {
        let graph = path_graph();
        let conv = MegnetGraphConv::new(sum_layer(4), sum_layer(3), sum_layer(3));
        let e = DMatrix::from_column_slice(3, 1, &[0.1, 0.2, 0.3]);
        let v = DMatrix::from_column_slice(3, 1, &[1.0, 2.0, 3.0]);
        let u = DMatrix::from_element(1, 1, 0.5);

        let (e2, v2, u2) = conv.forward(&graph, &e, &v, &u).unwrap();

        let m = [
            (1.0f64 + 2.0 + 0.1 + 0.5).tanh(),
            (2.0f64 + 1.0 + 0.2 + 0.5).tanh(),
            (2.0f64 + 3.0 + 0.3 + 0.5).tanh(),
        ];
        for (k, expected) in m.iter().enumerate() {
            assert!((e2[(k, 0)] - expected).abs() < TOLERANCE);
        }

        let nodes = [
            (1.0f64 + m[1] + 0.5).tanh(),
            (2.0f64 + m[0] + 0.5).tanh(),
            (3.0f64 + m[2] + 0.5).tanh(),
        ];
        for (i, expected) in nodes.iter().enumerate() {
            assert!((v2[(i, 0)] - expected).abs() < TOLERANCE);
        }

        let mean_m = m.iter().sum::<f64>() / 3.0;
        let mean_v = nodes.iter().sum::<f64>() / 3.0;
        assert!((u2[(0, 0)] - (0.5 + mean_m + mean_v).tanh()).abs() < TOLERANCE);
    }

    #[test]
    fn node_without_incoming_edges_sees_zero_message() {
        let graph = CrystalGraph::from_edges(2, vec![0], vec![1]);
        let conv = MegnetGraphConv::new(sum_layer(4), sum_layer(3), sum_layer(3));
        let e = DMatrix::from_element(1, 1, 1.0);
        let v = DMatrix::from_column_slice(2, 1, &[0.25, 0.75]);
        let u = DMatrix::zeros(1, 1);

        let (_, v2, _) = conv.forward(&graph, &e, &v, &u).unwrap();
        assert!((v2[(0, 0)] - 0.25f64.tanh()).abs() < TOLERANCE);
    }

    #[test]
    fn rejects_feature_rows_that_do_not_match_the_graph() {
        let graph = path_graph();
        let conv = MegnetGraphConv::new(sum_layer(4), sum_layer(3), sum_layer(3));
        let err = conv
            .forward(&graph, &DMatrix::zeros(2, 1), &DMatrix::zeros(3, 1), &DMatrix::zeros(1, 1))
            .unwrap_err();
        assert_eq!(
            err,
            NnError::RowMismatch {
                layer: "megnet_conv.edges",
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn parameter_names_are_grouped_by_update() {
        let conv = MegnetGraphConv::from_dims(&[4, 2], &[3, 2], &[3, 2], Activation::Swish, &mut ParamInit::from_seed(0));
        let mut dict = StateDict::new();
        conv.collect_parameters("conv", &mut dict);
        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "conv.attr_func.layers.0.bias",
                "conv.attr_func.layers.0.weight",
                "conv.edge_func.layers.0.bias",
                "conv.edge_func.layers.0.weight",
                "conv.node_func.layers.0.bias",
                "conv.node_func.layers.0.weight",
            ]
        );
    }
}
