use super::activation::Activation;
use super::conv::MegnetGraphConv;
use super::dropout::Dropout;
use super::error::NnError;
use super::mlp::Mlp;
use super::params::{ParamInit, Parameterized, StateDict, join};
use crate::core::graph::crystal_graph::CrystalGraph;
use nalgebra::DMatrix;

/// A MEGNet block: optional dense layers on each feature kind, a graph
/// convolution, optional dropout and a residual connection.
///
/// `dims` are the dense layer dims starting at the block input width; with a
/// single entry the dense layers are skipped. The convolution maps
/// `dims.last()` features to `conv_hiddens.last()` features, so the residual
/// only lines up when the block input already has `conv_hiddens.last()` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct MegnetBlock {
    edge_func: Option<Mlp>,
    node_func: Option<Mlp>,
    attr_func: Option<Mlp>,
    conv: MegnetGraphConv,
    dropout: Option<Dropout>,
    skip: bool,
}

impl MegnetBlock {
    /// # Panics
    ///
    /// Panics if `dims` or `conv_hiddens` is empty.
    pub fn new(
        dims: &[usize],
        conv_hiddens: &[usize],
        activation: Activation,
        dropout: Option<f64>,
        skip: bool,
        init: &mut ParamInit,
    ) -> Self {
        assert!(!dims.is_empty() && !conv_hiddens.is_empty(), "block dims must not be empty");

        let (edge_func, node_func, attr_func) = if dims.len() > 1 {
            (
                Some(Mlp::new(dims, activation, true, init)),
                Some(Mlp::new(dims, activation, true, init)),
                Some(Mlp::new(dims, activation, true, init)),
            )
        } else {
            (None, None, None)
        };

        let d = dims[dims.len() - 1];
        let c = conv_hiddens[conv_hiddens.len() - 1];
        let edge_dims = [&[4 * d][..], conv_hiddens].concat();
        let node_dims = [&[d + c + d][..], conv_hiddens].concat();
        let attr_dims = [&[d + c + c][..], conv_hiddens].concat();
        let conv = MegnetGraphConv::from_dims(&edge_dims, &node_dims, &attr_dims, activation, init);

        Self {
            edge_func,
            node_func,
            attr_func,
            conv,
            dropout: dropout.filter(|p| *p > 0.0).map(Dropout::new),
            skip,
        }
    }

    pub fn has_dense_layers(&self) -> bool {
        self.edge_func.is_some()
    }

    pub fn forward(
        &self,
        graph: &CrystalGraph,
        edge_feat: &DMatrix<f64>,
        node_feat: &DMatrix<f64>,
        state: &DMatrix<f64>,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>, DMatrix<f64>), NnError> {
        let (e, v, u) = match (&self.edge_func, &self.node_func, &self.attr_func) {
            (Some(fe), Some(fv), Some(fu)) => (fe.forward(edge_feat)?, fv.forward(node_feat)?, fu.forward(state)?),
            _ => (edge_feat.clone(), node_feat.clone(), state.clone()),
        };

        let (mut e, mut v, mut u) = self.conv.forward(graph, &e, &v, &u)?;

        if let Some(dropout) = &self.dropout {
            e = dropout.forward(e);
            v = dropout.forward(v);
            u = dropout.forward(u);
        }

        if self.skip {
            e = residual("megnet_block.edges", e, edge_feat)?;
            v = residual("megnet_block.nodes", v, node_feat)?;
            u = residual("megnet_block.state", u, state)?;
        }
        Ok((e, v, u))
    }
}

fn residual(layer: &'static str, out: DMatrix<f64>, input: &DMatrix<f64>) -> Result<DMatrix<f64>, NnError> {
    if out.ncols() != input.ncols() {
        return Err(NnError::FeatureMismatch {
            layer,
            expected: out.ncols(),
            found: input.ncols(),
        });
    }
    Ok(out + input)
}

impl Parameterized for MegnetBlock {
    fn collect_parameters(&self, prefix: &str, out: &mut StateDict) {
        let dense = [
            ("edge_func", &self.edge_func),
            ("node_func", &self.node_func),
            ("attr_func", &self.attr_func),
        ];
        for (name, mlp) in dense {
            if let Some(mlp) = mlp {
                mlp.collect_parameters(&join(prefix, name), out);
            }
        }
        self.conv.collect_parameters(&join(prefix, "conv"), out);
    }

    fn load_parameters(&mut self, prefix: &str, dict: &StateDict) -> Result<(), NnError> {
        let dense = [
            ("edge_func", &mut self.edge_func),
            ("node_func", &mut self.node_func),
            ("attr_func", &mut self.attr_func),
        ];
        for (name, mlp) in dense {
            if let Some(mlp) = mlp {
                mlp.load_parameters(&join(prefix, name), dict)?;
            }
        }
        self.conv.load_parameters(&join(prefix, "conv"), dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(graph: &CrystalGraph, width: usize) -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
        (
            DMatrix::from_fn(graph.num_edges(), width, |r, c| 0.1 * (r + c) as f64),
            DMatrix::from_fn(graph.num_nodes(), width, |r, c| 0.05 * (r * 2 + c) as f64),
            DMatrix::from_element(1, width, 0.2),
        )
    }

    #[test]
    fn first_block_has_no_dense_layers() {
        let block = MegnetBlock::new(&[4], &[6, 4], Activation::Swish, None, true, &mut ParamInit::from_seed(0));
        assert!(!block.has_dense_layers());

        let mut dict = StateDict::new();
        block.collect_parameters("blocks.0", &mut dict);
        assert!(dict.keys().all(|k| k.starts_with("blocks.0.conv.")));
        assert_eq!(dict.get("blocks.0.conv.edge_func.layers.0.weight").unwrap().shape(), (6, 16));
        assert_eq!(dict.get("blocks.0.conv.node_func.layers.0.weight").unwrap().shape(), (6, 12));
        assert_eq!(dict.get("blocks.0.conv.attr_func.layers.0.weight").unwrap().shape(), (6, 12));
    }

    #[test]
    fn later_blocks_project_before_convolving() {
        let graph = CrystalGraph::from_edges(3, vec![0, 1, 2], vec![1, 2, 0]);
        let block = MegnetBlock::new(&[4, 8, 3], &[5, 4], Activation::Swish, Some(0.1), true, &mut ParamInit::from_seed(3));
        assert!(block.has_dense_layers());

        let (e, v, u) = features(&graph, 4);
        let (e2, v2, u2) = block.forward(&graph, &e, &v, &u).unwrap();
        assert_eq!(e2.shape(), (3, 4));
        assert_eq!(v2.shape(), (3, 4));
        assert_eq!(u2.shape(), (1, 4));
    }

    #[test]
    fn skip_adds_the_block_input() {
        let graph = CrystalGraph::from_edges(2, vec![0, 1], vec![1, 0]);
        let mut init = ParamInit::from_seed(9);
        let with_skip = MegnetBlock::new(&[3], &[3], Activation::Tanh, None, true, &mut init);
        let mut without_skip = MegnetBlock::new(&[3], &[3], Activation::Tanh, None, false, &mut init);
        let mut dict = StateDict::new();
        with_skip.collect_parameters("", &mut dict);
        without_skip.load_parameters("", &dict).unwrap();

        let (e, v, u) = features(&graph, 3);
        let (e_skip, v_skip, u_skip) = with_skip.forward(&graph, &e, &v, &u).unwrap();
        let (e_plain, v_plain, u_plain) = without_skip.forward(&graph, &e, &v, &u).unwrap();
        assert!((e_skip - (e_plain + &e)).norm() < 1e-12);
        assert!((v_skip - (v_plain + &v)).norm() < 1e-12);
        assert!((u_skip - (u_plain + &u)).norm() < 1e-12);
    }

    #[test]
    fn skip_with_mismatched_widths_is_an_error() {
        let graph = CrystalGraph::from_edges(2, vec![0], vec![1]);
        let block = MegnetBlock::new(&[3], &[5], Activation::Swish, None, true, &mut ParamInit::from_seed(0));
        let (e, v, u) = features(&graph, 3);
        assert_eq!(
            block.forward(&graph, &e, &v, &u),
            Err(NnError::FeatureMismatch {
                layer: "megnet_block.edges",
                expected: 5,
                found: 3
            })
        );
    }
}
