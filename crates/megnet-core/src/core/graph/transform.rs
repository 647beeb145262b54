use super::crystal_graph::CrystalGraph;
use std::borrow::Cow;
use std::fmt::Debug;

/// A rewrite applied to the graph right before a MEGNet block runs.
///
/// Transformations must keep the edge count unchanged, since edge features are
/// carried from block to block.
pub trait GraphTransform: Debug + Send + Sync {
    fn apply<'a>(&self, graph: Cow<'a, CrystalGraph>) -> Cow<'a, CrystalGraph>;
}

/// Leaves the graph untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl GraphTransform for Identity {
    fn apply<'a>(&self, graph: Cow<'a, CrystalGraph>) -> Cow<'a, CrystalGraph> {
        graph
    }
}
