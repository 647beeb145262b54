use nalgebra::{Matrix3, Point3, Vector3};

/// A directed graph built from an atomic structure.
///
/// Nodes are sites. Edge `e` points from `src[e]` to `dst[e]`; the neighbor
/// `dst[e]` sits at periodic image `pbc_offset[e]`, whose Cartesian translation is
/// `pbc_offshift[e] = pbc_offset[e] · lattice`. Molecules use zero images and a
/// zero lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct CrystalGraph {
    pub(crate) num_nodes: usize,
    pub(crate) src: Vec<usize>,
    pub(crate) dst: Vec<usize>,
    pub(crate) pbc_offset: Vec<[i32; 3]>,
    pub(crate) pbc_offshift: Vec<Vector3<f64>>,
    pub(crate) lattice: Matrix3<f64>,
    pub(crate) node_type: Vec<usize>,
    pub(crate) pos: Vec<Point3<f64>>,
}

impl CrystalGraph {
    /// Creates a bare topology: nodes at the origin, all of type 0, with zero images.
    ///
    /// Mostly useful for exercising layers that only look at connectivity.
    ///
    /// # Panics
    ///
    /// Panics if `src` and `dst` differ in length or reference a node `>= num_nodes`.
    pub fn from_edges(num_nodes: usize, src: Vec<usize>, dst: Vec<usize>) -> Self {
        assert_eq!(src.len(), dst.len(), "src and dst must have the same length");
        assert!(
            src.iter().chain(&dst).all(|&n| n < num_nodes),
            "edge endpoint out of range"
        );
        let num_edges = src.len();
        Self {
            num_nodes,
            src,
            dst,
            pbc_offset: vec![[0; 3]; num_edges],
            pbc_offshift: vec![Vector3::zeros(); num_edges],
            lattice: Matrix3::zeros(),
            node_type: vec![0; num_nodes],
            pos: vec![Point3::origin(); num_nodes],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    pub fn src(&self) -> &[usize] {
        &self.src
    }

    pub fn dst(&self) -> &[usize] {
        &self.dst
    }

    /// Iterates over `(src, dst)` pairs in edge order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }

    pub fn pbc_offset(&self) -> &[[i32; 3]] {
        &self.pbc_offset
    }

    pub fn pbc_offshift(&self) -> &[Vector3<f64>] {
        &self.pbc_offshift
    }

    pub fn lattice(&self) -> &Matrix3<f64> {
        &self.lattice
    }

    pub fn node_type(&self) -> &[usize] {
        &self.node_type
    }

    pub fn pos(&self) -> &[Point3<f64>] {
        &self.pos
    }

    /// Cartesian bond vectors `pos[dst] + pbc_offshift - pos[src]`.
    pub fn bond_vectors(&self) -> Vec<Vector3<f64>> {
        self.edges()
            .zip(&self.pbc_offshift)
            .map(|((s, d), shift)| self.pos[d] + shift - self.pos[s])
            .collect()
    }

    pub fn bond_distances(&self) -> Vec<f64> {
        self.bond_vectors().iter().map(|v| v.norm()).collect()
    }

    /// Number of edges arriving at each node.
    pub fn in_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.num_nodes];
        for &d in &self.dst {
            degrees[d] += 1;
        }
        degrees
    }

    /// Keeps only the edges for which `keep(edge_index)` is true.
    pub fn retain_edges(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let kept: Vec<usize> = (0..self.num_edges()).filter(|&e| keep(e)).collect();
        self.src = kept.iter().map(|&e| self.src[e]).collect();
        self.dst = kept.iter().map(|&e| self.dst[e]).collect();
        self.pbc_offset = kept.iter().map(|&e| self.pbc_offset[e]).collect();
        self.pbc_offshift = kept.iter().map(|&e| self.pbc_offshift[e]).collect();
    }
}
