use super::crystal_graph::CrystalGraph;
use super::neighbors::{ImageLimitError, NeighborList, molecule_neighbors, periodic_neighbors};
use crate::core::models::structure::Structure;
use itertools::Itertools;
use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;
use tracing::{debug, instrument};

/// State attributes handed out with every freshly converted graph.
pub const DEFAULT_STATE_ATTR: [f64; 2] = [0.0, 0.0];

#[derive(Debug, Error, PartialEq, Clone)]
pub enum GraphError {
    #[error("Element '{symbol}' at site {site} is not in the element types {element_types:?}")]
    UnknownElementType {
        symbol: String,
        site: usize,
        element_types: Vec<String>,
    },
    #[error("Bond arrays differ in length (src: {src}, dst: {dst}, images: {images})")]
    BondLengthMismatch { src: usize, dst: usize, images: usize },
    #[error("Bond {bond} references site {site}, but the structure has {num_sites} sites")]
    SiteOutOfRange {
        bond: usize,
        site: usize,
        num_sites: usize,
    },
    #[error("Got {coords} coordinates for {num_sites} sites")]
    CoordinateCountMismatch { coords: usize, num_sites: usize },
    #[error("A periodic converter needs a structure with a lattice")]
    MissingLattice,
    #[error("Cutoff must be positive (got {0})")]
    InvalidCutoff(f64),
    #[error(transparent)]
    ImageLimit(#[from] ImageLimitError),
}

/// Converts an input structure into a [`CrystalGraph`] plus its state attributes.
pub trait GraphConverter {
    /// The element symbols whose position defines each node's `node_type`.
    fn element_types(&self) -> &[String];

    /// Builds the graph of `structure` and the default state attributes.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] if the structure cannot be represented, e.g. it
    /// contains an element outside [`element_types`](Self::element_types).
    fn get_graph(&self, structure: &Structure) -> Result<(CrystalGraph, Vec<f64>), GraphError>;
}

/// Assembles a graph from a structure whose bonds were already found.
///
/// `src_id[k] → dst_id[k]` is bond `k` with the neighbor at periodic image
/// `images[k]`; `lattice` has the lattice vectors as rows (zero for molecules).
/// Each node's type is the index of its element symbol in `element_types`.
///
/// # Return
///
/// The graph and the default state attributes `[0.0, 0.0]`.
///
/// # Errors
///
/// Returns an error when bond arrays disagree in length, a bond points past
/// the last site, the coordinates do not match the site count, or a site's
/// element is absent from `element_types`.
pub fn graph_from_processed_structure(
    structure: &Structure,
    src_id: &[usize],
    dst_id: &[usize],
    images: &[[i32; 3]],
    lattice: &Matrix3<f64>,
    element_types: &[String],
    cart_coords: &[Point3<f64>],
) -> Result<(CrystalGraph, Vec<f64>), GraphError> {
    let num_sites = structure.len();
    if src_id.len() != dst_id.len() || src_id.len() != images.len() {
        return Err(GraphError::BondLengthMismatch {
            src: src_id.len(),
            dst: dst_id.len(),
            images: images.len(),
        });
    }
    if cart_coords.len() != num_sites {
        return Err(GraphError::CoordinateCountMismatch {
            coords: cart_coords.len(),
            num_sites,
        });
    }
    if let Some((bond, &site)) = src_id
        .iter()
        .chain(dst_id)
        .enumerate()
        .find(|(_, site)| **site >= num_sites)
    {
        return Err(GraphError::SiteOutOfRange {
            bond: bond % src_id.len().max(1),
            site,
            num_sites,
        });
    }

    let node_type = structure
        .sites()
        .iter()
        .enumerate()
        .map(|(site, s)| {
            element_types
                .iter()
                .position(|symbol| symbol == s.symbol())
                .ok_or_else(|| GraphError::UnknownElementType {
                    symbol: s.symbol().to_string(),
                    site,
                    element_types: element_types.to_vec(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let transpose = lattice.transpose();
    let pbc_offshift = images
        .iter()
        .map(|image| transpose * Vector3::new(image[0] as f64, image[1] as f64, image[2] as f64))
        .collect();

    let graph = CrystalGraph {
        num_nodes: num_sites,
        src: src_id.to_vec(),
        dst: dst_id.to_vec(),
        pbc_offset: images.to_vec(),
        pbc_offshift,
        lattice: *lattice,
        node_type,
        pos: cart_coords.to_vec(),
    };
    Ok((graph, DEFAULT_STATE_ATTR.to_vec()))
}

fn validate_cutoff(cutoff: f64) -> Result<(), GraphError> {
    if cutoff > 0.0 && cutoff.is_finite() {
        Ok(())
    } else {
        Err(GraphError::InvalidCutoff(cutoff))
    }
}

fn graph_from_neighbors(
    structure: &Structure,
    neighbors: &NeighborList,
    lattice: &Matrix3<f64>,
    element_types: &[String],
) -> Result<(CrystalGraph, Vec<f64>), GraphError> {
    graph_from_processed_structure(
        structure,
        &neighbors.center_indices,
        &neighbors.neighbor_indices,
        &neighbors.images,
        lattice,
        element_types,
        &structure.cart_coords(),
    )
}

/// Converts periodic crystals, bonding every pair of sites (including periodic
/// images) within `cutoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure2Graph {
    pub element_types: Vec<String>,
    pub cutoff: f64,
}

impl Structure2Graph {
    pub fn new(element_types: Vec<String>, cutoff: f64) -> Self {
        Self {
            element_types,
            cutoff,
        }
    }
}

impl GraphConverter for Structure2Graph {
    fn element_types(&self) -> &[String] {
        &self.element_types
    }

    #[instrument(skip_all, name = "structure_to_graph", fields(num_sites = structure.len()))]
    fn get_graph(&self, structure: &Structure) -> Result<(CrystalGraph, Vec<f64>), GraphError> {
        validate_cutoff(self.cutoff)?;
        let lattice = structure.lattice().ok_or(GraphError::MissingLattice)?;
        let neighbors = periodic_neighbors(lattice, &structure.cart_coords(), self.cutoff)?;
        debug!(num_bonds = neighbors.len(), "Periodic neighbor search finished.");
        graph_from_neighbors(structure, &neighbors, lattice.matrix(), &self.element_types)
    }
}

/// Converts isolated molecules, bonding every ordered pair of distinct sites
/// within `cutoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule2Graph {
    pub element_types: Vec<String>,
    pub cutoff: f64,
}

impl Molecule2Graph {
    pub fn new(element_types: Vec<String>, cutoff: f64) -> Self {
        Self {
            element_types,
            cutoff,
        }
    }
}

impl GraphConverter for Molecule2Graph {
    fn element_types(&self) -> &[String] {
        &self.element_types
    }

    #[instrument(skip_all, name = "molecule_to_graph", fields(num_sites = structure.len()))]
    fn get_graph(&self, structure: &Structure) -> Result<(CrystalGraph, Vec<f64>), GraphError> {
        validate_cutoff(self.cutoff)?;
        let neighbors = molecule_neighbors(&structure.cart_coords(), self.cutoff);
        debug!(num_bonds = neighbors.len(), "Molecular neighbor search finished.");
        graph_from_neighbors(structure, &neighbors, &Matrix3::zeros(), &self.element_types)
    }
}

/// Picks the converter that matches the structure: periodic for crystals,
/// molecular otherwise.
pub fn get_graph_auto(
    structure: &Structure,
    element_types: &[String],
    cutoff: f64,
) -> Result<(CrystalGraph, Vec<f64>), GraphError> {
    if structure.is_periodic() {
        Structure2Graph::new(element_types.to_vec(), cutoff).get_graph(structure)
    } else {
        Molecule2Graph::new(element_types.to_vec(), cutoff).get_graph(structure)
    }
}

/// Unique element symbols across a dataset, sorted by atomic number.
pub fn element_list<'a>(structures: impl IntoIterator<Item = &'a Structure>) -> Vec<String> {
    structures
        .into_iter()
        .flat_map(|structure| structure.sites().iter().map(|site| site.species))
        .sorted()
        .dedup()
        .map(|element| element.symbol().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::lattice::Lattice;

    const TOLERANCE: f64 = 1e-9;

    fn types(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    fn cscl() -> Structure {
        Structure::from_fractional(
            Lattice::cubic(4.0).unwrap(),
            &["Cs", "Cl"],
            &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
        )
        .unwrap()
    }

    #[test]
    fn processed_structure_records_offsets_types_and_positions() {
        let structure = cscl();
        let lattice = *structure.lattice().unwrap().matrix();
        let (graph, state) = graph_from_processed_structure(
            &structure,
            &[0, 1],
            &[1, 0],
            &[[0, 0, 0], [1, -1, 0]],
            &lattice,
            &types(&["Cl", "Cs"]),
            &structure.cart_coords(),
        )
        .unwrap();

        assert_eq!(state, vec![0.0, 0.0]);
        assert_eq!(graph.num_nodes(), 2);
        assert_eq!(graph.node_type(), &[1, 0]);
        assert_eq!(graph.pbc_offset(), &[[0, 0, 0], [1, -1, 0]]);
        assert_eq!(graph.pbc_offshift()[1], Vector3::new(4.0, -4.0, 0.0));
        assert_eq!(graph.lattice(), &lattice);
        assert_eq!(graph.pos()[1], Point3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn processed_structure_rejects_unknown_element() {
        let structure = cscl();
        let result = graph_from_processed_structure(
            &structure,
            &[],
            &[],
            &[],
            &Matrix3::zeros(),
            &types(&["Cs"]),
            &structure.cart_coords(),
        );
        assert!(matches!(
            result,
            Err(GraphError::UnknownElementType { site: 1, .. })
        ));
    }

    #[test]
    fn processed_structure_validates_bond_arrays() {
        let structure = cscl();
        let element_types = types(&["Cl", "Cs"]);
        let coords = structure.cart_coords();

        let mismatch = graph_from_processed_structure(
            &structure,
            &[0],
            &[1, 0],
            &[[0; 3]],
            &Matrix3::zeros(),
            &element_types,
            &coords,
        );
        assert!(matches!(mismatch, Err(GraphError::BondLengthMismatch { .. })));

        let out_of_range = graph_from_processed_structure(
            &structure,
            &[0],
            &[5],
            &[[0; 3]],
            &Matrix3::zeros(),
            &element_types,
            &coords,
        );
        assert_eq!(
            out_of_range.unwrap_err(),
            GraphError::SiteOutOfRange {
                bond: 0,
                site: 5,
                num_sites: 2
            }
        );

        let coords_mismatch = graph_from_processed_structure(
            &structure,
            &[],
            &[],
            &[],
            &Matrix3::zeros(),
            &element_types,
            &coords[..1],
        );
        assert!(matches!(
            coords_mismatch,
            Err(GraphError::CoordinateCountMismatch { .. })
        ));
    }

    #[test]
    fn structure2graph_bonds_cscl_nearest_neighbors() {
        let converter = Structure2Graph::new(types(&["Cl", "Cs"]), 3.5);
        let (graph, state) = converter.get_graph(&cscl()).unwrap();

        // Each site has eight nearest neighbors of the other species at sqrt(3) * 2 Å.
        assert_eq!(graph.num_edges(), 16);
        assert_eq!(state, DEFAULT_STATE_ATTR.to_vec());
        let expected = 12.0f64.sqrt();
        for distance in graph.bond_distances() {
            assert!((distance - expected).abs() < TOLERANCE);
        }
        for (s, d) in graph.edges() {
            assert_ne!(s, d);
        }
        assert_eq!(graph.in_degrees(), vec![8, 8]);
    }

    #[test]
    fn structure2graph_offshift_matches_image_times_lattice() {
        let structure = cscl();
        let converter = Structure2Graph::new(types(&["Cl", "Cs"]), 4.5);
        let (graph, _) = converter.get_graph(&structure).unwrap();
        let lattice = structure.lattice().unwrap();
        for (image, shift) in graph.pbc_offset().iter().zip(graph.pbc_offshift()) {
            assert!((lattice.image_shift(image) - shift).norm() < TOLERANCE);
        }
    }

    #[test]
    fn structure2graph_requires_lattice_and_positive_cutoff() {
        let molecule = Structure::from_cartesian(&["H", "H"], &[[0.0; 3], [0.74, 0.0, 0.0]]).unwrap();
        let converter = Structure2Graph::new(types(&["H"]), 4.0);
        assert_eq!(
            converter.get_graph(&molecule).unwrap_err(),
            GraphError::MissingLattice
        );

        let bad_cutoff = Structure2Graph::new(types(&["Cl", "Cs"]), 0.0);
        assert_eq!(
            bad_cutoff.get_graph(&cscl()).unwrap_err(),
            GraphError::InvalidCutoff(0.0)
        );
    }

    #[test]
    fn structure2graph_rejects_cutoff_spanning_too_many_images() {
        let huge_cutoff = Structure2Graph::new(types(&["Cl", "Cs"]), 1.0e6);
        let err = huge_cutoff.get_graph(&cscl()).unwrap_err();
        assert!(matches!(err, GraphError::ImageLimit(ImageLimitError { cutoff, .. }) if cutoff == 1.0e6));
    }

    #[test]
    fn molecule2graph_connects_pairs_within_cutoff() {
        let water = Structure::from_cartesian(
            &["O", "H", "H"],
            &[[0.0, 0.0, 0.0], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]],
        )
        .unwrap();
        let converter = Molecule2Graph::new(types(&["H", "O"]), 1.2);
        let (graph, _) = converter.get_graph(&water).unwrap();

        assert_eq!(graph.node_type(), &[1, 0, 0]);
        // O-H bonds in both directions; the H-H distance (~1.52 Å) is beyond the cutoff.
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![(0, 1), (0, 2), (1, 0), (2, 0)]);
        assert_eq!(graph.lattice(), &Matrix3::zeros());
        assert!(graph.pbc_offset().iter().all(|image| *image == [0, 0, 0]));
    }

    #[test]
    fn get_graph_auto_chooses_converter_by_periodicity() {
        let (crystal_graph, _) = get_graph_auto(&cscl(), &types(&["Cl", "Cs"]), 3.5).unwrap();
        assert_eq!(crystal_graph.num_edges(), 16);

        let dimer = Structure::from_cartesian(&["H", "H"], &[[0.0; 3], [0.74, 0.0, 0.0]]).unwrap();
        let (molecule_graph, _) = get_graph_auto(&dimer, &types(&["H"]), 1.0).unwrap();
        assert_eq!(molecule_graph.num_edges(), 2);
    }

    #[test]
    fn element_list_is_sorted_by_atomic_number_and_unique() {
        let water =
            Structure::from_cartesian(&["O", "H", "H"], &[[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
                .unwrap();
        let list = element_list([&cscl(), &water]);
        assert_eq!(list, types(&["H", "O", "Cl", "Cs"]));
    }
}
