use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use crate::core::graph::converter::{element_list, get_graph_auto};
use crate::core::models::structure::Structure;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BondRecord {
    pub src: usize,
    pub dst: usize,
    pub image: [i32; 3],
    pub distance: f64,
}

/// A serializable description of a converted graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GraphSummary {
    pub formula: String,
    pub periodic: bool,
    pub cutoff: f64,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub element_types: Vec<String>,
    pub node_types: Vec<usize>,
    pub state_attr: Vec<f64>,
    pub bonds: Vec<BondRecord>,
}

/// Converts `structure` and summarizes the graph.
///
/// When `element_types` is `None` the structure's own elements are used, sorted
/// by atomic number.
#[instrument(skip_all, name = "graph_workflow", fields(num_sites = structure.len(), cutoff = cutoff))]
pub fn run(
    structure: &Structure,
    element_types: Option<&[String]>,
    cutoff: f64,
    reporter: &ProgressReporter,
) -> Result<GraphSummary, WorkflowError> {
    reporter.report(Progress::PhaseStart {
        name: "Building Graph",
    });

    let element_types = match element_types {
        Some(types) => types.to_vec(),
        None => element_list([structure]),
    };
    let formula = structure.formula();
    let (graph, state_attr) =
        get_graph_auto(structure, &element_types, cutoff).map_err(|source| WorkflowError::Graph {
            index: 0,
            formula: formula.clone(),
            source,
        })?;

    let bonds = graph
        .edges()
        .zip(graph.pbc_offset())
        .zip(graph.bond_distances())
        .map(|(((src, dst), image), distance)| BondRecord {
            src,
            dst,
            image: *image,
            distance,
        })
        .collect();

    reporter.report(Progress::PhaseFinish);
    info!(
        num_nodes = graph.num_nodes(),
        num_edges = graph.num_edges(),
        "Graph of {} built.",
        formula
    );

    Ok(GraphSummary {
        formula,
        periodic: structure.is_periodic(),
        cutoff,
        num_nodes: graph.num_nodes(),
        num_edges: graph.num_edges(),
        element_types,
        node_types: graph.node_type().to_vec(),
        state_attr,
        bonds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::lattice::Lattice;

    #[test]
    fn summarizes_molecule_with_inferred_element_types() {
        let water = Structure::from_cartesian(
            &["O", "H", "H"],
            &[[0.0, 0.0, 0.0], [0.757, 0.586, 0.0], [-0.757, 0.586, 0.0]],
        )
        .unwrap();
        let summary = run(&water, None, 1.2, &ProgressReporter::new()).unwrap();

        assert_eq!(summary.formula, "H2O");
        assert!(!summary.periodic);
        assert_eq!(summary.element_types, vec!["H", "O"]);
        assert_eq!(summary.node_types, vec![1, 0, 0]);
        assert_eq!(summary.num_edges, 4);
        assert_eq!(summary.bonds.len(), 4);
        assert_eq!(summary.bonds[0].src, 0);
        assert_eq!(summary.bonds[0].image, [0, 0, 0]);
        assert_eq!(summary.state_attr, vec![0.0, 0.0]);
    }

    #[test]
    fn summary_serializes_to_toml() {
        let crystal = Structure::from_fractional(
            Lattice::cubic(4.0).unwrap(),
            &["Cs", "Cl"],
            &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
        )
        .unwrap();
        let summary = run(&crystal, None, 3.5, &ProgressReporter::new()).unwrap();
        assert!(summary.periodic);
        assert_eq!(summary.num_edges, 16);

        let text = toml::to_string(&summary).unwrap();
        assert!(text.contains("num-edges = 16"));
        assert!(text.contains("[[bonds]]"));
    }

    #[test]
    fn unknown_element_type_is_reported_with_formula() {
        let water = Structure::from_cartesian(&["O", "H"], &[[0.0; 3], [0.96, 0.0, 0.0]]).unwrap();
        let types = vec!["O".to_string()];
        let err = run(&water, Some(&types), 1.2, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::Graph { index: 0, .. }));
        assert!(err.to_string().contains("HO"));
    }
}
