use super::error::WorkflowError;
use super::progress::{Progress, ProgressReporter};
use crate::core::graph::converter::get_graph_auto;
use crate::core::models::structure::Structure;
use crate::model::predictor::MegnetCalculator;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StructurePrediction {
    pub formula: String,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub value: f64,
}

/// Converts one structure with the model's element types and cutoff, then predicts.
pub fn predict_one(
    index: usize,
    structure: &Structure,
    calculator: &MegnetCalculator,
) -> Result<StructurePrediction, WorkflowError> {
    let config = calculator.model().config();
    let formula = structure.formula();
    let (graph, state_attr) = get_graph_auto(structure, &config.element_types, config.cutoff)
        .map_err(|source| WorkflowError::Graph {
            index,
            formula: formula.clone(),
            source,
        })?;

    let value = calculator
        .predict(&graph, &state_attr)
        .map_err(|source| WorkflowError::Prediction {
            index,
            formula: formula.clone(),
            source,
        })?;
    debug!(index, value, "Structure {} predicted.", formula);

    Ok(StructurePrediction {
        formula,
        num_nodes: graph.num_nodes(),
        num_edges: graph.num_edges(),
        value,
    })
}

/// Predicts every structure, returning results in input order.
///
/// Structures are independent; with the `parallel` feature they are evaluated
/// concurrently against the shared model. The first failing structure (by
/// index) aborts the batch.
#[instrument(skip_all, name = "predict_workflow", fields(num_structures = structures.len()))]
pub fn run(
    structures: &[Structure],
    calculator: &MegnetCalculator,
    reporter: &ProgressReporter,
) -> Result<Vec<StructurePrediction>, WorkflowError> {
    if calculator.model().config().element_types.is_empty() {
        return Err(WorkflowError::NoElementTypes);
    }

    reporter.report(Progress::PhaseStart { name: "Predicting" });
    reporter.report(Progress::TaskStart {
        total_steps: structures.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = structures.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = structures.par_iter().enumerate();

    let results: Vec<Result<StructurePrediction, WorkflowError>> = iterator
        .map(|(index, structure)| {
            let result = predict_one(index, structure, calculator);
            reporter.report(Progress::TaskIncrement);
            result
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let predictions = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    info!("Prediction complete for {} structure(s).", predictions.len());
    Ok(predictions)
}
