use crate::cli::GraphArgs;
use crate::config::PartialMegnetConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use megnet::core::io::traits::read_structure_path;
use megnet::workflows::{self, progress::ProgressReporter};
use tracing::info;

pub fn run(args: GraphArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialMegnetConfig::from_file(path)?,
        None => PartialMegnetConfig::default(),
    };
    let settings = partial_config.merge_graph_args(&args)?;

    info!("Loading input structure from {:?}", &args.input);
    let structure = read_structure_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let summary = workflows::graph::run(
        &structure,
        settings.element_types.as_deref(),
        settings.cutoff,
        &reporter,
    )?;

    let text = toml::to_string(&summary)
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to serialize graph summary: {}", e)))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, text)?;
            println!(
                "✓ Graph of {} ({} nodes, {} edges) written to: {}",
                summary.formula,
                summary.num_nodes,
                summary.num_edges,
                path.display()
            );
        }
        None => print!("{}", text),
    }
    Ok(())
}
