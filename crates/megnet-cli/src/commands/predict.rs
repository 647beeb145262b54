use crate::cli::PredictArgs;
use crate::config::PartialMegnetConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use megnet::core::io::traits::read_structure_path;
use megnet::model::megnet::Megnet;
use megnet::model::predictor::MegnetCalculator;
use megnet::nn::params::ParamInit;
use megnet::workflows::{self, progress::ProgressReporter};
use tracing::{info, warn};

pub fn run(args: PredictArgs) -> Result<()> {
    let partial_config = PartialMegnetConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = partial_config.merge_predict_args(&args)?;

    let structures = args
        .input
        .iter()
        .map(|path| {
            info!("Loading input structure from {:?}", path);
            read_structure_path(path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    warn!(
        "No trained weights are loaded; the model is initialized from seed {}.",
        settings.seed
    );
    let model = Megnet::new(settings.model, &mut ParamInit::from_seed(settings.seed))?;
    info!("Model built with {} parameters.", model.num_parameters());
    let calculator = MegnetCalculator::new(model, settings.expansion)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let predictions = workflows::predict::run(&structures, &calculator, &reporter)?;

    for (path, prediction) in args.input.iter().zip(&predictions) {
        println!(
            "{}\t{}\t{:.6}",
            path.display(),
            prediction.formula,
            prediction.value
        );
    }
    Ok(())
}
