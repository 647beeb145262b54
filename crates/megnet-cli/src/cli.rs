use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "MEGNet CLI - Build crystal and molecular graphs and predict their properties with MEGNet.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for batch prediction.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a structure into a graph and print its summary as TOML.
    Graph(GraphArgs),
    /// Predict properties of one or more structures with a MEGNet model.
    Predict(PredictArgs),
}

/// Arguments for the `graph` subcommand.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Path to the input structure (POSCAR/CONTCAR, *.vasp or *.xyz).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Optional configuration file; its [converter] table supplies element types and cutoff.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the bond cutoff radius in Å.
    #[arg(long, value_name = "FLOAT")]
    pub cutoff: Option<f64>,

    /// Override the element types, e.g. `--element-types H,C,O`.
    #[arg(short, long, value_name = "SYMBOLS", value_delimiter = ',')]
    pub element_types: Vec<String>,

    /// Write the summary to a file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `predict` subcommand.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Paths to the input structures.
    #[arg(short, long, required = true, num_args = 1.., value_name = "PATH")]
    pub input: Vec<PathBuf>,

    /// Path to the model configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Seed for the deterministic weight initialization.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the bond cutoff radius in Å.
    #[arg(long, value_name = "FLOAT")]
    pub cutoff: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S normalization.data-std=0.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_graph_command_with_element_list() {
        let cli = Cli::parse_from([
            "megnet", "-v", "graph", "-i", "POSCAR", "--cutoff", "5.0", "-e", "Cs,Cl",
        ]);
        assert_eq!(cli.verbose, 1);
        let Commands::Graph(args) = cli.command else {
            panic!("expected graph command");
        };
        assert_eq!(args.input, PathBuf::from("POSCAR"));
        assert_eq!(args.cutoff, Some(5.0));
        assert_eq!(args.element_types, vec!["Cs", "Cl"]);
        assert!(args.config.is_none());
    }

    #[test]
    fn parses_predict_command_with_several_inputs() {
        let cli = Cli::parse_from([
            "megnet", "predict", "-i", "a.xyz", "b.vasp", "-c", "model.toml", "--seed", "7", "-j", "2",
        ]);
        assert_eq!(cli.threads, Some(2));
        let Commands::Predict(args) = cli.command else {
            panic!("expected predict command");
        };
        assert_eq!(args.input.len(), 2);
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.config, PathBuf::from("model.toml"));
    }

    #[test]
    fn predict_requires_a_config() {
        assert!(Cli::try_parse_from(["megnet", "predict", "-i", "a.xyz"]).is_err());
    }
}
