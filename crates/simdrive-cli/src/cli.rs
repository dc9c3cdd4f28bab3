use clap::{Args, Parser, Subcommand, ValueEnum};
use simdrive::engine::observable::Engine;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "simdrive CLI - Prepare, run and monitor GROMACS and NAMD simulations, and extract energy records from their logs.",
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
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the engine input files for a run without launching it.
    Setup(SetupArgs),
    /// Prepare a run, launch the engine and follow it to completion.
    Run(RunArgs),
    /// Extract energy records from an existing engine log.
    Records(RecordsArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineChoice {
    Gromacs,
    Namd,
}

impl From<EngineChoice> for Engine {
    fn from(choice: EngineChoice) -> Self {
        match choice {
            EngineChoice::Gromacs => Engine::Gromacs,
            EngineChoice::Namd => Engine::Namd,
        }
    }
}

/// Options shared by every command that prepares a run.
#[derive(Args, Debug, Clone)]
pub struct RunFileArgs {
    /// Path to the run configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the engine named in the config file.
    #[arg(short, long, value_enum)]
    pub engine: Option<EngineChoice>,

    /// Override the directory the run is prepared in.
    #[arg(short, long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Override the base name of every generated file.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Override the engine executable.
    #[arg(long, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    /// Override the random seed passed to the engine.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S protocol.runtime-ns=0.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `setup` subcommand.
#[derive(Args, Debug)]
pub struct SetupArgs {
    #[command(flatten)]
    pub run_file: RunFileArgs,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub run_file: RunFileArgs,

    /// Give up waiting after this many seconds; the engine keeps running.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Write every parsed record to a CSV file once the run ends.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,
}

/// Arguments for the `records` subcommand.
#[derive(Args, Debug)]
pub struct RecordsArgs {
    /// Engine that wrote the log.
    #[arg(short, long, value_enum, required = true)]
    pub engine: EngineChoice,

    /// The engine log (`<name>.log` for GROMACS, the captured stdout for NAMD).
    #[arg(required = true, value_name = "LOG")]
    pub log: PathBuf,

    /// Observables to print, by name (e.g. potential, temperature). Repeatable.
    #[arg(short, long = "observable", value_name = "NAME")]
    pub observables: Vec<String>,

    /// Write every parsed record to a CSV file.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,
}
