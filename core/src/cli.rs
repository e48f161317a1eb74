use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::executor::{FunctionModels, InitialValuations};
use crate::explorer::{Explorer, ExplorerOptions, StateSpace};
use crate::parser::parse_function_models;

#[derive(Parser)]
#[command(name = "schimp")]
#[command(about = "SCHIMP - probabilistic imperative programs as finite state spaces", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse, check and resolve a program, then print its command listing
    Check {
        /// Program source file
        program: PathBuf,

        /// Function resource model file
        #[arg(short = 'f', long = "fnmodel-file")]
        models: Option<PathBuf>,
    },

    /// Explore the state space of a program
    Explore {
        /// Program source file
        program: PathBuf,

        /// Function resource model file
        #[arg(short = 'f', long = "fnmodel-file")]
        models: Option<PathBuf>,

        /// Maximum number of states (overrides config)
        #[arg(long)]
        max_states: Option<usize>,

        /// Keep every intermediate state instead of collapsing deterministic steps
        #[arg(short = 'a', long = "all-transitions")]
        all_transitions: bool,

        /// Write the state space as JSON to this file
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured filter.
/// A second call is a no-op.
pub fn init_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    let (max_states, collapse) = match &cli.command {
        Commands::Explore {
            max_states,
            all_transitions,
            ..
        } => (*max_states, all_transitions.then_some(false)),
        _ => (None, None),
    };

    // Config errors surface before any command output
    let config = Config::builder()
        .config_path(cli.config.as_ref().map(PathBuf::from))
        .max_states(max_states)
        .collapse_deterministic(collapse)
        .build()?;

    init_logging(&config.logging.filter);

    match cli.command {
        Commands::Check { program, models } => {
            let models = read_models(models.as_deref())?;
            let program = read_program(&program, models.as_ref())?;
            print!("{}", program);
        }

        Commands::Explore {
            program: path,
            models,
            output,
            ..
        } => {
            let models = read_models(models.as_deref())?;
            let program = read_program(&path, models.as_ref())?;

            let options = ExplorerOptions {
                max_states: config.explorer.max_states,
                collapse_deterministic: config.explorer.collapse_deterministic,
            };
            let space = Explorer::new(&program, options)
                .explore()
                .with_context(|| format!("Failed to explore {}", path.display()))?;

            print_summary(&space, InitialValuations::new(&program).len());

            if let Some(output) = output {
                let json = space.to_json().context("Failed to serialize state space")?;
                std::fs::write(&output, json)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("State space written to {}", output.display());
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn read_program(path: &Path, models: Option<&FunctionModels>) -> Result<crate::Program> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    crate::load_program(&source, models)
        .with_context(|| format!("Failed to load {}", path.display()))
}

fn read_models(path: Option<&Path>) -> Result<Option<FunctionModels>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let models = parse_function_models(&source)
        .with_context(|| format!("Failed to parse function models in {}", path.display()))?;
    Ok(Some(models))
}

fn print_summary(space: &StateSpace, valuations: usize) {
    println!("States: {}", space.states.len());
    println!("Transitions: {}", space.transitions.len());
    println!("Terminating states: {}", space.terminating_states().count());
    println!("Initial valuations: {}", valuations);
}
