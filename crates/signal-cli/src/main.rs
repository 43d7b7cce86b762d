mod cmd;
mod config_path;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, detect::DetectArgs, run::RunArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "signalctl",
    about = "Adaptive two-lane traffic signal controller",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest signal.yaml upward from the current directory)
    #[arg(long, global = true, env = "SIGNAL_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signal cycle until Ctrl-C
    Run(RunArgs),

    /// Capture and classify one frame for a lane
    Detect(DetectArgs),

    /// Create, inspect and validate the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = config_path::resolve_config(cli.config.as_deref());

    let result = match cli.command {
        Commands::Run(args) => cmd::run::run(config.as_deref(), args, cli.json),
        Commands::Detect(args) => cmd::detect::run(config.as_deref(), args, cli.json),
        Commands::Config { subcommand } => {
            cmd::config::run(cli.config.as_deref(), config.as_deref(), subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
