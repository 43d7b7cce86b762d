use crate::config_path::init_target;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use signal_core::config::{Config, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a signal.yaml with the default timing and detector settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// `explicit` is the `--config` value as given; `resolved` is the file
/// found by the upward search (or `explicit` itself).
pub fn run(
    explicit: Option<&Path>,
    resolved: Option<&Path>,
    subcmd: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init { force } => init(explicit, force, json),
        ConfigSubcommand::Show => show(resolved, json),
        ConfigSubcommand::Validate => validate(resolved, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(explicit: Option<&Path>, force: bool, json: bool) -> anyhow::Result<()> {
    let target = init_target(explicit);
    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }

    Config::default()
        .save(&target)
        .with_context(|| format!("failed to write {}", target.display()))?;

    if json {
        print_json(&serde_json::json!({ "path": target }))?;
    } else {
        println!("Wrote {}", target.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(path).context("failed to load config")?;

    if json {
        return print_json(&config);
    }

    println!("# {}", source_label(path));
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(path).context("failed to load config")?;
    let findings = config.validate();
    let source = source_label(path);
    let errors = findings
        .iter()
        .filter(|f| f.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&serde_json::json!({
            "source": source,
            "valid": errors == 0,
            "errors": errors,
            "findings": findings,
        }))?;
    } else {
        println!("Checking {source}");
        for f in &findings {
            let tag = match f.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("  [{tag}] {}", f.message);
        }
        if findings.is_empty() {
            println!("  timing, detector and actuator settings look good");
        }
    }

    anyhow::ensure!(errors == 0, "{errors} config error(s) in {source}");
    Ok(())
}

fn source_label(path: Option<&Path>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "built-in defaults".to_string(),
    }
}
