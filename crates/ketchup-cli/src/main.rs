mod config;
mod generate_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use ketchup_core::config::ModelConfig;
use ketchup_core::llm::ModelClient;

use config::CliOverrides;

#[derive(Parser)]
#[command(name = "ketchup", about = "Group hangout plan generator")]
struct Cli {
    /// Model endpoint base URL (overrides KETCHUP_MODEL_BASE_URL env var)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model identifier (overrides KETCHUP_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a ketchup config file
    Init {
        /// Maps API key enabling tool-grounded plans
        #[arg(long)]
        maps_api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate five plans for a group
    Generate {
        /// Path to the group context JSON file
        #[arg(long)]
        context: PathBuf,
        /// Voting feedback to steer the round
        #[arg(long)]
        notes: Option<String>,
        /// Fail instead of returning template plans
        #[arg(long)]
        no_fallback: bool,
        /// Maximum tool-calling rounds
        #[arg(long)]
        max_rounds: Option<usize>,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check that the model endpoint is reachable
    Ping,
    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Execute the `ketchup init` command: write config file.
fn cmd_init(
    base_url: Option<&str>,
    model: Option<&str>,
    maps_api_key: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let base_url = base_url.unwrap_or(ModelConfig::DEFAULT_BASE_URL);
    let model = model.unwrap_or(ModelConfig::DEFAULT_MODEL);
    let has_maps_key = maps_api_key.is_some();

    let cfg = config::ConfigFile {
        model: config::ModelSection {
            base_url: Some(base_url.to_string()),
            model: Some(model.to_string()),
            ..Default::default()
        },
        maps: config::MapsSection {
            api_key: maps_api_key,
        },
        planner: config::PlannerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  model.base_url = {base_url}");
    println!("  model.model = {model}");
    if has_maps_key {
        println!("  maps.api_key = (set)");
    } else {
        println!("  maps.api_key = (unset, plans will not be tool-grounded)");
    }

    Ok(())
}

/// Execute the `ketchup ping` command.
async fn cmd_ping(overrides: &CliOverrides) -> anyhow::Result<()> {
    let resolved = config::resolve(overrides)?;
    let client = ModelClient::new(resolved.model).context("failed to build model client")?;
    let url = client.config().models_url();
    client
        .ping()
        .await
        .with_context(|| format!("model endpoint {url} is not reachable"))?;
    println!("Model endpoint {url} is reachable ({}).", client.config().model);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            maps_api_key,
            force,
        } => {
            cmd_init(
                cli.base_url.as_deref(),
                cli.model.as_deref(),
                maps_api_key,
                force,
            )?;
        }
        Commands::Generate {
            context,
            notes,
            no_fallback,
            max_rounds,
            output,
        } => {
            let overrides = CliOverrides {
                base_url: cli.base_url,
                model: cli.model,
                no_fallback,
                max_rounds,
            };
            let resolved = config::resolve(&overrides)?;
            generate_cmd::run_generate(resolved, &context, notes.as_deref(), output.as_deref())
                .await?;
        }
        Commands::Ping => {
            let overrides = CliOverrides {
                base_url: cli.base_url,
                model: cli.model,
                ..Default::default()
            };
            cmd_ping(&overrides).await?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "ketchup", &mut std::io::stdout());
        }
    }

    Ok(())
}
