//! `ketchup generate`: produce one round of plans for a group context file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use ketchup_core::{Generation, GroupContext, Plan, Planner, PlannerConfig};

/// JSON document written by `generate`.
#[derive(Debug, Serialize)]
struct GenerateOutput {
    plans: Vec<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<FallbackInfo>,
}

#[derive(Debug, Serialize)]
struct FallbackInfo {
    source: String,
    reason: String,
}

/// Read a group context from a JSON file.
pub fn load_context(path: &Path) -> Result<GroupContext> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read group context at {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid group context JSON in {}", path.display()))
}

/// Render a finished generation as pretty JSON. `Failed` becomes an error.
fn render(generation: Generation) -> Result<String> {
    let output = match generation {
        Generation::Planned(plans) => GenerateOutput {
            plans,
            fallback: None,
        },
        Generation::Fallback {
            plans,
            source,
            reason,
        } => GenerateOutput {
            plans,
            fallback: Some(FallbackInfo {
                source: source.to_string(),
                reason,
            }),
        },
        Generation::Failed(err) => {
            return Err(anyhow::Error::new(err).context("plan generation failed"));
        }
    };
    serde_json::to_string_pretty(&output).context("failed to serialize plans")
}

/// Execute `ketchup generate`.
pub async fn run_generate(
    config: PlannerConfig,
    context_path: &Path,
    notes: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let ctx = load_context(context_path)?;
    let planner = Planner::from_config(config).context("failed to initialize planner")?;
    tracing::info!(
        group = %ctx.group.name,
        members = ctx.members.len(),
        tools = planner.tools_enabled(),
        "generating plans"
    );

    let generation = planner.run(&ctx, notes).await;
    if let Generation::Fallback { source, reason, .. } = &generation {
        tracing::warn!(%source, reason = %reason, "returned fallback plans");
    }
    let json = render(generation)?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write plans to {}", path.display()))?;
            println!("Plans written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
