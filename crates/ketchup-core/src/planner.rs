//! Plan generation orchestrator.
//!
//! Ties the prompt, tool loop, output recovery and fallback synthesizers
//! into one decision tree:
//!
//! 1. Tool-grounded loop when tools are registered, else one plain completion.
//! 2. Parse and normalize. Success ends the run.
//! 3. Empty plans with tools: synthesize from collected venues, or fail if
//!    place searches ran and found nothing.
//! 4. Otherwise one structured retry asking for strict JSON.
//! 5. Retry failed: synthesize from venues if any, else fail.
//! 6. Failure: template plans when fallback is enabled.

use std::fmt;
use std::sync::Arc;

use crate::config::PlannerConfig;
use crate::context::GroupContext;
use crate::fallback::{FallbackSynthesizer, GROUNDED_SOURCE, TEMPLATE_SOURCE};
use crate::grounding::{ToolSummary, collect_venues};
use crate::llm::{ChatMessage, ChatModel, CompletionRequest, ModelClient, ModelError};
use crate::normalize::parse_plans;
use crate::plan::Plan;
use crate::prompt::{PromptMode, REPAIR_INSTRUCTION, build_user_prompt};
use crate::recovery::{ParseFailure, snippet};
use crate::tool_loop::{LoopOutcome, MAX_COMPLETION_TOKENS, TOOL_TEMPERATURE, ToolLoop};
use crate::tools::{MapsClient, ToolRegistry, maps_registry};

pub const REPAIR_TEMPERATURE: f32 = 0.0;
pub const REPAIR_MAX_COMPLETION_TOKENS: u32 = 192;
/// Longest output preview written to logs.
const LOG_SNIPPET_CHARS: usize = 800;
/// Stand-in model output when the tool loop hands off to venue synthesis.
const EMPTY_PLANS_OUTPUT: &str = r#"{"plans":[]}"#;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Fatal generation failures.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    #[error("structured retry failed: {0}")]
    Parse(#[from] ParseFailure),

    #[error("model returned no plans and map search produced no usable venues ({details})")]
    NoUsableVenues { details: String },

    #[error("failed to build maps client: {0}")]
    MapsClient(#[source] reqwest::Error),
}

/// Which synthesizer produced fallback plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// Built from venues found by the tool loop.
    Grounded,
    /// Generic archetypes.
    Template,
}

impl fmt::Display for FallbackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grounded => f.write_str(GROUNDED_SOURCE),
            Self::Template => f.write_str(TEMPLATE_SOURCE),
        }
    }
}

/// Outcome of one generation run.
#[derive(Debug)]
pub enum Generation {
    /// The model produced parseable plans.
    Planned(Vec<Plan>),
    /// A synthesizer stood in for the model.
    Fallback {
        plans: Vec<Plan>,
        source: FallbackSource,
        reason: String,
    },
    /// Generation failed and fallback is disabled.
    Failed(PlannerError),
}

impl Generation {
    pub fn plans(&self) -> Option<&[Plan]> {
        match self {
            Self::Planned(plans) | Self::Fallback { plans, .. } => Some(plans),
            Self::Failed(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn into_result(self) -> Result<Vec<Plan>, PlannerError> {
        match self {
            Self::Planned(plans) | Self::Fallback { plans, .. } => Ok(plans),
            Self::Failed(err) => Err(err),
        }
    }
}

/// Success paths of the decision tree before the template safety net.
enum Attempt {
    Planned(Vec<Plan>),
    Grounded { plans: Vec<Plan>, reason: String },
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Generates five plans for a group. Cheap to share across tasks.
#[derive(Clone)]
pub struct Planner {
    model: Arc<dyn ChatModel>,
    tools: Option<Arc<ToolRegistry>>,
    config: PlannerConfig,
}

impl Planner {
    /// A planner without tools; runs use the best-effort prompt.
    pub fn new(model: Arc<dyn ChatModel>, config: PlannerConfig) -> Self {
        Self {
            model,
            tools: None,
            config,
        }
    }

    /// Build the HTTP model client and, when a maps key is set, the maps tools.
    pub fn from_config(config: PlannerConfig) -> Result<Self, PlannerError> {
        let model = ModelClient::new(config.model.clone())?;
        let tools = match config.maps_api_key.as_deref().filter(|_| config.tools_enabled()) {
            Some(key) => Some(maps_registry(
                MapsClient::new(key).map_err(PlannerError::MapsClient)?,
            )),
            None => None,
        };
        let planner = Self::new(Arc::new(model), config);
        Ok(match tools {
            Some(registry) => planner.with_tools(registry),
            None => planner,
        })
    }

    /// Enable the tool-grounded path. An empty registry leaves it disabled.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = (!tools.is_empty()).then(|| Arc::new(tools));
        self
    }

    pub fn tools_enabled(&self) -> bool {
        self.tools.is_some()
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Generate plans, returning exactly five or an error.
    pub async fn generate(
        &self,
        ctx: &GroupContext,
        refinement_notes: Option<&str>,
    ) -> Result<Vec<Plan>, PlannerError> {
        self.run(ctx, refinement_notes).await.into_result()
    }

    /// Generate plans, reporting which path produced them.
    pub async fn run(&self, ctx: &GroupContext, refinement_notes: Option<&str>) -> Generation {
        match self.attempt(ctx, refinement_notes).await {
            Ok(Attempt::Planned(plans)) => Generation::Planned(plans),
            Ok(Attempt::Grounded { plans, reason }) => Generation::Fallback {
                plans,
                source: FallbackSource::Grounded,
                reason,
            },
            Err(err) if self.config.fallback_enabled => {
                let reason = err.to_string();
                tracing::warn!(group = %ctx.group.name, error = %err, "plan generation failed, using template fallback");
                let plans = self.synthesizer(ctx, &reason, refinement_notes).template_plans();
                Generation::Fallback {
                    plans,
                    source: FallbackSource::Template,
                    reason,
                }
            }
            Err(err) => {
                tracing::error!(group = %ctx.group.name, error = %err, "plan generation failed");
                Generation::Failed(err)
            }
        }
    }

    async fn attempt(&self, ctx: &GroupContext, refinement_notes: Option<&str>) -> Result<Attempt, PlannerError> {
        let group = ctx.group.name.as_str();
        let mode = if self.tools.is_some() {
            PromptMode::ToolGrounded
        } else {
            PromptMode::BestEffort
        };
        let prompt = build_user_prompt(ctx, refinement_notes, mode);
        let initial = vec![
            ChatMessage::system(mode.system_prompt()),
            ChatMessage::user(prompt.clone()),
        ];

        let (output, transcript) = match &self.tools {
            Some(tools) => {
                tracing::info!(group, model = self.model.model_name(), "generating tool-grounded plans");
                let run = ToolLoop::new(self.model.as_ref(), tools, self.config.max_tool_rounds)
                    .run(initial)
                    .await?;
                let output = match run.outcome {
                    LoopOutcome::Answer(text) => text,
                    LoopOutcome::GroundedFallback => EMPTY_PLANS_OUTPUT.to_owned(),
                };
                (output, run.transcript)
            }
            None => {
                tracing::info!(group, model = self.model.model_name(), "generating best-effort plans without tools");
                let request = CompletionRequest::new(&initial, TOOL_TEMPERATURE, MAX_COMPLETION_TOKENS);
                (self.model.complete(request).await?.content, Vec::new())
            }
        };

        let summary = ToolSummary::from_transcript(&transcript);
        if self.tools.is_some() {
            tracing::info!(
                group,
                tool_calls = summary.tool_calls,
                place_calls = summary.place_calls,
                place_results = summary.place_results,
                errors = summary.errors.len(),
                "tool summary"
            );
        }

        let failure = match parse_plans(&output) {
            Ok(plans) => return Ok(Attempt::Planned(plans)),
            Err(failure) => failure,
        };

        if self.tools.is_some() && failure == ParseFailure::NoPlans {
            let reason = format!("model produced empty plans: {failure}");
            if let Some(plans) = self.grounded(ctx, &transcript, &reason, refinement_notes) {
                tracing::warn!(group, "no plans returned, using maps-grounded fallback");
                return Ok(Attempt::Grounded { plans, reason });
            }
            if summary.searches_came_up_empty() {
                return Err(PlannerError::NoUsableVenues {
                    details: summary.failure_details(),
                });
            }
        }

        tracing::warn!(
            group,
            error = %failure,
            output_len = output.len(),
            snippet = %snippet(&output, LOG_SNIPPET_CHARS),
            "plan parse failed, retrying with structured output"
        );
        let repaired = self.structured_retry(mode, &prompt, &output).await?;
        tracing::info!(
            group,
            output_len = repaired.len(),
            snippet = %snippet(&repaired, LOG_SNIPPET_CHARS),
            "structured retry output"
        );

        match parse_plans(&repaired) {
            Ok(plans) => Ok(Attempt::Planned(plans)),
            Err(retry_failure) => {
                if self.tools.is_some() {
                    let reason = format!("structured retry failed: {retry_failure}");
                    if let Some(plans) = self.grounded(ctx, &transcript, &reason, refinement_notes) {
                        tracing::warn!(group, "structured retry failed, using maps-grounded fallback");
                        return Ok(Attempt::Grounded { plans, reason });
                    }
                }
                Err(retry_failure.into())
            }
        }
    }

    /// Ask the model to re-emit its previous answer as strict JSON.
    async fn structured_retry(&self, mode: PromptMode, prompt: &str, prior_output: &str) -> Result<String, ModelError> {
        let messages = [
            ChatMessage::system(mode.system_prompt()),
            ChatMessage::user(prompt),
            ChatMessage::assistant(prior_output),
            ChatMessage::user(REPAIR_INSTRUCTION),
        ];
        let request = CompletionRequest::new(&messages, REPAIR_TEMPERATURE, REPAIR_MAX_COMPLETION_TOKENS);
        Ok(self.model.complete(request).await?.content)
    }

    fn grounded(
        &self,
        ctx: &GroupContext,
        transcript: &[ChatMessage],
        reason: &str,
        refinement_notes: Option<&str>,
    ) -> Option<Vec<Plan>> {
        let venues = collect_venues(transcript);
        self.synthesizer(ctx, reason, refinement_notes)
            .grounded_plans(&venues)
    }

    fn synthesizer<'a>(
        &'a self,
        ctx: &'a GroupContext,
        reason: &str,
        refinement_notes: Option<&str>,
    ) -> FallbackSynthesizer<'a> {
        FallbackSynthesizer::new(ctx, &self.config.default_location, reason, refinement_notes)
    }
}

impl fmt::Debug for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Planner")
            .field("model", &self.model.model_name())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_accessors() {
        let failed = Generation::Failed(PlannerError::NoUsableVenues {
            details: "x".into(),
        });
        assert!(failed.plans().is_none());
        assert!(!failed.is_fallback());
        assert!(failed.into_result().is_err());

        let fallback = Generation::Fallback {
            plans: Vec::new(),
            source: FallbackSource::Template,
            reason: "r".into(),
        };
        assert!(fallback.is_fallback());
        assert_eq!(fallback.plans().map(<[Plan]>::len), Some(0));
    }

    #[test]
    fn fallback_source_matches_logistics_tags() {
        assert_eq!(FallbackSource::Grounded.to_string(), "maps_fallback");
        assert_eq!(FallbackSource::Template.to_string(), "fallback");
    }

    #[test]
    fn error_messages() {
        let err = PlannerError::NoUsableVenues {
            details: "search_places returned zero results".into(),
        };
        assert_eq!(
            err.to_string(),
            "model returned no plans and map search produced no usable venues \
             (search_places returned zero results)"
        );
        let err: PlannerError = ParseFailure::NoPlans.into();
        assert_eq!(err.to_string(), "structured retry failed: model returned no plans");
    }

    #[test]
    fn planner_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Planner>();
    }

    #[test]
    fn from_config_without_maps_key_has_no_tools() {
        let planner = Planner::from_config(PlannerConfig::default()).unwrap();
        assert!(!planner.tools_enabled());
        let mut config = PlannerConfig::default();
        config.maps_api_key = Some("key".into());
        assert!(Planner::from_config(config).unwrap().tools_enabled());
    }
}
