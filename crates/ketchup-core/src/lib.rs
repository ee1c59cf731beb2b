//! Group plan generation engine.
//!
//! Drives an OpenAI-compatible model through a bounded tool-calling
//! conversation and always hands back five normalized [`Plan`]s: parsed from
//! the model when possible, synthesized deterministically when not.
//!
//! Entry point is [`Planner`]; everything else is exposed for callers that
//! want to drive individual stages.

pub mod config;
pub mod context;
pub mod fallback;
pub mod grounding;
pub mod llm;
pub mod normalize;
pub mod plan;
pub mod planner;
pub mod prompt;
pub mod recovery;
pub mod tool_loop;
pub mod tools;

pub use config::{ModelConfig, PlannerConfig};
pub use context::{GroupContext, GroupInfo, Member, RecentEvent};
pub use plan::{PLANS_PER_ROUND, Plan, VibeType};
pub use planner::{FallbackSource, Generation, Planner, PlannerError};
