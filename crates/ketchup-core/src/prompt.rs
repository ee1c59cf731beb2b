//! Planning prompts: system prompt variants and the per-group user prompt.
//!
//! Pure string assembly; no I/O.

use crate::context::{GroupContext, Member};

// ---------------------------------------------------------------------------
// System prompts
// ---------------------------------------------------------------------------

/// Which system prompt and grounding instructions to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Maps tools are registered; ask the model to use them.
    ToolGrounded,
    /// No tools; plans come from preferences and history alone.
    BestEffort,
}

const SYSTEM_PROMPT_TOOL_GROUNDED: &str = "You are Ketchup's planning engine. Build exactly 5 plans for a friend group. \
     Use tools to ground recommendations in real places and travel times. \
     Return strict JSON only with key 'plans'.";

const SYSTEM_PROMPT_BEST_EFFORT: &str = "You are Ketchup's planning engine. Build exactly 5 plans for a friend group. \
     Tooling may be unavailable; do not mention missing tools, integrations, or API keys. \
     Return strict JSON only with key 'plans'.";

impl PromptMode {
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::ToolGrounded => SYSTEM_PROMPT_TOOL_GROUNDED,
            Self::BestEffort => SYSTEM_PROMPT_BEST_EFFORT,
        }
    }

    fn grounding_block(self) -> &'static str {
        match self {
            Self::ToolGrounded => {
                "Use tool calls to ground plans:\n\
                 1) search_places(query, location) to find real venues.\n\
                 2) get_directions(origin, destination, mode) for each member with known location."
            }
            Self::BestEffort => {
                "Google Maps tools are unavailable in this environment. \
                 Do not mention missing tools or API keys. \
                 Generate realistic best-effort plans from member preferences, budgets, and recent events."
            }
        }
    }

    fn logistics_example(self) -> &'static str {
        match self {
            Self::ToolGrounded => {
                "\"per_member\": [\n        \
                 {\"member\": \"...\", \"origin\": \"...\", \"duration\": \"...\", \"distance\": \"...\", \"mode\": \"...\"}\n      \
                 ]"
            }
            Self::BestEffort => "\"per_member\": []",
        }
    }
}

/// Sent after the tool rounds when the model has not yet answered.
pub const FINALIZE_INSTRUCTION: &str = "Finalize now and return valid JSON with exactly 5 plans.";

/// Sent on the structured retry after an unparseable answer.
pub const REPAIR_INSTRUCTION: &str = "Your last response was not parser-safe. \
     Return ONLY valid minified JSON with key 'plans' and exactly 5 plan objects \
     matching the required schema. \
     Do not include markdown fences, explanations, comments, or any text outside JSON. \
     Start with '{' and end with '}'.";

// ---------------------------------------------------------------------------
// User prompt
// ---------------------------------------------------------------------------

/// Render the group context into the planning request.
pub fn build_user_prompt(ctx: &GroupContext, refinement_notes: Option<&str>, mode: PromptMode) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(&format!("Group name: {}\n\n", ctx.group.name));

    prompt.push_str("Members:\n");
    for member in &ctx.members {
        prompt.push_str(&member_line(member));
        prompt.push('\n');
    }

    prompt.push_str("\nRecent events:\n");
    if ctx.recent_events.is_empty() {
        prompt.push_str("- No recent events\n");
    } else {
        for event in &ctx.recent_events {
            let when = event
                .event_date
                .map_or_else(|| "unknown".to_owned(), |d| d.to_rfc3339());
            prompt.push_str(&format!("- {} at {when}\n", event.title));
        }
    }

    if let Some(notes) = refinement_notes.map(str::trim).filter(|n| !n.is_empty()) {
        prompt.push_str(&format!("\nVoting feedback to consider:\n{notes}\n"));
    }

    prompt.push_str(
        "\nGenerate exactly 5 plans with these vibe types in order: \
         anchor, pivot, reach, chill, wildcard.\n",
    );
    prompt.push_str(mode.grounding_block());
    prompt.push_str("\n\nReturn strict JSON with this schema:\n");
    prompt.push_str(&format!(
        r#"{{
  "plans": [
    {{
      "title": "...",
      "description": "...",
      "vibe_type": "anchor|pivot|reach|chill|wildcard",
      "date_time": "ISO-8601 or null",
      "location": "...",
      "venue_name": "...",
      "estimated_cost": "...",
      "logistics": {{
        {}
      }}
    }}
  ]
}}"#,
        mode.logistics_example()
    ));

    prompt
}

fn member_line(member: &Member) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            "none".to_owned()
        } else {
            items.join(", ")
        }
    };
    let mut line = format!(
        "- {}: location={}, budget={}, likes={}, dislikes={}",
        member.display_name(),
        member.location().unwrap_or("unknown"),
        member
            .budget_preference
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or("unspecified"),
        list(&member.activity_likes),
        list(&member.activity_dislikes),
    );
    if let Some(notes) = member.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        line.push_str(&format!(", notes={}", notes.replace('\n', " ")));
    }
    line
}
