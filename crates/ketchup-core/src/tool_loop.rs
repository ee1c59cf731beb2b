//! Bounded tool-calling conversation with the planning model.
//!
//! ```text
//! AWAITING_MODEL -> (TOOL_ROUND)* -> FINALIZING -> DONE
//! ```
//!
//! Each round sends the full history plus tool schemas. A reply without
//! tool calls ends the loop. Tool calls are executed in order and their
//! results appended. After the rounds, collected venues short-circuit to
//! grounded synthesis; otherwise one plain finalize call is made.

use serde_json::Value;

use crate::grounding::ToolSummary;
use crate::llm::{ChatMessage, ChatModel, CompletionRequest, ModelError};
use crate::prompt::FINALIZE_INSTRUCTION;
use crate::tools::ToolRegistry;

pub const TOOL_TEMPERATURE: f32 = 0.2;
pub const MAX_COMPLETION_TOKENS: u32 = 512;
/// Consecutive rounds in which every call failed before giving up on tools.
const MAX_ALL_ERROR_ROUNDS: usize = 2;

/// How the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// The model's final text, to be parsed into plans.
    Answer(String),
    /// Venues were collected; skip the model and synthesize from them.
    GroundedFallback,
}

/// Outcome plus the full conversation, for summaries and grounding.
#[derive(Debug, Clone)]
pub struct LoopRun {
    pub outcome: LoopOutcome,
    pub transcript: Vec<ChatMessage>,
}

/// Drives one tool-calling conversation.
pub struct ToolLoop<'a> {
    model: &'a dyn ChatModel,
    tools: &'a ToolRegistry,
    max_rounds: usize,
}

impl<'a> ToolLoop<'a> {
    pub fn new(model: &'a dyn ChatModel, tools: &'a ToolRegistry, max_rounds: usize) -> Self {
        Self {
            model,
            tools,
            max_rounds,
        }
    }

    /// Run the loop from an initial `[system, user]` conversation.
    ///
    /// Model errors end the run. Tool errors never do.
    pub async fn run(&self, mut messages: Vec<ChatMessage>) -> Result<LoopRun, ModelError> {
        let schemas: Vec<Value> = self.tools.definitions();
        let mut all_error_rounds = 0;

        for round in 1..=self.max_rounds {
            let request = CompletionRequest::new(&messages, TOOL_TEMPERATURE, MAX_COMPLETION_TOKENS)
                .with_tools(&schemas);
            let completion = self.model.complete(request).await?;

            if !completion.has_tool_calls() {
                tracing::debug!(round, "model answered without tool calls");
                return Ok(LoopRun {
                    outcome: LoopOutcome::Answer(completion.content),
                    transcript: messages,
                });
            }

            let calls = completion.tool_calls;
            messages.push(ChatMessage::Assistant {
                content: completion.content,
                tool_calls: calls.clone(),
            });

            let mut round_had_success = false;
            for call in &calls {
                let result = self.tools.execute(&call.name, &call.parsed_arguments()).await;
                round_had_success |= !result.is_error();
                messages.push(ChatMessage::tool_result(call.id.clone(), result.to_content()));
            }

            if round_had_success {
                all_error_rounds = 0;
                continue;
            }
            all_error_rounds += 1;
            if all_error_rounds >= MAX_ALL_ERROR_ROUNDS {
                tracing::warn!(
                    round,
                    all_error_rounds,
                    "stopping tool loop early after consecutive all-error rounds"
                );
                break;
            }
        }

        let summary = ToolSummary::from_transcript(&messages);
        if summary.place_results > 0 {
            tracing::warn!(
                place_results = summary.place_results,
                "venue candidates collected, skipping finalize call"
            );
            return Ok(LoopRun {
                outcome: LoopOutcome::GroundedFallback,
                transcript: messages,
            });
        }

        messages.push(ChatMessage::user(FINALIZE_INSTRUCTION));
        let request = CompletionRequest::new(&messages, TOOL_TEMPERATURE, MAX_COMPLETION_TOKENS);
        let completion = self.model.complete(request).await?;
        Ok(LoopRun {
            outcome: LoopOutcome::Answer(completion.content),
            transcript: messages,
        })
    }
}
