//! End-to-end planner scenarios driven by a scripted model and fake tools.
//!
//! No network: the model replays canned completions and the tools replay
//! canned results, so each test pins one branch of the decision tree.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use ketchup_core::llm::{ChatMessage, ChatModel, Completion, CompletionRequest, ModelError, ToolCall};
use ketchup_core::prompt::{FINALIZE_INSTRUCTION, REPAIR_INSTRUCTION};
use ketchup_core::tools::{Tool, ToolRegistry, ToolResult};
use ketchup_core::{
    FallbackSource, Generation, GroupContext, GroupInfo, Member, Planner, PlannerConfig, PlannerError,
    VibeType,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Recorded {
    messages: Vec<ChatMessage>,
    tool_count: usize,
    temperature: f32,
    max_tokens: Option<u32>,
}

/// Replays scripted replies in order and records every request.
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Completion, ModelError>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<Completion, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, ModelError> {
        self.requests.lock().unwrap().push(Recorded {
            messages: request.messages.to_vec(),
            tool_count: request.tools.map_or(0, <[Value]>::len),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::NoChoices))
    }
}

/// A named tool replaying canned results; repeats the last one when drained.
struct ScriptedTool {
    name: &'static str,
    results: Mutex<VecDeque<ToolResult>>,
    last: ToolResult,
}

impl ScriptedTool {
    fn new(name: &'static str, results: Vec<ToolResult>) -> Self {
        let last = results
            .last()
            .cloned()
            .unwrap_or_else(|| ToolResult::error("no script"));
        Self {
            name,
            results: Mutex::new(results.into()),
            last,
        }
    }
}

#[async_trait]
impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        self.name
    }

    fn definition(&self) -> Value {
        json!({"type": "function", "function": {"name": self.name, "parameters": {"type": "object"}}})
    }

    async fn call(&self, _args: &Map<String, Value>) -> ToolResult {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.clone())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn context() -> GroupContext {
    GroupContext {
        group: GroupInfo {
            id: None,
            name: "Thursday Crew".into(),
        },
        members: vec![
            Member {
                name: Some("Ana".into()),
                default_location: Some("Cambridge, MA".into()),
                activity_likes: vec!["bowling".into()],
                ..Member::default()
            },
            Member {
                email: Some("bo@x.io".into()),
                ..Member::default()
            },
        ],
        recent_events: vec![],
    }
}

fn config(fallback_enabled: bool) -> PlannerConfig {
    PlannerConfig {
        fallback_enabled,
        ..PlannerConfig::default()
    }
}

fn five_plans_json() -> String {
    let plans: Vec<Value> = VibeType::CANONICAL
        .iter()
        .enumerate()
        .map(|(i, vibe)| {
            json!({
                "title": format!("Plan {i}"),
                "description": "desc",
                "vibe_type": vibe.to_string(),
                "date_time": format!("2026-11-{:02}T19:00:00Z", i + 1),
                "location": "Somerville, MA",
                "venue_name": format!("Venue {i}"),
                "estimated_cost": "$20-40 per person",
                "logistics": {}
            })
        })
        .collect();
    json!({ "plans": plans }).to_string()
}

fn tool_calls(name: &str, n: usize) -> Completion {
    Completion {
        content: String::new(),
        tool_calls: (0..n)
            .map(|i| ToolCall::new(format!("{name}_{i}"), name, r#"{"query": "bowling", "location": "Boston"}"#))
            .collect(),
    }
}

fn places(entries: &[(&str, &str)]) -> ToolResult {
    let list: Vec<Value> = entries
        .iter()
        .map(|(name, address)| json!({"name": name, "address": address, "rating": 4.5, "price_level": 2}))
        .collect();
    ToolResult::Success(json!({ "places": list }))
}

fn registry(search_results: Vec<ToolResult>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ScriptedTool::new(
        "get_directions",
        vec![ToolResult::error("get_directions failed: HTTP 403")],
    ));
    registry.register(ScriptedTool::new("search_places", search_results));
    registry
}

fn assert_canonical_round(plans: &[ketchup_core::Plan]) {
    assert_eq!(plans.len(), 5);
    let vibes: HashSet<VibeType> = plans.iter().map(|p| p.vibe_type).collect();
    assert_eq!(vibes, VibeType::CANONICAL.into_iter().collect());
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_first_answer_is_used_without_fallback() {
    let model = ScriptedModel::new(vec![Ok(Completion::text(five_plans_json()))]);
    let planner = Planner::new(model.clone(), config(true)).with_tools(registry(vec![]));

    let generation = planner.run(&context(), None).await;
    let Generation::Planned(plans) = generation else {
        panic!("expected planned generation, got {generation:?}");
    };
    assert_canonical_round(&plans);
    assert_eq!(plans[0].title, "Plan 0");
    assert_eq!(plans[4].venue_name, "Venue 4");
    assert!(plans.iter().all(|p| p.date_time.is_some()));

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tool_count, 2);
    assert_eq!(requests[0].max_tokens, Some(512));
}

#[tokio::test]
async fn best_effort_path_makes_one_plain_call() {
    let model = ScriptedModel::new(vec![Ok(Completion::text(five_plans_json()))]);
    let planner = Planner::new(model.clone(), config(true));

    let plans = planner.generate(&context(), Some("cheaper")).await.unwrap();
    assert_canonical_round(&plans);

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tool_count, 0);
    match &requests[0].messages[0] {
        ChatMessage::System { content } => assert!(content.contains("Tooling may be unavailable")),
        other => panic!("expected system message, got {other:?}"),
    }
    match &requests[0].messages[1] {
        ChatMessage::User { content } => assert!(content.contains("Voting feedback to consider:\ncheaper")),
        other => panic!("expected user message, got {other:?}"),
    }
}

#[tokio::test]
async fn all_error_rounds_fall_back_to_templates() {
    let model = ScriptedModel::new(vec![
        Ok(tool_calls("get_directions", 1)),
        Ok(tool_calls("get_directions", 2)),
        Ok(Completion::text("I could not find anything, sorry.")),
        Ok(Completion::text("still not json")),
    ]);
    let mut cfg = config(true);
    cfg.max_tool_rounds = 4;
    let planner = Planner::new(model.clone(), cfg).with_tools(registry(vec![]));

    let generation = planner.run(&context(), None).await;
    let Generation::Fallback { plans, source, reason } = generation else {
        panic!("expected fallback, got {generation:?}");
    };
    assert_eq!(source, FallbackSource::Template);
    assert!(reason.contains("structured retry failed"), "reason: {reason}");
    assert_canonical_round(&plans);
    assert!(plans.iter().all(|p| p.source() == Some("fallback")));
    assert!(plans.iter().all(|p| p.location == "Cambridge, MA"));

    // two tool rounds, the finalize call, then the structured retry
    let requests = model.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[2].tool_count, 0);
    assert_eq!(
        requests[2].messages.last(),
        Some(&ChatMessage::user(FINALIZE_INSTRUCTION))
    );
    let retry = &requests[3];
    assert_eq!(retry.temperature, 0.0);
    assert_eq!(retry.max_tokens, Some(192));
    assert_eq!(retry.messages.len(), 4);
    assert_eq!(
        retry.messages[2],
        ChatMessage::assistant("I could not find anything, sorry.")
    );
    assert_eq!(retry.messages[3], ChatMessage::user(REPAIR_INSTRUCTION));
}

#[tokio::test]
async fn collected_venues_produce_grounded_plans() {
    let model = ScriptedModel::new(vec![
        Ok(tool_calls("search_places", 1)),
        Ok(tool_calls("get_directions", 1)),
    ]);
    let search = vec![places(&[
        ("Lucky Strike", "145 Ipswich St"),
        ("Time Out Market", "401 Park Dr"),
        ("Trillium", "401 Congress St"),
    ])];
    let planner = Planner::new(model.clone(), config(true)).with_tools(registry(search));

    let generation = planner.run(&context(), None).await;
    let Generation::Fallback { plans, source, .. } = generation else {
        panic!("expected grounded fallback, got {generation:?}");
    };
    assert_eq!(source, FallbackSource::Grounded);
    assert_eq!(
        plans.iter().map(|p| p.vibe_type).collect::<Vec<_>>(),
        VibeType::CANONICAL.to_vec()
    );
    assert_eq!(plans[0].venue_name, "Lucky Strike");
    assert_eq!(plans[1].venue_name, "Time Out Market");
    assert_eq!(plans[2].venue_name, "Trillium");
    assert!(plans[..3].iter().all(|p| p.source() == Some("maps_fallback")));
    assert!(plans[3..].iter().all(|p| p.source() == Some("fallback")));
    assert_eq!(plans[0].estimated_cost, "$20-40 per person");

    // no finalize call once venues exist
    assert_eq!(model.requests().len(), 2);
}

#[tokio::test]
async fn empty_answer_after_searches_with_venues_is_grounded() {
    let model = ScriptedModel::new(vec![
        Ok(tool_calls("search_places", 1)),
        Ok(Completion::text(r#"{"plans": []}"#)),
    ]);
    let search = vec![places(&[("Lucky Strike", "145 Ipswich St")])];
    let planner = Planner::new(model.clone(), config(false)).with_tools(registry(search));

    let generation = planner.run(&context(), None).await;
    let Generation::Fallback { plans, source, reason } = generation else {
        panic!("expected grounded fallback, got {generation:?}");
    };
    assert_eq!(source, FallbackSource::Grounded);
    assert!(reason.starts_with("model produced empty plans"));
    assert_eq!(plans[0].title, "Lucky Strike");
    assert_eq!(plans[1].title, "Food Hall Sampler");
}

#[tokio::test]
async fn empty_searches_surface_an_error_when_fallback_disabled() {
    let model = ScriptedModel::new(vec![
        Ok(tool_calls("search_places", 1)),
        Ok(Completion::text(r#"{"plans": []}"#)),
    ]);
    let search = vec![ToolResult::Success(json!({"places": []}))];
    let planner = Planner::new(model.clone(), config(false)).with_tools(registry(search));

    let err = planner.generate(&context(), None).await.unwrap_err();
    assert!(
        matches!(&err, PlannerError::NoUsableVenues { details } if details == "search_places returned zero results"),
        "unexpected error: {err}"
    );
    // no structured retry
    assert_eq!(model.requests().len(), 2);
}

#[tokio::test]
async fn structured_retry_recovers() {
    let model = ScriptedModel::new(vec![
        Ok(Completion::text("Here are some ideas: bowling, tacos...")),
        Ok(Completion::text(format!("```json\n{}\n```", five_plans_json()))),
    ]);
    let planner = Planner::new(model.clone(), config(false));

    let generation = planner.run(&context(), None).await;
    assert!(matches!(generation, Generation::Planned(_)), "got {generation:?}");
    assert_canonical_round(generation.plans().unwrap());
    assert_eq!(model.requests().len(), 2);
}

#[tokio::test]
async fn partial_answer_is_padded() {
    let answer = json!({"plans": [
        {"title": "Trivia", "vibe_type": "chill"},
        {"title": "Karaoke", "vibe_type": "chill"}
    ]})
    .to_string();
    let model = ScriptedModel::new(vec![Ok(Completion::text(answer))]);
    let planner = Planner::new(model, config(false));

    let plans = planner.generate(&context(), None).await.unwrap();
    assert_canonical_round(&plans);
    assert_eq!(plans[0].vibe_type, VibeType::Chill);
    assert_eq!(plans[2].source(), Some("incomplete_response"));
}

#[tokio::test]
async fn model_failure_with_fallback_disabled_fails() {
    let model = ScriptedModel::new(vec![Err(ModelError::Status {
        status: 503,
        body: "overloaded".into(),
    })]);
    let planner = Planner::new(model, config(false));

    let generation = planner.run(&context(), None).await;
    let Generation::Failed(err) = generation else {
        panic!("expected failure, got {generation:?}");
    };
    assert!(matches!(err, PlannerError::Model(ModelError::Status { status: 503, .. })));
}

#[tokio::test]
async fn model_failure_with_fallback_enabled_uses_templates() {
    let model = ScriptedModel::new(vec![Err(ModelError::NoChoices)]);
    let planner = Planner::new(model, config(true)).with_tools(registry(vec![]));

    let generation = planner.run(&context(), Some("outdoors")).await;
    let Generation::Fallback { plans, source, reason } = generation else {
        panic!("expected fallback, got {generation:?}");
    };
    assert_eq!(source, FallbackSource::Template);
    assert!(reason.contains("no choices"));
    assert_eq!(plans[0].logistics["refinement_notes"], "outdoors");
    assert_eq!(plans[0].logistics["members"], json!(["Ana", "bo@x.io"]));
}

#[tokio::test]
async fn malformed_tool_arguments_do_not_abort() {
    let bad = Completion {
        content: String::new(),
        tool_calls: vec![
            ToolCall::new("x1", "search_places", "{not json"),
            ToolCall::new("x2", "teleport", "\"str\""),
        ],
    };
    let model = ScriptedModel::new(vec![Ok(bad), Ok(Completion::text(five_plans_json()))]);
    let planner = Planner::new(model.clone(), config(false))
        .with_tools(registry(vec![ToolResult::Success(json!({"ok": true}))]));

    let plans = planner.generate(&context(), None).await.unwrap();
    assert_canonical_round(&plans);

    let second = &model.requests()[1].messages;
    let tool_results: Vec<&ChatMessage> = second
        .iter()
        .filter(|m| matches!(m, ChatMessage::Tool { .. }))
        .collect();
    assert_eq!(tool_results.len(), 2);
    assert_eq!(
        *tool_results[1],
        ChatMessage::tool_result("x2", r#"{"error":"Unknown tool: teleport"}"#)
    );
}
