//! Reads tool activity back out of a conversation transcript.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::llm::ChatMessage;

/// Aggregate of all tool results in a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    pub tool_calls: usize,
    /// Results that carried a `places` list.
    pub place_calls: usize,
    /// Total entries across all `places` lists.
    pub place_results: usize,
    pub errors: Vec<String>,
}

impl ToolSummary {
    pub fn from_transcript(messages: &[ChatMessage]) -> Self {
        let mut summary = Self::default();
        for content in tool_contents(messages) {
            summary.tool_calls += 1;
            let payload = match serde_json::from_str::<Value>(content) {
                Ok(Value::Object(obj)) => obj,
                Ok(_) => continue,
                Err(_) => {
                    summary.errors.push("Tool payload was not valid JSON".to_owned());
                    continue;
                }
            };
            if let Some(error) = payload.get("error").and_then(Value::as_str).filter(|e| !e.is_empty()) {
                summary.errors.push(error.to_owned());
            }
            if let Some(places) = payload.get("places").and_then(Value::as_array) {
                summary.place_calls += 1;
                summary.place_results += places.len();
            }
        }
        summary
    }

    /// Place searches ran but none returned anything.
    pub fn searches_came_up_empty(&self) -> bool {
        self.place_calls > 0 && self.place_results == 0
    }

    /// First two errors joined, or a note that searches returned nothing.
    pub fn failure_details(&self) -> String {
        if self.errors.is_empty() {
            "search_places returned zero results".to_owned()
        } else {
            self.errors.iter().take(2).cloned().collect::<Vec<_>>().join("; ")
        }
    }
}

/// A venue returned by a place search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Venue {
    pub name: String,
    pub address: String,
    pub rating: Value,
    pub price_level: Value,
}

/// Venues from every `places` result, in order, deduplicated by
/// case-insensitive (name, address). Entries with neither are skipped.
pub fn collect_venues(messages: &[ChatMessage]) -> Vec<Venue> {
    let mut seen = HashSet::new();
    let mut venues = Vec::new();

    for content in tool_contents(messages) {
        let Ok(payload) = serde_json::from_str::<Value>(content) else {
            continue;
        };
        let Some(places) = payload.get("places").and_then(Value::as_array) else {
            continue;
        };
        for place in places.iter().filter(|p| p.is_object()) {
            let name = text_of(place.get("name"));
            let address = text_of(place.get("address"));
            if name.is_empty() && address.is_empty() {
                continue;
            }
            if !seen.insert((name.to_lowercase(), address.to_lowercase())) {
                continue;
            }
            venues.push(Venue {
                name,
                address,
                rating: place.get("rating").cloned().unwrap_or(Value::Null),
                price_level: place.get("price_level").cloned().unwrap_or(Value::Null),
            });
        }
    }
    venues
}

fn tool_contents(messages: &[ChatMessage]) -> impl Iterator<Item = &str> {
    messages.iter().filter_map(|m| match m {
        ChatMessage::Tool { content, .. } => Some(content.as_str()),
        _ => None,
    })
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
