//! Maps loose plan records into canonical [`Plan`]s.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value, json};

use crate::plan::{PLANS_PER_ROUND, Plan, VibeType};
use crate::recovery::{ParseFailure, extract_plans};

const PLACEHOLDER_DESCRIPTION: &str = "Fallback option generated due to incomplete model response.";
const PLACEHOLDER_SOURCE: &str = "incomplete_response";

/// Recover and normalize plans from raw model output.
pub fn parse_plans(raw: &str) -> Result<Vec<Plan>, ParseFailure> {
    extract_plans(raw).map(|records| normalize_plans(&records))
}

/// Normalize up to five records and pad to exactly five.
///
/// Each plan gets a distinct vibe tag. A requested tag that is invalid or
/// already taken yields to the positional tag, or the first free tag in
/// canonical order when the positional one is taken too.
pub fn normalize_plans(records: &[Map<String, Value>]) -> Vec<Plan> {
    let mut used = [false; PLANS_PER_ROUND];
    let mut plans = Vec::with_capacity(PLANS_PER_ROUND);

    for (idx, raw) in records.iter().take(PLANS_PER_ROUND).enumerate() {
        let requested = raw
            .get("vibe_type")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<VibeType>().ok());
        let vibe = assign_vibe(requested, idx, &mut used);
        plans.push(normalize_plan(raw, idx, vibe));
    }

    while plans.len() < PLANS_PER_ROUND {
        let idx = plans.len();
        let vibe = assign_vibe(None, idx, &mut used);
        plans.push(placeholder_plan(idx, vibe));
    }
    plans
}

fn assign_vibe(requested: Option<VibeType>, idx: usize, used: &mut [bool; PLANS_PER_ROUND]) -> VibeType {
    let free = |v: VibeType, used: &[bool; PLANS_PER_ROUND]| !used[vibe_index(v)];
    let positional = VibeType::for_position(idx);
    let vibe = match requested {
        Some(v) if free(v, used) => v,
        _ if free(positional, used) => positional,
        _ => VibeType::CANONICAL
            .into_iter()
            .find(|v| free(*v, used))
            .unwrap_or(positional),
    };
    used[vibe_index(vibe)] = true;
    vibe
}

fn vibe_index(vibe: VibeType) -> usize {
    VibeType::CANONICAL
        .iter()
        .position(|v| *v == vibe)
        .unwrap_or(0)
}

fn normalize_plan(raw: &Map<String, Value>, idx: usize, vibe_type: VibeType) -> Plan {
    let title = text_field(raw, "title").unwrap_or_else(|| default_title(idx));
    let venue_name = text_field(raw, "venue_name").unwrap_or_else(|| title.clone());
    let logistics = match raw.get("logistics") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    Plan {
        description: text_field(raw, "description").unwrap_or_default(),
        vibe_type,
        date_time: raw.get("date_time").and_then(parse_date_time),
        location: text_field(raw, "location").unwrap_or_default(),
        venue_name,
        estimated_cost: text_field(raw, "estimated_cost").unwrap_or_default(),
        logistics,
        title,
    }
}

fn placeholder_plan(idx: usize, vibe_type: VibeType) -> Plan {
    let title = default_title(idx);
    let mut logistics = Map::new();
    logistics.insert("source".into(), json!(PLACEHOLDER_SOURCE));
    Plan {
        description: PLACEHOLDER_DESCRIPTION.to_owned(),
        vibe_type,
        date_time: None,
        location: String::new(),
        venue_name: title.clone(),
        estimated_cost: String::new(),
        logistics,
        title,
    }
}

fn default_title(idx: usize) -> String {
    format!("Plan Option {}", idx + 1)
}

/// Non-empty text for a field. Scalars are stringified; empty values and
/// containers count as absent.
fn text_field(raw: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match raw.get(key)? {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_owned(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp.
///
/// `Z` is read as `+00:00`. Timestamps without an offset are taken as UTC
/// and bare dates as midnight UTC. Anything else is `None`.
pub fn parse_date_time(value: &Value) -> Option<DateTime<FixedOffset>> {
    let text = value.as_str()?.trim().replace('Z', "+00:00");
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt);
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&text, fmt).ok())
    {
        return Some(dt);
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
    {
        return Some(naive.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}
