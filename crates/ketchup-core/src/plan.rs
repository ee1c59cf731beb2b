//! Canonical plan records produced by every generation path.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of plans in every plan round.
pub const PLANS_PER_ROUND: usize = 5;

// ---------------------------------------------------------------------------
// Vibe types
// ---------------------------------------------------------------------------

/// Archetype tag carried by each plan. A round uses every tag exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VibeType {
    Anchor,
    Pivot,
    Reach,
    Chill,
    Wildcard,
}

impl VibeType {
    /// All tags in canonical round order.
    pub const CANONICAL: [VibeType; PLANS_PER_ROUND] = [
        Self::Anchor,
        Self::Pivot,
        Self::Reach,
        Self::Chill,
        Self::Wildcard,
    ];

    /// Tag for a 0-based position, clamped to the last tag past the end.
    pub fn for_position(idx: usize) -> Self {
        Self::CANONICAL[idx.min(PLANS_PER_ROUND - 1)]
    }
}

impl fmt::Display for VibeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Anchor => "anchor",
            Self::Pivot => "pivot",
            Self::Reach => "reach",
            Self::Chill => "chill",
            Self::Wildcard => "wildcard",
        };
        f.write_str(s)
    }
}

impl FromStr for VibeType {
    type Err = VibeTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anchor" => Ok(Self::Anchor),
            "pivot" => Ok(Self::Pivot),
            "reach" => Ok(Self::Reach),
            "chill" => Ok(Self::Chill),
            "wildcard" => Ok(Self::Wildcard),
            _ => Err(VibeTypeParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`VibeType`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid vibe type: {0:?}")]
pub struct VibeTypeParseError(pub String);

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A single plan proposal handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub title: String,
    pub description: String,
    pub vibe_type: VibeType,
    pub date_time: Option<DateTime<FixedOffset>>,
    pub location: String,
    pub venue_name: String,
    /// Free-text cost bucket, e.g. `"$20-40 per person"`.
    pub estimated_cost: String,
    /// Provenance for audit and debugging (source, reason, venue data).
    pub logistics: Map<String, Value>,
}

impl Plan {
    /// The `logistics.source` tag, if the plan carries one.
    pub fn source(&self) -> Option<&str> {
        self.logistics.get("source").and_then(Value::as_str)
    }
}
