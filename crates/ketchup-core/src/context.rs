//! Group context snapshot supplied by the caller for one generation run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only snapshot of a group, its members, and recent history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupContext {
    pub group: GroupInfo,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub recent_events: Vec<RecentEvent>,
}

/// Group identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
}

/// One active group member with their stored preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub default_location: Option<String>,
    #[serde(default)]
    pub activity_likes: Vec<String>,
    #[serde(default)]
    pub activity_dislikes: Vec<String>,
    #[serde(default)]
    pub budget_preference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Member {
    /// Name if set, else email, else `"member"`.
    pub fn display_name(&self) -> &str {
        non_empty(self.name.as_deref())
            .or_else(|| non_empty(self.email.as_deref()))
            .unwrap_or("member")
    }

    /// Stored default location, ignoring blank values.
    pub fn location(&self) -> Option<&str> {
        non_empty(self.default_location.as_deref())
    }
}

/// A past event the group attended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentEvent {
    pub title: String,
    #[serde(default)]
    pub event_date: Option<DateTime<Utc>>,
}

impl GroupContext {
    /// First member location, used as the base for fallback plans.
    pub fn base_location<'a>(&'a self, default: &'a str) -> &'a str {
        self.members
            .iter()
            .find_map(Member::location)
            .unwrap_or(default)
    }

    /// Display names of all members, in context order.
    pub fn member_names(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| m.display_name().to_string())
            .collect()
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
