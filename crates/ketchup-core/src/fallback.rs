//! Deterministic plan synthesis for when the model cannot deliver.
//!
//! Both generators are pure functions of data already in hand and always
//! return exactly [`PLANS_PER_ROUND`] plans in canonical vibe order.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};

use crate::context::GroupContext;
use crate::grounding::Venue;
use crate::plan::{PLANS_PER_ROUND, Plan, VibeType};
use crate::tools::units::cost_from_price_level;

pub const TEMPLATE_SOURCE: &str = "fallback";
pub const GROUNDED_SOURCE: &str = "maps_fallback";

const REASON_LIMIT: usize = 180;
const REFINEMENT_LIMIT: usize = 240;
/// Fallback plans start this many days out, one day apart.
const FIRST_DAY_OFFSET: i64 = 7;

/// (title, description, cost) for each template slot, in vibe order.
const TEMPLATES: [(&str, &str, &str); PLANS_PER_ROUND] = [
    (
        "Cozy Cafe Catch-up",
        "Relaxed hangout over coffee and conversation.",
        "$10-20 per person",
    ),
    (
        "Food Hall Sampler",
        "Try multiple cuisines together in one spot.",
        "$20-35 per person",
    ),
    (
        "Park Picnic Sunset",
        "Low-cost outdoor plan with time to talk.",
        "$5-15 per person",
    ),
    (
        "Bowling + Snacks",
        "Casual activity with light competition.",
        "$25-40 per person",
    ),
    (
        "Live Event Night",
        "Explore a slightly adventurous local event.",
        "$30-60 per person",
    ),
];

/// Builds fallback plans for one group and one failure reason.
#[derive(Debug, Clone)]
pub struct FallbackSynthesizer<'a> {
    context: &'a GroupContext,
    base_location: &'a str,
    reason: String,
    refinement_notes: String,
    now: DateTime<Utc>,
}

impl<'a> FallbackSynthesizer<'a> {
    pub fn new(
        context: &'a GroupContext,
        default_location: &'a str,
        reason: &str,
        refinement_notes: Option<&str>,
    ) -> Self {
        Self {
            context,
            base_location: context.base_location(default_location),
            reason: truncate(reason, REASON_LIMIT),
            refinement_notes: truncate(refinement_notes.unwrap_or_default(), REFINEMENT_LIMIT),
            now: Utc::now(),
        }
    }

    /// Pin the clock used for plan dates.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Five generic archetype plans.
    pub fn template_plans(&self) -> Vec<Plan> {
        (0..PLANS_PER_ROUND).map(|idx| self.template_plan(idx)).collect()
    }

    /// One plan per venue (up to five), padded with the template plans at
    /// the remaining positions. `None` when there are no venues.
    pub fn grounded_plans(&self, venues: &[Venue]) -> Option<Vec<Plan>> {
        if venues.is_empty() {
            return None;
        }
        let mut plans: Vec<Plan> = venues
            .iter()
            .take(PLANS_PER_ROUND)
            .enumerate()
            .map(|(idx, venue)| self.venue_plan(idx, venue))
            .collect();
        for idx in plans.len()..PLANS_PER_ROUND {
            plans.push(self.template_plan(idx));
        }
        Some(plans)
    }

    fn template_plan(&self, idx: usize) -> Plan {
        let (title, description, cost) = TEMPLATES[idx.min(PLANS_PER_ROUND - 1)];
        Plan {
            title: title.to_owned(),
            description: format!("{description} (Fallback plan for {}.)", self.context.group.name),
            vibe_type: VibeType::for_position(idx),
            date_time: Some(self.date_for(idx)),
            location: self.base_location.to_owned(),
            venue_name: title.to_owned(),
            estimated_cost: cost.to_owned(),
            logistics: self.logistics(TEMPLATE_SOURCE),
        }
    }

    fn venue_plan(&self, idx: usize, venue: &Venue) -> Plan {
        let venue_name = if venue.name.is_empty() {
            format!("Local Option {}", idx + 1)
        } else {
            venue.name.clone()
        };
        let location = if venue.address.is_empty() {
            self.base_location.to_owned()
        } else {
            venue.address.clone()
        };
        let rating = match &venue.rating {
            Value::Null => String::new(),
            Value::String(s) => format!(" Rated {s}/5."),
            other => format!(" Rated {other}/5."),
        };

        let mut logistics = self.logistics(GROUNDED_SOURCE);
        logistics.insert("venue".into(), json!(venue));

        Plan {
            title: venue_name.clone(),
            description: format!("Meet at {venue_name} in {location}.{rating}"),
            vibe_type: VibeType::for_position(idx),
            date_time: Some(self.date_for(idx)),
            location,
            venue_name,
            estimated_cost: cost_from_price_level(&venue.price_level),
            logistics,
        }
    }

    fn date_for(&self, idx: usize) -> chrono::DateTime<chrono::FixedOffset> {
        (self.now + Duration::days(FIRST_DAY_OFFSET + idx as i64)).fixed_offset()
    }

    fn logistics(&self, source: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("source".into(), json!(source));
        map.insert("reason".into(), json!(self.reason));
        map.insert("refinement_notes".into(), json!(self.refinement_notes));
        map.insert("members".into(), json!(self.context.member_names()));
        map
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GroupInfo, Member};
    use chrono::TimeZone;

    fn context() -> GroupContext {
        GroupContext {
            group: GroupInfo {
                id: None,
                name: "Crew".into(),
            },
            members: vec![
                Member {
                    name: Some("Ana".into()),
                    ..Member::default()
                },
                Member {
                    email: Some("bo@x.io".into()),
                    default_location: Some("Cambridge, MA".into()),
                    ..Member::default()
                },
            ],
            recent_events: vec![],
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn venue(name: &str, address: &str, rating: Value, price: Value) -> Venue {
        Venue {
            name: name.into(),
            address: address.into(),
            rating,
            price_level: price,
        }
    }

    #[test]
    fn template_plans_are_canonical() {
        let ctx = context();
        let plans = FallbackSynthesizer::new(&ctx, "Boston, MA", "model down", Some("cheaper"))
            .at(fixed_now())
            .template_plans();
        assert_eq!(plans.len(), 5);
        let vibes: Vec<_> = plans.iter().map(|p| p.vibe_type).collect();
        assert_eq!(vibes, VibeType::CANONICAL.to_vec());
        assert!(plans.iter().all(|p| p.source() == Some(TEMPLATE_SOURCE)));
        assert_eq!(plans[0].location, "Cambridge, MA");
        assert_eq!(
            plans[0].description,
            "Relaxed hangout over coffee and conversation. (Fallback plan for Crew.)"
        );
        assert_eq!(plans[0].logistics["members"], json!(["Ana", "bo@x.io"]));
        assert_eq!(plans[0].logistics["refinement_notes"], "cheaper");
        let first = plans[0].date_time.unwrap();
        let last = plans[4].date_time.unwrap();
        assert_eq!((first - fixed_now().fixed_offset()).num_days(), 7);
        assert_eq!((last - fixed_now().fixed_offset()).num_days(), 11);
    }

    #[test]
    fn reason_and_notes_are_truncated() {
        let ctx = context();
        let long = "x".repeat(500);
        let plans = FallbackSynthesizer::new(&ctx, "Boston, MA", &long, Some(&long)).template_plans();
        assert_eq!(plans[0].logistics["reason"].as_str().map(str::len), Some(180));
        assert_eq!(plans[0].logistics["refinement_notes"].as_str().map(str::len), Some(240));
    }

    #[test]
    fn default_location_when_no_member_has_one() {
        let mut ctx = context();
        ctx.members[1].default_location = None;
        let plans = FallbackSynthesizer::new(&ctx, "Boston, MA", "r", None).template_plans();
        assert!(plans.iter().all(|p| p.location == "Boston, MA"));
    }

    #[test]
    fn grounded_plans_pad_with_templates_at_same_positions() {
        let ctx = context();
        let venues = vec![
            venue("Lucky Strike", "145 Ipswich St", json!(4.3), json!("PRICE_LEVEL_MODERATE")),
            venue("", "1 Main St", Value::Null, Value::Null),
            venue("Tasting Room", "", json!(5), json!(1)),
        ];
        let plans = FallbackSynthesizer::new(&ctx, "Boston, MA", "empty plans", None)
            .at(fixed_now())
            .grounded_plans(&venues)
            .unwrap();

        assert_eq!(plans.len(), 5);
        let vibes: Vec<_> = plans.iter().map(|p| p.vibe_type).collect();
        assert_eq!(vibes, VibeType::CANONICAL.to_vec());

        assert_eq!(plans[0].description, "Meet at Lucky Strike in 145 Ipswich St. Rated 4.3/5.");
        assert_eq!(plans[0].estimated_cost, "$20-40 per person");
        assert_eq!(plans[0].logistics["venue"]["address"], "145 Ipswich St");
        assert_eq!(plans[1].title, "Local Option 2");
        assert_eq!(plans[1].description, "Meet at Local Option 2 in 1 Main St.");
        assert_eq!(plans[2].location, "Cambridge, MA");
        assert_eq!(plans[2].estimated_cost, "$10-20 per person");

        assert!(plans[..3].iter().all(|p| p.source() == Some(GROUNDED_SOURCE)));
        assert_eq!(plans[3].title, "Bowling + Snacks");
        assert_eq!(plans[4].title, "Live Event Night");
        assert!(plans[3..].iter().all(|p| p.source() == Some(TEMPLATE_SOURCE)));
    }

    #[test]
    fn grounded_needs_venues() {
        let ctx = context();
        assert!(FallbackSynthesizer::new(&ctx, "Boston, MA", "r", None)
            .grounded_plans(&[])
            .is_none());
    }
}
