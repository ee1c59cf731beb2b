//! Unit conversions for maps payloads.

use serde_json::Value;

const METERS_PER_MILE: f64 = 1609.344;
const FEET_PER_METER: f64 = 3.28084;
/// Distances below this many miles are shown in feet.
const FEET_THRESHOLD_MILES: f64 = 0.2;

const PRICE_BUCKETS: [&str; 5] = [
    "$0-10 per person",
    "$10-20 per person",
    "$20-40 per person",
    "$40-80 per person",
    "$80+ per person",
];
const DEFAULT_PRICE_LEVEL: i64 = 2;

/// Map a price level to a cost bucket.
///
/// Accepts integers 0-4 (clamped), numeric strings, and the Places API
/// `PRICE_LEVEL_*` names. Anything else maps to the moderate bucket.
pub fn cost_from_price_level(level: &Value) -> String {
    let level = price_level(level).unwrap_or(DEFAULT_PRICE_LEVEL).clamp(0, 4);
    PRICE_BUCKETS[level as usize].to_string()
}

fn price_level(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let token = s.trim();
            match token.to_ascii_uppercase().as_str() {
                "PRICE_LEVEL_FREE" => Some(0),
                "PRICE_LEVEL_INEXPENSIVE" => Some(1),
                "PRICE_LEVEL_MODERATE" => Some(2),
                "PRICE_LEVEL_EXPENSIVE" => Some(3),
                "PRICE_LEVEL_VERY_EXPENSIVE" => Some(4),
                _ => token.parse().ok(),
            }
        }
        _ => None,
    }
}

/// Seconds from a number or a duration string such as `"754s"`.
pub fn duration_to_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let token = s.trim();
            token.strip_suffix('s').unwrap_or(token).trim().parse().ok()
        }
        _ => None,
    }
}

/// `"M min"` under an hour, else `"H hr"` or `"H hr M min"`.
pub fn format_duration(seconds: Option<f64>) -> Option<String> {
    let seconds = seconds.filter(|s| s.is_finite() && *s > 0.0)?;
    let minutes = ((seconds / 60.0).round_ties_even() as u64).max(1);
    if minutes < 60 {
        return Some(format!("{minutes} min"));
    }
    let (hours, rem) = (minutes / 60, minutes % 60);
    if rem == 0 {
        Some(format!("{hours} hr"))
    } else {
        Some(format!("{hours} hr {rem} min"))
    }
}

/// Miles with one decimal, or feet for short distances.
pub fn format_distance(meters: &Value) -> Option<String> {
    let meters = match meters {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|m: &f64| m.is_finite() && *m > 0.0)?;

    let miles = meters / METERS_PER_MILE;
    if miles < FEET_THRESHOLD_MILES {
        let feet = ((meters * FEET_PER_METER).round_ties_even() as u64).max(1);
        return Some(format!("{feet} ft"));
    }
    Some(format!("{miles:.1} mi"))
}
