//! `get_directions`: travel distance and duration between two places.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::maps::{MapsClient, str_arg};
use super::registry::Tool;
use super::result::{ToolError, ToolResult};
use super::units::{duration_to_seconds, format_distance, format_duration};

pub const GET_DIRECTIONS: &str = "get_directions";

/// Travel mode accepted by the tool. Unknown values coerce to driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TravelMode {
    #[default]
    Driving,
    Transit,
    Walking,
}

impl TravelMode {
    /// Lenient parse: anything unrecognized is [`TravelMode::Driving`].
    pub fn coerce(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "transit" => Self::Transit,
            "walking" => Self::Walking,
            _ => Self::Driving,
        }
    }

    /// Routes API `travelMode` value.
    fn api_value(self) -> &'static str {
        match self {
            Self::Driving => "DRIVE",
            Self::Transit => "TRANSIT",
            Self::Walking => "WALK",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Driving => "driving",
            Self::Transit => "transit",
            Self::Walking => "walking",
        };
        f.write_str(s)
    }
}

/// Routes compute, returning formatted and raw distance/duration.
#[derive(Debug, Clone)]
pub struct GetDirections {
    maps: MapsClient,
}

impl GetDirections {
    pub fn new(maps: MapsClient) -> Self {
        Self { maps }
    }

    async fn route(&self, origin: &str, destination: &str, mode: TravelMode) -> Result<Value, ToolError> {
        if origin.is_empty() || destination.is_empty() {
            return Err(ToolError::new("get_directions origin and destination are required")
                .with_context("origin", origin)
                .with_context("destination", destination));
        }

        let mut body = json!({
            "origin": {"address": origin},
            "destination": {"address": destination},
            "travelMode": mode.api_value(),
        });
        if mode == TravelMode::Driving {
            body["routingPreference"] = json!("TRAFFIC_AWARE");
        }

        let data = self
            .maps
            .post(
                GET_DIRECTIONS,
                self.maps.routes_url(),
                MapsClient::ROUTES_FIELD_MASK,
                &body,
            )
            .await?;

        let Some(route) = data
            .get("routes")
            .and_then(Value::as_array)
            .and_then(|routes| routes.first())
        else {
            return Err(ToolError::new("NO_ROUTE")
                .with_context("origin", origin)
                .with_context("destination", destination)
                .with_context("mode", mode.to_string())
                .with_details(Value::Object(data)));
        };

        Ok(route_summary(route, origin, destination, mode))
    }
}

/// Distance and duration from the first leg, falling back to route totals.
fn route_summary(route: &Value, origin: &str, destination: &str, mode: TravelMode) -> Value {
    let leg = route
        .get("legs")
        .and_then(Value::as_array)
        .and_then(|legs| legs.first())
        .unwrap_or(route);

    let distance_meters = leg
        .get("distanceMeters")
        .or_else(|| route.get("distanceMeters"))
        .cloned()
        .unwrap_or(Value::Null);
    let duration_seconds = leg
        .get("duration")
        .and_then(duration_to_seconds)
        .or_else(|| route.get("duration").and_then(duration_to_seconds));

    json!({
        "origin": origin,
        "destination": destination,
        "distance": format_distance(&distance_meters),
        "duration": format_duration(duration_seconds),
        "distance_meters": distance_meters,
        "duration_seconds": duration_seconds,
        "mode": mode.to_string(),
    })
}

#[async_trait]
impl Tool for GetDirections {
    fn name(&self) -> &str {
        GET_DIRECTIONS
    }

    fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": GET_DIRECTIONS,
                "description": "Get travel distance and duration between an origin and destination.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "origin": {"type": "string", "description": "Starting address or place."},
                        "destination": {
                            "type": "string",
                            "description": "Destination address or place."
                        },
                        "mode": {
                            "type": "string",
                            "enum": ["driving", "transit", "walking"],
                            "description": "Travel mode."
                        }
                    },
                    "required": ["origin", "destination"]
                }
            }
        })
    }

    async fn call(&self, args: &Map<String, Value>) -> ToolResult {
        let origin = str_arg(args, "origin");
        let destination = str_arg(args, "destination");
        let mode = TravelMode::coerce(&str_arg(args, "mode"));
        match self.route(&origin, &destination, mode).await {
            Ok(payload) => ToolResult::Success(payload),
            Err(err) => err.into(),
        }
    }
}
