//! `search_places`: venue text search near a location.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::maps::{MapsClient, int_arg, str_arg};
use super::registry::Tool;
use super::result::{ToolError, ToolResult};

pub const SEARCH_PLACES: &str = "search_places";

const DEFAULT_MAX_RESULTS: i64 = 3;
const MAX_RESULTS_LIMIT: i64 = 10;

/// Places text search, returning `{places: [{name, address, rating, price_level}]}`.
#[derive(Debug, Clone)]
pub struct SearchPlaces {
    maps: MapsClient,
}

impl SearchPlaces {
    pub fn new(maps: MapsClient) -> Self {
        Self { maps }
    }

    async fn search(&self, query: &str, location: &str, max_results: usize) -> Result<Value, ToolError> {
        if query.is_empty() {
            return Err(ToolError::new("search_places query is required"));
        }
        let text_query = if location.is_empty() {
            query.to_owned()
        } else {
            format!("{query} near {location}")
        };

        let data = self
            .maps
            .post(
                SEARCH_PLACES,
                self.maps.places_url(),
                MapsClient::PLACES_FIELD_MASK,
                &json!({"textQuery": text_query}),
            )
            .await?;

        let places: Vec<Value> = data
            .get("places")
            .and_then(Value::as_array)
            .map(|items| items.iter().take(max_results).map(place_summary).collect())
            .unwrap_or_default();
        Ok(json!({"places": places}))
    }
}

fn place_summary(item: &Value) -> Value {
    let name = item
        .get("displayName")
        .and_then(|d| d.get("text"))
        .or_else(|| item.get("name"))
        .cloned()
        .unwrap_or(Value::Null);
    json!({
        "name": name,
        "address": item.get("formattedAddress").cloned().unwrap_or(Value::Null),
        "rating": item.get("rating").cloned().unwrap_or(Value::Null),
        "price_level": item.get("priceLevel").cloned().unwrap_or(Value::Null),
    })
}

#[async_trait]
impl Tool for SearchPlaces {
    fn name(&self) -> &str {
        SEARCH_PLACES
    }

    fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": SEARCH_PLACES,
                "description": "Search venues near a location.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Venue type query, e.g. 'bowling alley'."
                        },
                        "location": {
                            "type": "string",
                            "description": "Area to search near, e.g. 'Boston, MA'."
                        },
                        "max_results": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_RESULTS_LIMIT,
                            "default": DEFAULT_MAX_RESULTS
                        }
                    },
                    "required": ["query", "location"]
                }
            }
        })
    }

    async fn call(&self, args: &Map<String, Value>) -> ToolResult {
        let query = str_arg(args, "query");
        let location = str_arg(args, "location");
        let max_results = int_arg(args, "max_results")
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_LIMIT) as usize;
        match self.search(&query, &location, max_results).await {
            Ok(payload) => ToolResult::Success(payload),
            Err(err) => err.into(),
        }
    }
}
