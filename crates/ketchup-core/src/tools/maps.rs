//! Shared HTTP client for the Places and Routes APIs.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use super::result::ToolError;

/// Maximum characters of a non-JSON body echoed back as details.
const BODY_DETAILS_LIMIT: usize = 500;
/// Maximum characters of an error body used when no message is present.
const ERROR_MESSAGE_LIMIT: usize = 300;

#[derive(Debug)]
struct MapsEndpoints {
    api_key: String,
    places_url: String,
    routes_url: String,
}

/// Pooled client keyed by one maps API key. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MapsClient {
    http: reqwest::Client,
    endpoints: Arc<MapsEndpoints>,
}

impl MapsClient {
    pub const PLACES_TEXT_SEARCH_URL: &str = "https://places.googleapis.com/v1/places:searchText";
    pub const ROUTES_COMPUTE_URL: &str = "https://routes.googleapis.com/directions/v2:computeRoutes";
    pub const PLACES_FIELD_MASK: &str =
        "places.displayName,places.formattedAddress,places.rating,places.priceLevel";
    pub const ROUTES_FIELD_MASK: &str =
        "routes.distanceMeters,routes.duration,routes.legs.distanceMeters,routes.legs.duration";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new(api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoints: Arc::new(MapsEndpoints {
                api_key: api_key.into(),
                places_url: Self::PLACES_TEXT_SEARCH_URL.to_owned(),
                routes_url: Self::ROUTES_COMPUTE_URL.to_owned(),
            }),
        })
    }

    /// Point both tools at different endpoints (mock servers in tests).
    pub fn with_endpoints(self, places_url: impl Into<String>, routes_url: impl Into<String>) -> Self {
        Self {
            http: self.http,
            endpoints: Arc::new(MapsEndpoints {
                api_key: self.endpoints.api_key.clone(),
                places_url: places_url.into(),
                routes_url: routes_url.into(),
            }),
        }
    }

    pub(crate) fn places_url(&self) -> &str {
        &self.endpoints.places_url
    }

    pub(crate) fn routes_url(&self) -> &str {
        &self.endpoints.routes_url
    }

    /// POST `body` and return the decoded JSON object.
    ///
    /// Transport failures, non-JSON bodies, HTTP errors and upstream
    /// `error` objects all come back as a [`ToolError`] prefixed with `tool`.
    pub(crate) async fn post(
        &self,
        tool: &str,
        url: &str,
        field_mask: &str,
        body: &Value,
    ) -> Result<Map<String, Value>, ToolError> {
        if self.endpoints.api_key.trim().is_empty() {
            return Err(ToolError::new("maps API key not set"));
        }

        let resp = self
            .http
            .post(url)
            .header("X-Goog-Api-Key", &self.endpoints.api_key)
            .header("X-Goog-FieldMask", field_mask)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(tool, &e))?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| transport_error(tool, &e))?;

        let Ok(data) = serde_json::from_str::<Value>(&text) else {
            return Err(
                ToolError::new(format!("{tool} failed: non-JSON response (HTTP {status})"))
                    .with_details(truncate(&text, BODY_DETAILS_LIMIT)),
            );
        };

        let api_error = data.get("error");
        if status >= 400 {
            let message = api_error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map_or_else(|| truncate(&text, ERROR_MESSAGE_LIMIT), str::to_owned);
            return Err(ToolError::new(format!("{tool} failed: HTTP {status}")).with_details(message));
        }

        if let Some(err) = api_error.filter(|e| e.is_object()) {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map_or_else(|| err.to_string(), str::to_owned);
            return Err(ToolError::new(format!("{tool} failed: upstream API error")).with_details(message));
        }

        match data {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

fn transport_error(tool: &str, err: &reqwest::Error) -> ToolError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connection error"
    } else if err.is_decode() || err.is_body() {
        "body error"
    } else {
        "request error"
    };
    ToolError::new(format!("{tool} failed: {kind}")).with_details(err.to_string())
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

// ---------------------------------------------------------------------------
// Lenient argument access
// ---------------------------------------------------------------------------

/// String argument, trimmed. Numbers and booleans are stringified.
pub(crate) fn str_arg(args: &Map<String, Value>, key: &str) -> String {
    match args.get(key) {
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Integer argument from a number or numeric string.
pub(crate) fn int_arg(args: &Map<String, Value>, key: &str) -> Option<i64> {
    match args.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
