use std::env;
use std::time::Duration;

/// Connection settings for the OpenAI-compatible model endpoint.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL up to and including the API version, e.g. `http://host:8080/v1`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    /// Whole-request timeout for generation calls.
    pub generation_timeout: Duration,
    /// Whole-request timeout for liveness probes.
    pub liveness_timeout: Duration,
    pub max_idle_connections: usize,
    pub pool_idle_timeout: Duration,
}

impl ModelConfig {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1";
    pub const DEFAULT_MODEL: &str = "Qwen/Qwen3-4B-Instruct";
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);
    pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 10;
    pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Build a config pointing at an explicit endpoint with default timeouts.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            generation_timeout: Self::DEFAULT_GENERATION_TIMEOUT,
            liveness_timeout: Self::DEFAULT_LIVENESS_TIMEOUT,
            max_idle_connections: Self::DEFAULT_MAX_IDLE_CONNECTIONS,
            pool_idle_timeout: Self::DEFAULT_POOL_IDLE_TIMEOUT,
        }
    }

    /// `{base_url}/chat/completions`.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// `{base_url}/models`, used for liveness probes.
    pub fn models_url(&self) -> String {
        format!("{}/models", self.base_url.trim_end_matches('/'))
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_URL, Self::DEFAULT_MODEL)
    }
}

/// Planner configuration.
///
/// Reads `KETCHUP_*` environment variables, falling back to the defaults
/// below when a variable is unset or unparseable.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub model: ModelConfig,
    /// Maps API key. `None` disables tool grounding entirely.
    pub maps_api_key: Option<String>,
    /// Substitute template plans when generation fails outright.
    pub fallback_enabled: bool,
    pub max_tool_rounds: usize,
    /// Location used by fallback plans when no member has one.
    pub default_location: String,
}

impl PlannerConfig {
    pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 2;
    pub const DEFAULT_LOCATION: &str = "Boston, MA";

    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup (testable without env vars).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let secs = |key: &str, default: Duration| {
            text(key)
                .and_then(|v| parse_or_warn::<u64>(key, &v))
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let mut model = ModelConfig::new(
            text("KETCHUP_MODEL_BASE_URL").unwrap_or_else(|| ModelConfig::DEFAULT_BASE_URL.to_owned()),
            text("KETCHUP_MODEL").unwrap_or_else(|| ModelConfig::DEFAULT_MODEL.to_owned()),
        );
        model.api_key = text("KETCHUP_MODEL_API_KEY");
        model.connect_timeout = secs("KETCHUP_CONNECT_TIMEOUT_SECS", ModelConfig::DEFAULT_CONNECT_TIMEOUT);
        model.generation_timeout =
            secs("KETCHUP_GENERATION_TIMEOUT_SECS", ModelConfig::DEFAULT_GENERATION_TIMEOUT);
        model.liveness_timeout = secs("KETCHUP_LIVENESS_TIMEOUT_SECS", ModelConfig::DEFAULT_LIVENESS_TIMEOUT);
        if let Some(n) = text("KETCHUP_MAX_IDLE_CONNECTIONS")
            .and_then(|v| parse_or_warn("KETCHUP_MAX_IDLE_CONNECTIONS", &v))
        {
            model.max_idle_connections = n;
        }

        let fallback_enabled = text("KETCHUP_PLANNER_FALLBACK")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(true);

        Self {
            model,
            maps_api_key: text("KETCHUP_MAPS_API_KEY"),
            fallback_enabled,
            max_tool_rounds: text("KETCHUP_MAX_TOOL_ROUNDS")
                .and_then(|v| parse_or_warn("KETCHUP_MAX_TOOL_ROUNDS", &v))
                .unwrap_or(Self::DEFAULT_MAX_TOOL_ROUNDS),
            default_location: text("KETCHUP_DEFAULT_LOCATION")
                .unwrap_or_else(|| Self::DEFAULT_LOCATION.to_owned()),
        }
    }

    /// Whether the tool-grounded path is available.
    pub fn tools_enabled(&self) -> bool {
        self.maps_api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            maps_api_key: None,
            fallback_enabled: true,
            max_tool_rounds: Self::DEFAULT_MAX_TOOL_ROUNDS,
            default_location: Self::DEFAULT_LOCATION.to_owned(),
        }
    }
}

/// Parse `true/false/1/0/yes/no/on/off`, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value, "ignoring unparseable config value");
            None
        }
    }
}
