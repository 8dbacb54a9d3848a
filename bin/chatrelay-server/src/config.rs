//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use chatrelay_core::ReframeMode;

/// Default fact endpoint; answers `{"animal": .., "fact": ..}`.
pub const DEFAULT_FACTS_URL: &str = "https://the-truth-one.vercel.app/api/generate?animal=Random";

/// Runtime configuration for chatrelay-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// against a local Ollama without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://chats.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs also go to a daily-rolling file in this directory.
    pub log_dir: Option<String>,

    /// Root URL of the Ollama server.
    pub ollama_url: String,

    /// Connect timeout for the model server. Reads are never timed out.
    pub connect_timeout: Duration,

    /// Fact API URL.
    pub facts_url: String,

    /// Total timeout for one fact fetch.
    pub facts_timeout: Duration,

    /// Whether prompts are decorated with a fact when the request does not say.
    pub fact_mode_default: bool,

    /// Model used when a request names none. When unset the first installed
    /// model is used.
    pub default_model: Option<String>,

    /// How upstream fragments are turned into frames.
    pub reframe_mode: ReframeMode,

    /// Comma-separated CORS origin allow-list; unset allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_openapi: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("CHATRELAY_BIND", "0.0.0.0:5000"),
            database_url: env_or("CHATRELAY_DATABASE_URL", "sqlite://chats.db"),
            log_level: env_or("CHATRELAY_LOG", "info"),
            log_json: parse_bool("CHATRELAY_LOG_JSON", false),
            log_dir: env_opt("CHATRELAY_LOG_DIR"),
            ollama_url: env_or("CHATRELAY_OLLAMA_URL", "http://localhost:11434"),
            connect_timeout: Duration::from_secs(parse_env("CHATRELAY_CONNECT_TIMEOUT_SECS", 5)),
            facts_url: env_or("CHATRELAY_FACTS_URL", DEFAULT_FACTS_URL),
            facts_timeout: Duration::from_secs(parse_env("CHATRELAY_FACTS_TIMEOUT_SECS", 5)),
            fact_mode_default: parse_bool("CHATRELAY_FACT_MODE", true),
            default_model: env_opt("CHATRELAY_DEFAULT_MODEL"),
            reframe_mode: parse_env("CHATRELAY_REFRAME_MODE", ReframeMode::Repair),
            cors_allowed_origins: env_opt("CHATRELAY_CORS_ORIGINS"),
            enable_openapi: parse_bool("CHATRELAY_ENABLE_OPENAPI", true),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".into(),
            database_url: "sqlite://chats.db".into(),
            log_level: "info".into(),
            log_json: false,
            log_dir: None,
            ollama_url: "http://localhost:11434".into(),
            connect_timeout: Duration::from_secs(5),
            facts_url: DEFAULT_FACTS_URL.into(),
            facts_timeout: Duration::from_secs(5),
            fact_mode_default: true,
            default_model: None,
            reframe_mode: ReframeMode::Repair,
            cors_allowed_origins: None,
            enable_openapi: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
