//! Configuration structures.
//!
//! Configuration is constructed once at process start (`HostConfig::from_env`
//! or deserialized from a file) and threaded through the pipeline by
//! parameter. Nothing in the crate reads ambient global state after startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Global host configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Provider name → SSE URL. One transport session per entry.
    #[serde(default)]
    pub servers: HashMap<String, String>,

    /// Planner / summarizer LLM endpoint.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Safety gate configuration.
    #[serde(default)]
    pub gates: GateConfig,

    /// Timeouts for session I/O.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

impl LogFormat {
    /// Parse `GATEHOST_LOG_FORMAT`. Anything other than `json` means text.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// LLM endpoint configuration (OpenAI-compatible chat completions API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL, e.g. `http://localhost:8008/v1`.
    pub base_url: String,

    /// Model identifier passed through to the endpoint.
    pub model: String,

    /// Optional bearer token.
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8008/v1".to_string(),
            model: "Qwen/Qwen2.5-7B-Instruct".to_string(),
            api_key: None,
        }
    }
}

/// Safety gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Path to the operator allowlist JSON file.
    pub allowlist_path: String,

    /// Directory for trace artifacts. `None` disables trace persistence
    /// without affecting pipeline behavior.
    pub trace_dir: Option<String>,

    /// Always attempt summarization after a successful typed parse, even
    /// when the query does not ask for it.
    pub summarize: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            allowlist_path: "config/allowlist.json".to_string(),
            trace_dir: None,
            summarize: false,
        }
    }
}

/// Timeouts for session I/O.
///
/// Discovery and execution deadlines are independent: a slow provider during
/// discovery is excluded from the round, while the single tool call gets its
/// own budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Wait for the provider-assigned endpoint event after opening the stream.
    #[serde(with = "humantime_serde")]
    pub connect: Duration,

    /// Per-provider bound on the `tools/list` fan-out.
    #[serde(with = "humantime_serde")]
    pub discovery: Duration,

    /// Bound on the single `tools/call` invocation.
    #[serde(with = "humantime_serde")]
    pub tool_call: Duration,

    /// Bound on planner / summarizer LLM calls.
    #[serde(with = "humantime_serde")]
    pub llm: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            discovery: Duration::from_secs(10),
            tool_call: Duration::from_secs(20),
            llm: Duration::from_secs(60),
        }
    }
}

impl HostConfig {
    /// Build configuration from environment variables.
    ///
    /// Provider URLs: `GATEHOST_SERVERS="name=url,name=url"`. Falls back to
    /// the three local development providers when unset. Other settings:
    /// `GATEHOST_ALLOWLIST_PATH`, `GATEHOST_TRACE_DIR`, `GATEHOST_SUMMARIZE`,
    /// `GATEHOST_LOG_FORMAT`, `LLM_BASE_URL`, `LLM_MODEL`, `LLM_API_KEY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match std::env::var("GATEHOST_SERVERS") {
            Ok(raw) => {
                for entry in raw.split(',') {
                    if let Some((name, url)) = entry.split_once('=') {
                        let (name, url) = (name.trim(), url.trim());
                        if !name.is_empty() && !url.is_empty() {
                            config.servers.insert(name.to_string(), url.to_string());
                        }
                    }
                }
            }
            Err(_) => {
                config.servers.insert(
                    "mcp-sharepoint".to_string(),
                    "http://localhost:5101/sse".to_string(),
                );
                config.servers.insert(
                    "mcp-servicenow".to_string(),
                    "http://localhost:5102/sse".to_string(),
                );
                config.servers.insert(
                    "mcp-policy-kb".to_string(),
                    "http://localhost:5103/sse".to_string(),
                );
            }
        }

        if let Ok(path) = std::env::var("GATEHOST_ALLOWLIST_PATH") {
            if !path.trim().is_empty() {
                config.gates.allowlist_path = path;
            }
        }
        if let Ok(dir) = std::env::var("GATEHOST_TRACE_DIR") {
            if !dir.trim().is_empty() {
                config.gates.trace_dir = Some(dir);
            }
        }
        if let Ok(flag) = std::env::var("GATEHOST_SUMMARIZE") {
            config.gates.summarize = flag.trim() == "1";
        }

        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            if !key.is_empty() {
                config.llm.api_key = Some(key);
            }
        }

        if let Ok(format) = std::env::var("GATEHOST_LOG_FORMAT") {
            config.log_format = LogFormat::from_env_value(&format);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert!(config.servers.is_empty());
        assert_eq!(config.gates.allowlist_path, "config/allowlist.json");
        assert!(config.gates.trace_dir.is_none());
        assert!(!config.gates.summarize);
        assert_eq!(config.timeouts.tool_call, Duration::from_secs(20));
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_env_value("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value("text"), LogFormat::Text);
        assert_eq!(LogFormat::from_env_value("garbage"), LogFormat::Text);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_timeouts_serde_roundtrip() {
        let config = HostConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: HostConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeouts.discovery, config.timeouts.discovery);
        assert_eq!(back.timeouts.llm, config.timeouts.llm);
    }
}
