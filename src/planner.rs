//! Planner LLM interface and prompt construction.
//!
//! The planner is an OpenAI-compatible chat endpoint. The client returns the
//! assistant's raw text unmodified; the parse gate (`plan::parse_plan`) is
//! the only place that decides whether that text is an acceptable plan. No
//! brace extraction or other repair happens here.

use crate::types::config::LlmConfig;
use crate::types::errors::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Chat interface
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat-completion backend. Implementations return the assistant's raw
/// text; callers own all parsing and validation of it.
#[async_trait]
pub trait PlannerClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

// ============================================================================
// HTTP client
// ============================================================================

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug)]
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PlannerClient for LlmClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let url = self.completions_url();
        let payload = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let mut request = self.http.post(&url).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::transport(format!(
                "LLM endpoint {url} returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::protocol("LLM response is missing choices[0].message.content")
            })?;

        Ok(content.trim().to_string())
    }
}

// ============================================================================
// Planner prompt
// ============================================================================

const SYSTEM_RULES: &str = "\
You are a tool-routing planner inside an agentic platform.

Hard rules:
- You MUST respond with ONLY valid JSON (no markdown, no extra text).
- You must choose exactly ONE of:
  1) {\"type\":\"call_tool\",\"server\":\"<server>\",\"tool\":\"<tool>\",\"args\":{...}}
  2) {\"type\":\"final_answer\",\"answer\":\"...\",\"needs_more_info\":true}

Tool use rules:
- You may ONLY choose tools that appear in the provided TOOL_CATALOG.
- Tool arguments MUST match the tool's inputSchema (keys and types).
- If you cannot answer without tool output, choose final_answer with needs_more_info=true.
- Do NOT hallucinate facts. Do NOT invent tools. Do NOT guess IDs. Use search tools first when needed.

Routing rules (MUST follow):
- If the user mentions a SharePoint doc id matching: sp-<digits> (example: sp-001),
  then you MUST use mcp-sharepoint.fetch_sharepoint_doc with {\"doc_id\": \"<that id>\"}.
- If the user mentions a Policy KB policy id matching: policy-<digits> (example: policy-001),
  then you MUST use mcp-policy-kb.fetch_policy_entry with {\"policy_id\": \"<that id>\"}.
- If the user mentions a ServiceNow ticket id matching common patterns like:
  INC<digits>, RITM<digits>, TASK<digits>, CHG<digits> (case-insensitive),
  then you MUST use mcp-servicenow.get_ticket with {\"ticket_id\": \"<that id>\"}.
- If the user asks to \"summarize\" and provides an id, you MUST first fetch the document/policy/ticket
  using the correct fetch tool above (still only one tool call total).
- If the user asks to \"find/search\" but does NOT provide a concrete id, use the relevant search tool first:
  - SharePoint: mcp-sharepoint.search_sharepoint {\"query\": \"...\", \"top_k\": N}
  - Policy KB:  mcp-policy-kb.search_policy_kb {\"query\": \"...\", \"top_k\": N}
  - ServiceNow: mcp-servicenow.search_servicenow_tickets {\"query\": \"...\", \"top_k\": N}
";

fn id_regexes() -> &'static [(String, Regex); 3] {
    static REGEXES: OnceLock<[(String, Regex); 3]> = OnceLock::new();
    REGEXES.get_or_init(|| {
        // Hand-written literals, compiled once at first use.
        #[allow(clippy::unwrap_used)]
        let regexes = [
            (
                "sharepoint_doc_id".to_string(),
                Regex::new(r"(?i)\b(sp-\d+)\b").unwrap(),
            ),
            (
                "policy_id".to_string(),
                Regex::new(r"(?i)\b(policy-\d+)\b").unwrap(),
            ),
            (
                "servicenow_ticket_id".to_string(),
                Regex::new(r"(?i)\b((?:INC|RITM|TASK|CHG)\d+)\b").unwrap(),
            ),
        ];
        regexes
    })
}

/// Best-effort id extraction, included in the prompt to steer routing.
/// Advisory only: the parse and validation gates still decide what runs.
pub fn extract_id_hints(query: &str) -> Map<String, Value> {
    let mut hints = Map::new();
    for (label, regex) in id_regexes() {
        if let Some(captures) = regex.captures(query.trim()) {
            if let Some(id) = captures.get(1) {
                hints.insert(label.clone(), Value::String(id.as_str().to_string()));
            }
        }
    }
    hints
}

/// Assemble the planner conversation: routing rules plus the user query,
/// id hints, and this request's live tool catalog.
pub fn build_planner_messages(query: &str, catalog_json: &Value) -> Vec<ChatMessage> {
    let hints = Value::Object(extract_id_hints(query));
    let user = format!(
        "USER_QUERY:\n{query}\n\n\
         ID_HINTS (best-effort, may be empty):\n{hints}\n\n\
         TOOL_CATALOG (JSON):\n{catalog_json}\n\n\
         Return ONLY one JSON object following the schema.\n"
    );
    vec![ChatMessage::system(SYSTEM_RULES), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_hints_sharepoint() {
        let hints = extract_id_hints("Fetch SharePoint doc sp-001 please");
        assert_eq!(hints.get("sharepoint_doc_id"), Some(&"sp-001".into()));
        assert!(!hints.contains_key("policy_id"));
    }

    #[test]
    fn test_id_hints_case_insensitive_ticket() {
        let hints = extract_id_hints("what happened with inc12345?");
        assert_eq!(hints.get("servicenow_ticket_id"), Some(&"inc12345".into()));
    }

    #[test]
    fn test_id_hints_multiple_kinds() {
        let hints = extract_id_hints("compare policy-007 with sp-042");
        assert_eq!(hints.len(), 2);
        assert_eq!(hints.get("policy_id"), Some(&"policy-007".into()));
        assert_eq!(hints.get("sharepoint_doc_id"), Some(&"sp-042".into()));
    }

    #[test]
    fn test_id_hints_empty() {
        assert!(extract_id_hints("find the pii logging policy").is_empty());
    }

    #[test]
    fn test_planner_messages_shape() {
        let catalog = serde_json::json!({"mcp-sharepoint": []});
        let messages = build_planner_messages("Fetch sp-001", &catalog);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("TOOL_CATALOG"));
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("USER_QUERY"));
        assert!(messages[1].content.contains("sp-001"));
        assert!(messages[1].content.contains("sharepoint_doc_id"));
    }

    #[test]
    fn test_completions_url_strips_trailing_slash() {
        let client = LlmClient::new(
            LlmConfig {
                base_url: "http://localhost:8008/v1/".to_string(),
                model: "m".to_string(),
                api_key: None,
            },
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.completions_url(),
            "http://localhost:8008/v1/chat/completions"
        );
    }
}
