//! MCP client layer — wire envelope, tool metadata, transport seam.
//!
//! One session per remote provider (`session::McpSession`). The pipeline and
//! catalog builder talk to providers through the `ToolTransport` trait so
//! tests can substitute in-memory providers.

pub mod session;
pub mod sse;

use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use session::McpSession;

// =============================================================================
// Tool metadata (from tools/list)
// =============================================================================

/// Live metadata for one callable tool, produced fresh per request by
/// discovery. Never persisted or cached across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Owning provider (session name). Filled in by the session, not the wire.
    #[serde(default)]
    pub server: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Wire-level input JSON Schema, as advertised by the provider.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,

    /// Wire-level output JSON Schema, when the provider advertises one.
    /// The typed output gate uses the host-side registry, not this field.
    #[serde(rename = "outputSchema", default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

// =============================================================================
// Tool response envelope (from tools/call)
// =============================================================================

/// One display/grounding content entry in a tool response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub text: String,
}

/// Wire-level tool call result. Untrusted until validated by the typed
/// output gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Typed payload. May be absent on error or for text-only tools.
    #[serde(rename = "structuredContent", default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,

    /// Ordered display content.
    #[serde(default)]
    pub content: Vec<ContentItem>,

    /// Authoritative tool-level success/failure flag. `true` means the call
    /// transported successfully but the tool itself reported failure.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

// =============================================================================
// Transport seam
// =============================================================================

/// Request/response surface of one provider session.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Provider name this session is bound to.
    fn server_name(&self) -> &str;

    /// Issue `tools/list` and return descriptors stamped with this server.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Issue exactly one `tools/call`.
    async fn call_tool(&self, tool: &str, args: &Value) -> Result<ToolResponse>;
}
