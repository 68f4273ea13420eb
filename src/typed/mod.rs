//! Typed output gate — per-tool output schemas and strict payload parsing.
//!
//! Maps `(server, tool)` to an expected output shape via a static registry.
//! The gate requires `isError = false` and a present `structuredContent`,
//! validates the flat field set against the registered schema (first failing
//! constraint reported), then deserializes into the typed model, which also
//! rejects unknown nested fields. Any failure halts summarization; the raw
//! response goes back to the caller annotated with the blocking reason.

pub mod models;

use crate::mcp::ToolResponse;
use crate::schema::{self, FieldSpec, ObjectSchema, PrimitiveType};
use serde_json::Value;

pub use models::TypedPayload;

/// Why the typed output gate rejected a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedParseBlock {
    pub reason: String,
}

impl TypedParseBlock {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for TypedParseBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

fn search_output_schema() -> ObjectSchema {
    ObjectSchema::new(vec![
        FieldSpec::required("query", PrimitiveType::String),
        FieldSpec::optional("results", PrimitiveType::Array),
    ])
}

fn fetch_output_schema(id_field: &str) -> ObjectSchema {
    ObjectSchema::new(vec![
        FieldSpec::required(id_field, PrimitiveType::String),
        FieldSpec::required("content", PrimitiveType::String),
    ])
}

/// The registered output schema for a tool, if any.
pub fn output_schema(server: &str, tool: &str) -> Option<ObjectSchema> {
    match (server, tool) {
        ("mcp-sharepoint", "search_sharepoint")
        | ("mcp-servicenow", "search_servicenow_tickets")
        | ("mcp-policy-kb", "search_policy_kb") => Some(search_output_schema()),
        ("mcp-sharepoint", "fetch_sharepoint_doc") => Some(fetch_output_schema("doc_id")),
        ("mcp-servicenow", "get_ticket") => Some(fetch_output_schema("ticket_id")),
        ("mcp-policy-kb", "fetch_policy_entry") => Some(fetch_output_schema("policy_id")),
        _ => None,
    }
}

fn into_typed(server: &str, tool: &str, payload: Value) -> Result<TypedPayload, String> {
    let typed = match (server, tool) {
        ("mcp-sharepoint", "search_sharepoint") => {
            TypedPayload::SharePointSearch(serde_json::from_value(payload).map_err(stringify)?)
        }
        ("mcp-sharepoint", "fetch_sharepoint_doc") => {
            TypedPayload::SharePointDoc(serde_json::from_value(payload).map_err(stringify)?)
        }
        ("mcp-servicenow", "search_servicenow_tickets") => {
            TypedPayload::ServiceNowSearch(serde_json::from_value(payload).map_err(stringify)?)
        }
        ("mcp-servicenow", "get_ticket") => {
            TypedPayload::ServiceNowTicket(serde_json::from_value(payload).map_err(stringify)?)
        }
        ("mcp-policy-kb", "search_policy_kb") => {
            TypedPayload::PolicyKbSearch(serde_json::from_value(payload).map_err(stringify)?)
        }
        ("mcp-policy-kb", "fetch_policy_entry") => {
            TypedPayload::PolicyKbDoc(serde_json::from_value(payload).map_err(stringify)?)
        }
        _ => return Err(format!("no output schema registered for ({server}, {tool})")),
    };
    Ok(typed)
}

fn stringify(err: serde_json::Error) -> String {
    err.to_string()
}

/// Run the typed output gate on a transported tool response.
pub fn parse_typed_output(
    server: &str,
    tool: &str,
    response: &ToolResponse,
) -> Result<TypedPayload, TypedParseBlock> {
    let expected = output_schema(server, tool).ok_or_else(|| {
        TypedParseBlock::new(format!(
            "no output schema registered for ({server}, {tool})"
        ))
    })?;

    if response.is_error {
        return Err(TypedParseBlock::new("tool returned isError=true"));
    }

    let payload = response.structured_content.as_ref().ok_or_else(|| {
        TypedParseBlock::new("missing 'structuredContent' (needed for typed parsing)")
    })?;

    schema::validate(&expected, payload).map_err(|e| {
        TypedParseBlock::new(format!("output of {server}.{tool}: {e}"))
    })?;

    into_typed(server, tool, payload.clone()).map_err(|e| {
        TypedParseBlock::new(format!("typed parsing failed for {server}.{tool}: {e}"))
    })
}
