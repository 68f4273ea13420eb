//! Planner output — the typed `Plan` and its parsing/validation gates.
//!
//! A plan is the planner's single structured decision: exactly one tool call,
//! or a terminal "need more info" answer. Nothing else.

pub mod parser;
pub mod validator;

use serde::Serialize;
use serde_json::{Map, Value};

pub use parser::parse_plan;
pub use validator::{validate_plan, Validated, ValidationBlock};

/// The planner's decision. Exactly two shapes exist; the parser rejects
/// everything else, including extra top-level keys.
///
/// Deliberately not `Deserialize`: `parser::parse_plan` is the only way in.
/// A tagged serde derive would silently accept unknown fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Plan {
    /// Call one tool on one server.
    CallTool {
        server: String,
        tool: String,
        args: Map<String, Value>,
    },
    /// Terminal: the planner cannot proceed without more information.
    /// Never triggers a tool call.
    FinalAnswer {
        answer: String,
        needs_more_info: bool,
    },
}

impl Plan {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallTool { .. } => "call_tool",
            Self::FinalAnswer { .. } => "final_answer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_serializes_with_type_tag() {
        let plan = Plan::CallTool {
            server: "mcp-sharepoint".into(),
            tool: "search_sharepoint".into(),
            args: json!({"query": "pii"}).as_object().cloned().unwrap(),
        };
        let v = serde_json::to_value(&plan).unwrap();
        assert_eq!(v["type"], "call_tool");
        assert_eq!(v["server"], "mcp-sharepoint");
        assert_eq!(v["args"]["query"], "pii");
    }

    #[test]
    fn test_final_answer_serializes_with_type_tag() {
        let plan = Plan::FinalAnswer {
            answer: "Which ticket?".into(),
            needs_more_info: true,
        };
        let v = serde_json::to_value(&plan).unwrap();
        assert_eq!(v["type"], "final_answer");
        assert_eq!(v["needs_more_info"], true);
    }
}
