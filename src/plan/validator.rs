//! Plan validation against the effective allowlist and live input schemas.
//!
//! Gate order for `CallTool`: allowlist membership first, then the tool's
//! declared input schema (required fields present, unknown fields rejected,
//! primitive types matched). `FinalAnswer` is accepted only as a terminal
//! "needs more info" response — it never triggers a tool call.

use super::Plan;
use crate::catalog::{EffectiveAllowlist, ToolCatalog};
use crate::schema::{self, ObjectSchema};
use serde_json::{Map, Value};

/// A plan that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    /// Execute exactly one tool call.
    Execute {
        server: String,
        tool: String,
        args: Map<String, Value>,
    },
    /// Terminal success: no tool call is issued.
    NeedsMoreInfo { answer: String },
}

/// Why a plan was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationBlock {
    /// `(server, tool)` is not in the effective allowlist for this request.
    Allowlist(String),
    /// The plan violates the tool's input schema or the `FinalAnswer` rules.
    /// Carries the first failing constraint.
    Schema(String),
}

impl ValidationBlock {
    pub fn reason(&self) -> &str {
        match self {
            Self::Allowlist(reason) | Self::Schema(reason) => reason,
        }
    }
}

/// Validate a parsed plan for this request's catalog and allowlist.
pub fn validate_plan(
    plan: &Plan,
    catalog: &ToolCatalog,
    allowlist: &EffectiveAllowlist,
) -> Result<Validated, ValidationBlock> {
    match plan {
        Plan::FinalAnswer {
            answer,
            needs_more_info,
        } => {
            if !needs_more_info {
                return Err(ValidationBlock::Schema(
                    "final_answer requires needs_more_info=true in single-step mode".to_string(),
                ));
            }
            if answer.trim().is_empty() {
                return Err(ValidationBlock::Schema(
                    "final_answer requires a non-empty 'answer'".to_string(),
                ));
            }
            Ok(Validated::NeedsMoreInfo {
                answer: answer.clone(),
            })
        }

        Plan::CallTool { server, tool, args } => {
            if !allowlist.permits(server, tool) {
                return Err(ValidationBlock::Allowlist(format!(
                    "tool not allowed: {server}.{tool}"
                )));
            }

            // Allowlisted implies discovered, so the descriptor exists unless
            // the provider's surface changed mid-request.
            let descriptor = catalog.get(server, tool).ok_or_else(|| {
                ValidationBlock::Allowlist(format!(
                    "tool not in this request's catalog: {server}.{tool}"
                ))
            })?;

            let input_schema =
                ObjectSchema::from_json_schema(&descriptor.input_schema).map_err(|e| {
                    ValidationBlock::Schema(format!(
                        "unusable input schema for {server}.{tool}: {e}"
                    ))
                })?;

            schema::validate(&input_schema, &Value::Object(args.clone())).map_err(|e| {
                ValidationBlock::Schema(format!("args for {server}.{tool}: {e}"))
            })?;

            Ok(Validated::Execute {
                server: server.clone(),
                tool: tool.clone(),
                args: args.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AllowlistConfig;
    use crate::mcp::ToolDescriptor;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};

    fn catalog() -> ToolCatalog {
        ToolCatalog::from_descriptors(vec![
            ToolDescriptor {
                server: "mcp-sharepoint".into(),
                name: "search_sharepoint".into(),
                description: String::new(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "top_k": {"type": "integer"}
                    },
                    "required": ["query"]
                }),
                output_schema: None,
            },
            ToolDescriptor {
                server: "mcp-sharepoint".into(),
                name: "delete_all_docs".into(),
                description: String::new(),
                input_schema: json!({"type": "object", "properties": {}}),
                output_schema: None,
            },
        ])
    }

    fn allowlist() -> EffectiveAllowlist {
        // Operator permits only the search tool; delete_all_docs stays
        // discovered-but-forbidden.
        let config = AllowlistConfig::configured_for_tests(HashMap::from([(
            "mcp-sharepoint".to_string(),
            HashSet::from(["search_sharepoint".to_string()]),
        )]));
        config.effective(&catalog().discovered_map())
    }

    fn call_plan(tool: &str, args: serde_json::Value) -> Plan {
        Plan::CallTool {
            server: "mcp-sharepoint".into(),
            tool: tool.into(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_valid_call_accepted() {
        let out = validate_plan(
            &call_plan("search_sharepoint", json!({"query": "pii", "top_k": 3})),
            &catalog(),
            &allowlist(),
        )
        .unwrap();
        match out {
            Validated::Execute { server, tool, .. } => {
                assert_eq!(server, "mcp-sharepoint");
                assert_eq!(tool, "search_sharepoint");
            }
            Validated::NeedsMoreInfo { .. } => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_discovered_but_not_configured_is_allowlist_blocked() {
        let err = validate_plan(
            &call_plan("delete_all_docs", json!({})),
            &catalog(),
            &allowlist(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationBlock::Allowlist(_)));
        assert!(err.reason().contains("delete_all_docs"));
    }

    #[test]
    fn test_unknown_tool_is_allowlist_blocked() {
        let err = validate_plan(
            &call_plan("made_up_tool", json!({})),
            &catalog(),
            &allowlist(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationBlock::Allowlist(_)));
    }

    #[test]
    fn test_missing_required_arg_is_schema_blocked() {
        let err = validate_plan(
            &call_plan("search_sharepoint", json!({})),
            &catalog(),
            &allowlist(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationBlock::Schema(_)));
        assert!(err.reason().contains("missing required field 'query'"));
    }

    #[test]
    fn test_unknown_arg_is_schema_blocked() {
        let err = validate_plan(
            &call_plan("search_sharepoint", json!({"query": "x", "mode": "fast"})),
            &catalog(),
            &allowlist(),
        )
        .unwrap_err();
        assert!(err.reason().contains("unknown field 'mode'"));
    }

    #[test]
    fn test_wrong_arg_type_is_schema_blocked() {
        let err = validate_plan(
            &call_plan("search_sharepoint", json!({"query": 42})),
            &catalog(),
            &allowlist(),
        )
        .unwrap_err();
        assert!(err.reason().contains("expected string"));
    }

    #[test]
    fn test_final_answer_needs_more_info_true() {
        let out = validate_plan(
            &Plan::FinalAnswer {
                answer: "Which document id?".into(),
                needs_more_info: true,
            },
            &catalog(),
            &allowlist(),
        )
        .unwrap();
        assert!(matches!(out, Validated::NeedsMoreInfo { .. }));
    }

    #[test]
    fn test_final_answer_needs_more_info_false_rejected() {
        let err = validate_plan(
            &Plan::FinalAnswer {
                answer: "Here is my guess".into(),
                needs_more_info: false,
            },
            &catalog(),
            &allowlist(),
        )
        .unwrap_err();
        assert!(err.reason().contains("needs_more_info=true"));
    }

    #[test]
    fn test_final_answer_empty_answer_rejected() {
        let err = validate_plan(
            &Plan::FinalAnswer {
                answer: "  ".into(),
                needs_more_info: true,
            },
            &catalog(),
            &allowlist(),
        )
        .unwrap_err();
        assert!(err.reason().contains("non-empty"));
    }

    #[test]
    fn test_empty_allowlist_rejects_everything() {
        let config = AllowlistConfig::configured_for_tests(HashMap::new());
        let empty = config.effective(&catalog().discovered_map());
        let err = validate_plan(
            &call_plan("search_sharepoint", json!({"query": "x"})),
            &catalog(),
            &empty,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationBlock::Allowlist(_)));
    }
}
