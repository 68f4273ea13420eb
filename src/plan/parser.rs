//! Strict plan parsing.
//!
//! The planner's raw text must be exactly one well-formed JSON object — no
//! surrounding prose, no markdown fencing, no second object — whose top-level
//! keys are exactly those of one of the two `Plan` variants. This gate exists
//! to stop the planner smuggling free-text instructions or multiple actions
//! past validation, so the key-set check is done by hand rather than relying
//! on serde's tagged-enum handling (which cannot deny unknown fields).

use super::Plan;
use crate::schema::value_type_name;
use serde_json::Value;

const CALL_TOOL_KEYS: [&str; 4] = ["type", "server", "tool", "args"];
const FINAL_ANSWER_KEYS: [&str; 3] = ["type", "answer", "needs_more_info"];

/// Parse raw planner output into a `Plan`, or reject with a reason.
pub fn parse_plan(raw: &str) -> Result<Plan, String> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return Err("planner output must be only a JSON object".to_string());
    }

    // serde_json rejects trailing content, so a second object or appended
    // prose inside the braces-delimited span also fails here.
    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON: {e}"))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "planner output must be a JSON object".to_string())?;

    let plan_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "plan is missing a string 'type' field".to_string())?;

    match plan_type {
        "call_tool" => {
            check_exact_keys(obj, &CALL_TOOL_KEYS)?;
            let server = require_string(obj, "server")?;
            let tool = require_string(obj, "tool")?;
            let args = obj
                .get("args")
                .and_then(Value::as_object)
                .ok_or_else(|| field_type_error(obj, "args", "object"))?
                .clone();
            Ok(Plan::CallTool { server, tool, args })
        }
        "final_answer" => {
            check_exact_keys(obj, &FINAL_ANSWER_KEYS)?;
            let answer = require_string(obj, "answer")?;
            let needs_more_info = obj
                .get("needs_more_info")
                .and_then(Value::as_bool)
                .ok_or_else(|| field_type_error(obj, "needs_more_info", "boolean"))?;
            Ok(Plan::FinalAnswer {
                answer,
                needs_more_info,
            })
        }
        other => Err(format!(
            "plan type must be call_tool or final_answer, got '{other}'"
        )),
    }
}

fn check_exact_keys(
    obj: &serde_json::Map<String, Value>,
    expected: &[&str],
) -> Result<(), String> {
    for key in obj.keys() {
        if !expected.contains(&key.as_str()) {
            return Err(format!("unrecognized top-level field '{key}'"));
        }
    }
    for key in expected {
        if !obj.contains_key(*key) {
            return Err(format!("missing required field '{key}'"));
        }
    }
    Ok(())
}

fn require_string(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String, String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| field_type_error(obj, key, "string"))
}

fn field_type_error(obj: &serde_json::Map<String, Value>, key: &str, expected: &str) -> String {
    match obj.get(key) {
        Some(v) => format!("field '{key}' must be a {expected}, got {}", value_type_name(v)),
        None => format!("missing required field '{key}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_parse_call_tool() {
        let plan = parse_plan(
            r#"{"type":"call_tool","server":"mcp-sharepoint","tool":"search_sharepoint","args":{"query":"pii"}}"#,
        )
        .unwrap();
        match plan {
            Plan::CallTool { server, tool, args } => {
                assert_eq!(server, "mcp-sharepoint");
                assert_eq!(tool, "search_sharepoint");
                assert_eq!(args.get("query"), Some(&json!("pii")));
            }
            Plan::FinalAnswer { .. } => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_parse_final_answer() {
        let plan = parse_plan(
            r#"{"type":"final_answer","answer":"Which ticket?","needs_more_info":true}"#,
        )
        .unwrap();
        assert_eq!(plan.kind(), "final_answer");
    }

    #[test]
    fn test_whitespace_around_object_tolerated() {
        assert!(parse_plan(
            "  {\"type\":\"final_answer\",\"answer\":\"x\",\"needs_more_info\":true}\n"
        )
        .is_ok());
    }

    #[test]
    fn test_surrounding_prose_rejected() {
        let err = parse_plan(
            r#"Sure! Here is the plan: {"type":"final_answer","answer":"x","needs_more_info":true}"#,
        )
        .unwrap_err();
        assert!(err.contains("only a JSON object"));
    }

    #[test]
    fn test_markdown_fence_rejected() {
        let raw = "```json\n{\"type\":\"final_answer\",\"answer\":\"x\",\"needs_more_info\":true}\n```";
        assert!(parse_plan(raw).is_err());
    }

    #[test]
    fn test_two_objects_rejected() {
        let raw = r#"{"type":"final_answer","answer":"x","needs_more_info":true}{"type":"call_tool"}"#;
        let err = parse_plan(raw).unwrap_err();
        assert!(err.contains("invalid JSON"));
    }

    #[test]
    fn test_extra_top_level_key_rejected() {
        let raw = r#"{"type":"call_tool","server":"s","tool":"t","args":{},"note":"hi"}"#;
        let err = parse_plan(raw).unwrap_err();
        assert!(err.contains("unrecognized top-level field 'note'"));
    }

    #[test]
    fn test_missing_field_rejected() {
        let err =
            parse_plan(r#"{"type":"call_tool","server":"s","args":{}}"#).unwrap_err();
        assert!(err.contains("missing required field 'tool'"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = parse_plan(r#"{"type":"chain_tools"}"#).unwrap_err();
        assert!(err.contains("call_tool or final_answer"));
    }

    #[test]
    fn test_args_must_be_object() {
        let err =
            parse_plan(r#"{"type":"call_tool","server":"s","tool":"t","args":[1]}"#).unwrap_err();
        assert!(err.contains("'args' must be a object") || err.contains("'args'"));
    }

    #[test]
    fn test_needs_more_info_must_be_boolean() {
        let err = parse_plan(r#"{"type":"final_answer","answer":"x","needs_more_info":"yes"}"#)
            .unwrap_err();
        assert!(err.contains("needs_more_info"));
    }

    #[test]
    fn test_json_array_rejected() {
        assert!(parse_plan("[1,2,3]").is_err());
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(parse_plan("").is_err());
        assert!(parse_plan("   ").is_err());
    }

    proptest! {
        // Anything that does not start/end with braces can never parse.
        #[test]
        fn prop_non_object_text_rejected(text in "[^{}]{0,100}") {
            prop_assert!(parse_plan(&text).is_err());
        }
    }
}
