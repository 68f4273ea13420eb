//! Per-request trace artifacts for auditability.
//!
//! The recorder collects structured events as the pipeline moves through its
//! gates and can persist the whole run as one JSON file. Large payloads are
//! truncated before recording so a single oversized tool response cannot
//! balloon the artifact.

use crate::types::errors::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MAX_PAYLOAD_CHARS: usize = 20_000;

fn truncate_payload(payload: Value) -> Value {
    let serialized = payload.to_string();
    if serialized.len() <= MAX_PAYLOAD_CHARS {
        return payload;
    }
    let mut cut = MAX_PAYLOAD_CHARS;
    while !serialized.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}\n...[TRUNCATED]...", &serialized[..cut]))
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// UTC timestamp, RFC 3339.
    pub ts: String,
    /// Pipeline stage or gate name.
    pub name: String,
    pub payload: Value,
}

/// Collects events for one request.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecorder {
    pub trace_id: String,
    pub meta: Value,
    pub events: Vec<TraceEvent>,
}

impl TraceRecorder {
    pub fn new(meta: Value) -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
            meta,
            events: Vec::new(),
        }
    }

    pub fn event(&mut self, name: &str, payload: Value) {
        self.events.push(TraceEvent {
            ts: Utc::now().to_rfc3339(),
            name: name.to_string(),
            payload: truncate_payload(payload),
        });
    }

    /// The full artifact, with the run's final output attached.
    pub fn to_value(&self, final_output: &Value) -> Value {
        json!({
            "trace_id": self.trace_id,
            "meta": self.meta,
            "events": self.events,
            "final_output": truncate_payload(final_output.clone()),
        })
    }

    /// Write the artifact as `trace_<id>.json` under `directory`.
    pub fn write(&self, directory: &Path, final_output: &Value) -> Result<PathBuf> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(format!("trace_{}.json", self.trace_id));
        let artifact = serde_json::to_string_pretty(&self.to_value(final_output))?;
        std::fs::write(&path, artifact)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_recorded_in_order() {
        let mut recorder = TraceRecorder::new(json!({"query": "q"}));
        recorder.event("policy_gate", json!({"outcome": "allowed"}));
        recorder.event("discovery", json!({"providers": 3}));
        assert_eq!(recorder.events.len(), 2);
        assert_eq!(recorder.events[0].name, "policy_gate");
        assert_eq!(recorder.events[1].name, "discovery");
    }

    #[test]
    fn test_large_payload_truncated() {
        let mut recorder = TraceRecorder::new(json!({}));
        recorder.event("execute", json!({"blob": "y".repeat(50_000)}));
        let recorded = &recorder.events[0].payload;
        let as_str = recorded.as_str().unwrap();
        assert!(as_str.len() < 50_000);
        assert!(as_str.ends_with("...[TRUNCATED]..."));
    }

    #[test]
    fn test_write_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = TraceRecorder::new(json!({"query": "fetch sp-001"}));
        recorder.event("done", json!({"outcome": "done"}));

        let path = recorder
            .write(dir.path(), &json!({"outcome": "done"}))
            .unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("trace_"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let artifact: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(artifact["trace_id"], Value::String(recorder.trace_id.clone()));
        assert_eq!(artifact["meta"]["query"], "fetch sp-001");
        assert_eq!(artifact["events"][0]["name"], "done");
        assert_eq!(artifact["final_output"]["outcome"], "done");
    }

    #[test]
    fn test_trace_ids_unique() {
        let a = TraceRecorder::new(json!({}));
        let b = TraceRecorder::new(json!({}));
        assert_ne!(a.trace_id, b.trace_id);
    }
}
