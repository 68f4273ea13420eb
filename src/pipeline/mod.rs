//! Pipeline orchestrator — the gated single-step state machine.
//!
//! One request moves through a fixed, one-directional sequence:
//! policy gate → fresh discovery → planning → parse gate → validate gate →
//! execute → typed parse → optional summarize. Each gate either advances or
//! halts with a terminal reported outcome; there is no loop back to planning
//! or execution within a request, and at most one tool call is ever issued.
//! Discovery results and the effective allowlist are recomputed per request,
//! never cached across requests.

use crate::catalog::{self, AllowlistConfig, ToolCatalog};
use crate::mcp::{ToolResponse, ToolTransport};
use crate::plan::{self, Plan, Validated, ValidationBlock};
use crate::planner::{self, PlannerClient};
use crate::policy::{Classification, PolicyGate};
use crate::summary::{self, GroundedSummary};
use crate::trace::TraceRecorder;
use crate::typed::{self, TypedPayload};
use crate::types::config::HostConfig;
use crate::types::errors::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const PLANNER_MAX_TOKENS: u32 = 256;
const SUMMARIZER_MAX_TOKENS: u32 = 512;

// ============================================================================
// Stages and outcomes
// ============================================================================

/// Pipeline stages, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    PolicyGate,
    Discovery,
    Planning,
    ParseGate,
    ValidateGate,
    Execute,
    TypedParse,
    Summarize,
    Done,
}

/// Terminal outcome of one request. Every variant is a reported result,
/// not an infrastructure error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AskOutcome {
    /// The query failed the input policy gate. Nothing else ran.
    PolicyBlocked { reason: String },
    /// Planner output was not exactly one well-formed plan object.
    ParseBlocked { reason: String, raw: String },
    /// The planned tool is outside this request's effective allowlist.
    AllowlistBlocked { reason: String, plan: Plan },
    /// The plan violates the tool's input schema or the final-answer rules.
    SchemaBlocked { reason: String, plan: Plan },
    /// The planner needs more information; terminal, no tool call issued.
    NeedsMoreInfo { answer: String },
    /// Transport failure or timeout on the single tool call. Never retried.
    ExecutionError { reason: String, plan: Plan },
    /// The tool itself reported failure (`isError = true`). The raw envelope
    /// is passed through; typed parsing and summarization are skipped.
    ToolError { plan: Plan, raw: Value },
    /// The response transported fine but failed the typed output gate.
    TypedParseBlocked {
        plan: Plan,
        note: String,
        raw: Value,
    },
    /// Summarization was requested but the summary failed grounding; the
    /// verbatim typed payload is the fallback result.
    GroundingBlocked {
        plan: Plan,
        typed: TypedPayload,
        note: String,
    },
    /// Success: raw typed payload, optionally with a grounded summary.
    Done {
        plan: Plan,
        typed: TypedPayload,
        summary: Option<GroundedSummary>,
    },
}

impl AskOutcome {
    /// The stage at which the pipeline terminated.
    pub fn stage(&self) -> Stage {
        match self {
            Self::PolicyBlocked { .. } => Stage::PolicyGate,
            Self::ParseBlocked { .. } => Stage::ParseGate,
            Self::AllowlistBlocked { .. } | Self::SchemaBlocked { .. } => Stage::ValidateGate,
            Self::NeedsMoreInfo { .. } => Stage::ValidateGate,
            Self::ExecutionError { .. } | Self::ToolError { .. } => Stage::Execute,
            Self::TypedParseBlocked { .. } => Stage::TypedParse,
            Self::GroundingBlocked { .. } => Stage::Summarize,
            Self::Done { .. } => Stage::Done,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PolicyBlocked { .. } => "policy_blocked",
            Self::ParseBlocked { .. } => "parse_blocked",
            Self::AllowlistBlocked { .. } => "allowlist_blocked",
            Self::SchemaBlocked { .. } => "schema_blocked",
            Self::NeedsMoreInfo { .. } => "needs_more_info",
            Self::ExecutionError { .. } => "execution_error",
            Self::ToolError { .. } => "tool_error",
            Self::TypedParseBlocked { .. } => "typed_parse_blocked",
            Self::GroundingBlocked { .. } => "grounding_blocked",
            Self::Done { .. } => "done",
        }
    }
}

/// Outcome plus the request's trace artifact location, when persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AskReport {
    #[serde(flatten)]
    pub outcome: AskOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<String>,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    transports: HashMap<String, Arc<dyn ToolTransport>>,
    planner: Arc<dyn PlannerClient>,
    policy: PolicyGate,
    allowlist: AllowlistConfig,
    config: HostConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("servers", &self.transports.keys().collect::<Vec<_>>())
            .field("allowlist_mode", &self.allowlist.mode)
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        transports: HashMap<String, Arc<dyn ToolTransport>>,
        planner: Arc<dyn PlannerClient>,
        policy: PolicyGate,
        allowlist: AllowlistConfig,
        config: HostConfig,
    ) -> Self {
        if let Some(warning) = &allowlist.warning {
            warn!("{warning}");
        }
        Self {
            transports,
            planner,
            policy,
            allowlist,
            config,
        }
    }

    /// Run one full gated request.
    pub async fn ask(&self, query: &str) -> Result<AskReport> {
        let mut trace = TraceRecorder::new(json!({ "query": query }));
        let outcome = self.run_gates(query, &mut trace).await?;
        self.finish(outcome, trace)
    }

    async fn run_gates(&self, query: &str, trace: &mut TraceRecorder) -> Result<AskOutcome> {
        // Policy gate: pure classification before any network activity.
        if let Classification::Blocked { reason } = self.policy.classify(query) {
            trace.event("policy_gate", json!({ "outcome": "blocked", "reason": reason }));
            return Ok(AskOutcome::PolicyBlocked { reason });
        }
        trace.event("policy_gate", json!({ "outcome": "allowed" }));

        // Fresh discovery round; stale availability never drives a decision.
        let round = catalog::discover(&self.transports, self.config.timeouts.discovery).await;
        let catalog = round.catalog;
        trace.event(
            "discovery",
            json!({
                "tools": catalog.to_pretty(),
                "failures": round.failures,
            }),
        );

        let effective = self.allowlist.effective(&catalog.discovered_map());
        trace.event(
            "allowlist",
            json!({
                "mode": self.allowlist.mode,
                "effective": effective.to_pretty(),
            }),
        );
        if catalog.is_empty() {
            warn!("discovery produced an empty catalog; planner has no tools to route to");
        }

        // Planning: the LLM sees only this round's catalog.
        let messages = planner::build_planner_messages(query, &catalog.to_planner_json());
        let raw_plan = self
            .planner
            .chat(&messages, PLANNER_MAX_TOKENS, 0.0)
            .await?;
        trace.event("planning", json!({ "raw": raw_plan }));

        // Parse gate: exactly one well-formed plan object.
        let parsed = match plan::parse_plan(&raw_plan) {
            Ok(parsed) => parsed,
            Err(reason) => {
                trace.event("parse_gate", json!({ "outcome": "blocked", "reason": reason }));
                return Ok(AskOutcome::ParseBlocked {
                    reason,
                    raw: raw_plan,
                });
            }
        };
        trace.event("parse_gate", json!({ "outcome": "ok", "plan": parsed }));

        // Validate gate: allowlist membership, then input schema.
        let validated = match plan::validate_plan(&parsed, &catalog, &effective) {
            Ok(validated) => validated,
            Err(ValidationBlock::Allowlist(reason)) => {
                trace.event(
                    "validate_gate",
                    json!({ "outcome": "allowlist_blocked", "reason": reason }),
                );
                return Ok(AskOutcome::AllowlistBlocked {
                    reason,
                    plan: parsed,
                });
            }
            Err(ValidationBlock::Schema(reason)) => {
                trace.event(
                    "validate_gate",
                    json!({ "outcome": "schema_blocked", "reason": reason }),
                );
                return Ok(AskOutcome::SchemaBlocked {
                    reason,
                    plan: parsed,
                });
            }
        };

        let (server, tool, args) = match validated {
            Validated::NeedsMoreInfo { answer } => {
                trace.event("validate_gate", json!({ "outcome": "needs_more_info" }));
                return Ok(AskOutcome::NeedsMoreInfo { answer });
            }
            Validated::Execute { server, tool, args } => {
                trace.event("validate_gate", json!({ "outcome": "ok" }));
                (server, tool, args)
            }
        };

        // Execute: the single bounded tool call for this request.
        let response = match self.execute(&server, &tool, args).await {
            Ok(response) => response,
            Err(reason) => {
                trace.event("execute", json!({ "outcome": "error", "reason": reason }));
                return Ok(AskOutcome::ExecutionError {
                    reason,
                    plan: parsed,
                });
            }
        };
        let raw_response = serde_json::to_value(&response)?;
        trace.event("execute", json!({ "outcome": "ok", "response": raw_response }));

        if response.is_error {
            // Successfully transported, tool-level failure. Passed through raw.
            return Ok(AskOutcome::ToolError {
                plan: parsed,
                raw: raw_response,
            });
        }

        // Typed output gate.
        let typed = match typed::parse_typed_output(&server, &tool, &response) {
            Ok(typed) => typed,
            Err(block) => {
                trace.event(
                    "typed_parse",
                    json!({ "outcome": "blocked", "reason": block.reason }),
                );
                return Ok(AskOutcome::TypedParseBlocked {
                    plan: parsed,
                    note: block.reason,
                    raw: raw_response,
                });
            }
        };
        trace.event("typed_parse", json!({ "outcome": "ok", "kind": typed.kind() }));

        if !self.wants_summary(query) {
            return Ok(AskOutcome::Done {
                plan: parsed,
                typed,
                summary: None,
            });
        }

        // Summarize, grounding-checked. Failure falls back to the typed
        // payload rather than failing the request.
        match self.summarize(&typed, trace).await {
            Ok(summary) => Ok(AskOutcome::Done {
                plan: parsed,
                typed,
                summary: Some(summary),
            }),
            Err(note) => Ok(AskOutcome::GroundingBlocked {
                plan: parsed,
                typed,
                note,
            }),
        }
    }

    async fn execute(
        &self,
        server: &str,
        tool: &str,
        args: Map<String, Value>,
    ) -> std::result::Result<ToolResponse, String> {
        let transport = self
            .transports
            .get(server)
            .ok_or_else(|| format!("no session for server '{server}'"))?;

        let deadline = self.config.timeouts.tool_call;
        let args = Value::Object(args);
        let call = transport.call_tool(tool, &args);
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(format!("tool call timed out after {deadline:?}")),
        }
    }

    fn wants_summary(&self, query: &str) -> bool {
        self.config.gates.summarize || query.to_lowercase().contains("summarize")
    }

    async fn summarize(
        &self,
        typed: &TypedPayload,
        trace: &mut TraceRecorder,
    ) -> std::result::Result<GroundedSummary, String> {
        let source = summary::to_source_text(typed);
        let messages = summary::build_summarizer_messages(&source);
        let raw = match self.planner.chat(&messages, SUMMARIZER_MAX_TOKENS, 0.0).await {
            Ok(raw) => raw,
            Err(err) => {
                // Endpoint outage, not an ungrounded summary. Same fallback,
                // but an operator needs to tell the two apart.
                warn!(error = %err, "summarizer endpoint unreachable, returning typed payload");
                trace.event(
                    "summarize",
                    json!({ "outcome": "unavailable", "error": err.to_string() }),
                );
                return Err(format!("summarizer unavailable: {err}"));
            }
        };
        trace.event("summarize", json!({ "raw": raw }));

        match summary::validate_grounded_summary(&raw, &source) {
            Ok(grounded) => {
                trace.event("summarize", json!({ "outcome": "grounded" }));
                Ok(grounded)
            }
            Err(reason) => {
                trace.event("summarize", json!({ "outcome": "blocked", "reason": reason }));
                Err(reason)
            }
        }
    }

    fn finish(&self, outcome: AskOutcome, mut trace: TraceRecorder) -> Result<AskReport> {
        trace.event("done", json!({ "outcome": outcome.label(), "stage": outcome.stage() }));
        info!(outcome = outcome.label(), trace_id = %trace.trace_id, "request finished");

        let mut report = AskReport {
            outcome,
            trace_id: None,
            trace_path: None,
        };
        if let Some(dir) = &self.config.gates.trace_dir {
            let final_output = serde_json::to_value(&report)?;
            let path = trace.write(std::path::Path::new(dir), &final_output)?;
            report.trace_id = Some(trace.trace_id.clone());
            report.trace_path = Some(path.display().to_string());
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Direct surfaces (CLI)
    // ------------------------------------------------------------------

    /// Discover and report the live catalog and this round's effective
    /// allowlist. Read-only; no tool is called.
    pub async fn list(&self) -> Result<Value> {
        let round = catalog::discover(&self.transports, self.config.timeouts.discovery).await;
        let effective = self.allowlist.effective(&round.catalog.discovered_map());
        Ok(json!({
            "tools": round.catalog.to_pretty(),
            "effective_allowlist": effective.to_pretty(),
            "allowlist_mode": self.allowlist.mode,
            "failures": round.failures,
        }))
    }

    /// Call one tool directly, still behind the allowlist and schema gates.
    /// The planner is bypassed; nothing else is.
    pub async fn call_direct(
        &self,
        server: &str,
        tool: &str,
        args: Map<String, Value>,
    ) -> Result<Value> {
        let round = catalog::discover(&self.transports, self.config.timeouts.discovery).await;
        let catalog: &ToolCatalog = &round.catalog;
        let effective = self.allowlist.effective(&catalog.discovered_map());

        let plan = Plan::CallTool {
            server: server.to_string(),
            tool: tool.to_string(),
            args,
        };
        let validated = match plan::validate_plan(&plan, catalog, &effective) {
            Ok(v) => v,
            Err(block) => {
                return Ok(json!({
                    "outcome": match block {
                        ValidationBlock::Allowlist(_) => "allowlist_blocked",
                        ValidationBlock::Schema(_) => "schema_blocked",
                    },
                    "reason": block.reason(),
                }));
            }
        };
        let Validated::Execute { server, tool, args } = validated else {
            return Ok(json!({ "outcome": "schema_blocked", "reason": "not a tool call" }));
        };

        let response = match self.execute(&server, &tool, args).await {
            Ok(response) => response,
            Err(reason) => {
                return Ok(json!({ "outcome": "execution_error", "reason": reason }));
            }
        };
        let raw = serde_json::to_value(&response)?;

        let typed = typed::parse_typed_output(&server, &tool, &response);
        Ok(match typed {
            Ok(typed) => json!({ "outcome": "done", "typed": typed, "raw": raw }),
            Err(block) => json!({
                "outcome": "typed_parse_blocked",
                "note": block.reason,
                "raw": raw,
            }),
        })
    }
}
