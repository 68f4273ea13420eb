//! gatehost — a governed single-step tool-execution host for LLM planners.
//!
//! One user request becomes at most one tool call, and only after passing a
//! fixed sequence of gates: input policy, live per-request discovery, strict
//! plan parsing, allowlist and input-schema validation. The tool's output is
//! then parsed against a typed registry, and any summary of it must quote its
//! evidence verbatim from the validated payload.
//!
//! Module map:
//! - [`types`] — configuration and the error type
//! - [`observability`] — tracing setup
//! - [`policy`] — input policy gate
//! - [`mcp`] — SSE transport sessions and the wire envelope
//! - [`catalog`] — per-request discovery and the operator allowlist
//! - [`schema`] — explicit object schemas and stateless validation
//! - [`plan`] — planner output parsing and validation
//! - [`planner`] — LLM client and prompt construction
//! - [`typed`] — typed output gate and payload models
//! - [`summary`] — evidence-grounded summarization
//! - [`trace`] — per-request audit artifacts
//! - [`pipeline`] — the orchestrating state machine

pub mod catalog;
pub mod mcp;
pub mod observability;
pub mod pipeline;
pub mod plan;
pub mod planner;
pub mod policy;
pub mod schema;
pub mod summary;
pub mod trace;
pub mod typed;
pub mod types;

pub use pipeline::{AskOutcome, AskReport, Pipeline, Stage};
pub use types::{Error, HostConfig, Result};
