//! gatehost CLI.
//!
//! Three surfaces over the same gated pipeline:
//! - `list` — discover live tools and show the effective allowlist
//! - `call` — invoke one tool directly (allowlist and schema gates still apply)
//! - `ask`  — run a natural-language query through the full pipeline

use clap::{Parser, Subcommand};
use gatehost::catalog::AllowlistConfig;
use gatehost::mcp::{McpSession, ToolTransport};
use gatehost::observability::init_tracing;
use gatehost::planner::LlmClient;
use gatehost::policy::PolicyGate;
use gatehost::{Error, HostConfig, Pipeline, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "gatehost", version, about = "Governed single-step MCP tool host")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover tools across configured providers and show what is callable.
    List,
    /// Call one tool directly with JSON arguments.
    Call {
        server: String,
        tool: String,
        /// Tool arguments as a JSON object, e.g. '{"query": "pii"}'.
        args: String,
    },
    /// Run a query through the full gated pipeline.
    Ask {
        query: String,
        /// Summarize the typed result even if the query does not ask for it.
        #[arg(long)]
        summarize: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = HostConfig::from_env();
    init_tracing(config.log_format);

    if let Command::Ask { summarize: true, .. } = &cli.command {
        config.gates.summarize = true;
    }

    let pipeline = build_pipeline(config).await?;

    let output = match cli.command {
        Command::List => pipeline.list().await?,
        Command::Call { server, tool, args } => {
            let parsed: serde_json::Value = serde_json::from_str(&args)
                .map_err(|e| Error::config(format!("args is not valid JSON: {e}")))?;
            let args = parsed
                .as_object()
                .cloned()
                .ok_or_else(|| Error::config("args must be a JSON object"))?;
            pipeline.call_direct(&server, &tool, args).await?
        }
        Command::Ask { query, .. } => {
            let report = pipeline.ask(&query).await?;
            serde_json::to_value(&report)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Connect provider sessions and assemble the pipeline. A provider that is
/// down at startup is skipped with a warning; discovery excludes it per
/// request until it comes back.
async fn build_pipeline(config: HostConfig) -> Result<Pipeline> {
    let mut transports: HashMap<String, Arc<dyn ToolTransport>> = HashMap::new();
    for (name, url) in &config.servers {
        match McpSession::connect(name, url, &config.timeouts).await {
            Ok(session) => {
                info!(server = %name, url = %url, "session connected");
                transports.insert(name.clone(), Arc::new(session));
            }
            Err(err) => {
                warn!(server = %name, url = %url, error = %err, "session unavailable, skipping");
            }
        }
    }

    let planner = Arc::new(LlmClient::new(config.llm.clone(), config.timeouts.llm)?);
    let allowlist = AllowlistConfig::load(&config.gates.allowlist_path);

    Ok(Pipeline::new(
        transports,
        planner,
        PolicyGate::with_default_rules(),
        allowlist,
        config,
    ))
}
