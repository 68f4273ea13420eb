//! Live tool catalog — per-request discovery across provider sessions.
//!
//! The catalog is rebuilt from a fresh `tools/list` fan-out on every request
//! and is never cached: a provider that changes its surface between requests
//! changes the catalog (and therefore the effective allowlist) on the very
//! next request. Providers that fail or time out during discovery contribute
//! zero tools for that round; the failure is recorded, not fatal.

pub mod allowlist;

use crate::mcp::{ToolDescriptor, ToolTransport};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

pub use allowlist::{AllowlistConfig, AllowlistMode, EffectiveAllowlist};

// =============================================================================
// Catalog
// =============================================================================

/// Snapshot of live tool metadata for one request.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    descriptors: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Look up one tool by `(server, tool)`.
    pub fn get(&self, server: &str, tool: &str) -> Option<&ToolDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.server == server && d.name == tool)
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Discovered `(server, tool)` set, grouped by server.
    pub fn discovered_map(&self) -> HashMap<String, HashSet<String>> {
        let mut map: HashMap<String, HashSet<String>> = HashMap::new();
        for desc in &self.descriptors {
            map.entry(desc.server.clone())
                .or_default()
                .insert(desc.name.clone());
        }
        map
    }

    /// Sorted `{server: [tool, ...]}` view for traces and the CLI.
    pub fn to_pretty(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for desc in &self.descriptors {
            map.entry(desc.server.clone()).or_default().push(desc.name.clone());
        }
        for tools in map.values_mut() {
            tools.sort();
        }
        map
    }

    /// Catalog serialized for the planner prompt:
    /// `{server: [{name, description, inputSchema}, ...]}`.
    pub fn to_planner_json(&self) -> Value {
        let mut map: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for desc in &self.descriptors {
            map.entry(desc.server.clone()).or_default().push(json!({
                "name": desc.name,
                "description": desc.description,
                "inputSchema": desc.input_schema,
            }));
        }
        json!(map)
    }
}

// =============================================================================
// Discovery round
// =============================================================================

/// Result of one discovery fan-out.
#[derive(Debug, Default)]
pub struct DiscoveryRound {
    pub catalog: ToolCatalog,
    /// Providers excluded from this round, with the failure reason.
    pub failures: Vec<(String, String)>,
}

/// Fan out `tools/list` to every session concurrently, fan in with a
/// per-provider bounded wait.
pub async fn discover(
    transports: &HashMap<String, Arc<dyn ToolTransport>>,
    per_provider: Duration,
) -> DiscoveryRound {
    let calls = transports.values().map(|transport| {
        let transport = Arc::clone(transport);
        async move {
            let name = transport.server_name().to_string();
            match tokio::time::timeout(per_provider, transport.list_tools()).await {
                Ok(Ok(tools)) => (name, Ok(tools)),
                Ok(Err(err)) => (name, Err(err.to_string())),
                Err(_) => (name, Err(format!("discovery timed out after {per_provider:?}"))),
            }
        }
    });

    let mut descriptors = Vec::new();
    let mut failures = Vec::new();
    for (server, outcome) in futures::future::join_all(calls).await {
        match outcome {
            Ok(tools) => descriptors.extend(tools),
            Err(reason) => {
                tracing::warn!(server = %server, reason = %reason, "provider excluded from discovery round");
                failures.push((server, reason));
            }
        }
    }

    DiscoveryRound {
        catalog: ToolCatalog::from_descriptors(descriptors),
        failures,
    }
}

// =============================================================================
// Tests
// =============================================================================
