//! Operator allowlist — configuration and effective-allowlist computation.
//!
//! Discovery tells us what tools *exist*; the operator allowlist says which
//! of them may be *called*. A tool is callable only when it is both
//! discovered live and present in the configured file. The configured list is
//! loaded once at startup and never mutated; the effective intersection is
//! recomputed from fresh discovery on every request.
//!
//! When the file is missing or invalid, the host degrades to "discovered"
//! mode (effective = discovered) with a logged warning. That is a developer
//! convenience, not the recommended production configuration.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Where the allowlist came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowlistMode {
    /// Operator file loaded; effective = discovered ∩ configured.
    Configured,
    /// No usable operator file; effective = discovered.
    Discovered,
}

/// Operator allowlist as loaded at process start.
#[derive(Debug, Clone)]
pub struct AllowlistConfig {
    configured: Option<HashMap<String, HashSet<String>>>,
    pub mode: AllowlistMode,
    pub warning: Option<String>,
}

impl AllowlistConfig {
    /// Load from a JSON file shaped `{server: [tool, ...]}`.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Self::fallback(format!(
                    "allowlist file not found at '{}'; falling back to discovered tools",
                    path.display()
                ));
            }
            Err(err) => {
                return Self::fallback(format!(
                    "allowlist file '{}' unreadable ({err}); falling back to discovered tools",
                    path.display()
                ));
            }
        };

        let parsed: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(err) => {
                return Self::fallback(format!(
                    "allowlist file '{}' invalid ({err}); falling back to discovered tools",
                    path.display()
                ));
            }
        };
        let Some(obj) = parsed.as_object() else {
            return Self::fallback(format!(
                "allowlist file '{}' must be a JSON object; falling back to discovered tools",
                path.display()
            ));
        };

        let mut configured: HashMap<String, HashSet<String>> = HashMap::new();
        for (server, tools) in obj {
            if server.trim().is_empty() {
                continue;
            }
            let Some(list) = tools.as_array() else {
                continue;
            };
            let set = list
                .iter()
                .filter_map(|t| t.as_str())
                .filter(|t| !t.trim().is_empty())
                .map(ToString::to_string)
                .collect();
            configured.insert(server.clone(), set);
        }

        Self {
            configured: Some(configured),
            mode: AllowlistMode::Configured,
            warning: None,
        }
    }

    fn fallback(warning: String) -> Self {
        Self {
            configured: None,
            mode: AllowlistMode::Discovered,
            warning: Some(warning),
        }
    }

    #[cfg(test)]
    pub fn configured_for_tests(map: HashMap<String, HashSet<String>>) -> Self {
        Self {
            configured: Some(map),
            mode: AllowlistMode::Configured,
            warning: None,
        }
    }

    /// Compute the effective allowlist for one request:
    /// discovered ∩ configured per server, or discovered alone in fallback mode.
    pub fn effective(&self, discovered: &HashMap<String, HashSet<String>>) -> EffectiveAllowlist {
        let pairs = match &self.configured {
            None => discovered.clone(),
            Some(configured) => {
                let mut effective = HashMap::new();
                for (server, discovered_tools) in discovered {
                    let allowed = configured
                        .get(server)
                        .map(|tools| discovered_tools.intersection(tools).cloned().collect())
                        .unwrap_or_default();
                    effective.insert(server.clone(), allowed);
                }
                effective
            }
        };
        EffectiveAllowlist { pairs }
    }
}

/// Per-request set of permitted `(server, tool)` pairs.
#[derive(Debug, Clone, Default)]
pub struct EffectiveAllowlist {
    pairs: HashMap<String, HashSet<String>>,
}

impl EffectiveAllowlist {
    pub fn permits(&self, server: &str, tool: &str) -> bool {
        self.pairs
            .get(server)
            .is_some_and(|tools| tools.contains(tool))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.values().all(HashSet::is_empty)
    }

    /// Sorted JSON-friendly view for traces.
    pub fn to_pretty(&self) -> BTreeMap<String, Vec<String>> {
        self.pairs
            .iter()
            .map(|(server, tools)| {
                let mut sorted: Vec<String> = tools.iter().cloned().collect();
                sorted.sort();
                (server.clone(), sorted)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn discovered(entries: &[(&str, &[&str])]) -> HashMap<String, HashSet<String>> {
        entries
            .iter()
            .map(|(server, tools)| {
                (
                    (*server).to_string(),
                    tools.iter().map(|t| (*t).to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mcp-sharepoint": ["search_sharepoint", "fetch_sharepoint_doc"]}}"#
        )
        .unwrap();

        let config = AllowlistConfig::load(file.path());
        assert_eq!(config.mode, AllowlistMode::Configured);
        assert!(config.warning.is_none());

        let effective = config.effective(&discovered(&[(
            "mcp-sharepoint",
            &["search_sharepoint", "delete_sharepoint_doc"],
        )]));
        assert!(effective.permits("mcp-sharepoint", "search_sharepoint"));
        // Discovered but not configured.
        assert!(!effective.permits("mcp-sharepoint", "delete_sharepoint_doc"));
        // Configured but not discovered this round.
        assert!(!effective.permits("mcp-sharepoint", "fetch_sharepoint_doc"));
    }

    #[test]
    fn test_missing_file_falls_back_to_discovered() {
        let config = AllowlistConfig::load("/nonexistent/allowlist.json");
        assert_eq!(config.mode, AllowlistMode::Discovered);
        assert!(config.warning.is_some());

        let effective = config.effective(&discovered(&[("s", &["t"])]));
        assert!(effective.permits("s", "t"));
    }

    #[test]
    fn test_invalid_json_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let config = AllowlistConfig::load(file.path());
        assert_eq!(config.mode, AllowlistMode::Discovered);
        assert!(config.warning.unwrap().contains("invalid"));
    }

    #[test]
    fn test_server_absent_from_config_gets_nothing() {
        let config = AllowlistConfig::configured_for_tests(
            [("a".to_string(), HashSet::from(["t".to_string()]))].into(),
        );
        let effective = config.effective(&discovered(&[("a", &["t"]), ("b", &["u"])]));
        assert!(effective.permits("a", "t"));
        assert!(!effective.permits("b", "u"));
    }

    #[test]
    fn test_empty_discovery_yields_empty_effective() {
        let config = AllowlistConfig::configured_for_tests(
            [("a".to_string(), HashSet::from(["t".to_string()]))].into(),
        );
        let effective = config.effective(&HashMap::new());
        assert!(effective.is_empty());
        assert!(!effective.permits("a", "t"));
    }

    #[test]
    fn test_pretty_view_sorted() {
        let config = AllowlistConfig::configured_for_tests(
            [(
                "s".to_string(),
                HashSet::from(["b".to_string(), "a".to_string()]),
            )]
            .into(),
        );
        let effective = config.effective(&discovered(&[("s", &["a", "b"])]));
        assert_eq!(effective.to_pretty()["s"], vec!["a", "b"]);
    }
}
