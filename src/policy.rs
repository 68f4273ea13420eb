//! Input policy gate.
//!
//! Classifies raw user input before any discovery or network activity. Rules
//! are data: an ordered list of compiled patterns with labels, evaluated
//! first-match. Classification is a pure function of the input text — no
//! clock, no randomness, no external lookups.

use regex::Regex;

/// Classification result for one user query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Allowed,
    Blocked { reason: String },
}

impl Classification {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// One policy rule: pattern → block with label.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub label: String,
    pattern: Regex,
}

impl PolicyRule {
    pub fn new(label: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            label: label.to_string(),
            pattern: Regex::new(pattern)?,
        })
    }
}

/// Ordered rule set evaluated against lowercased input.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    rules: Vec<PolicyRule>,
}

impl PolicyGate {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// The default deny rules. Intentionally strict.
    pub fn with_default_rules() -> Self {
        let specs: &[(&str, &str)] = &[
            (
                "offensive-security",
                r"\b(hack|exploit|malware|ransomware|phishing)\b",
            ),
            ("weapons", r"\b(build a bomb|explosive|detonator)\b"),
            ("self-harm", r"\b(suicide|self-harm|kill myself)\b"),
            (
                "credential-theft",
                r"\b(credit card dump|steal password|credential)\b",
            ),
            (
                "instruction-override",
                r"\b(ignore (all |the )?(rules|instructions|policies))\b",
            ),
        ];

        let rules = specs
            .iter()
            .filter_map(|(label, pattern)| PolicyRule::new(label, pattern).ok())
            .collect();
        Self::new(rules)
    }

    /// Classify a user query. First matching rule blocks; no match allows.
    pub fn classify(&self, query: &str) -> Classification {
        let text = query.to_lowercase();
        for rule in &self.rules {
            if rule.pattern.is_match(&text) {
                return Classification::Blocked {
                    reason: format!("blocked by policy rule '{}'", rule.label),
                };
            }
        }
        Classification::Allowed
    }
}
