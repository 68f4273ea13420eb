//! Evidence-grounded summarization.
//!
//! A summary is accepted only if every claim carries evidence that is a
//! verbatim, case-sensitive, contiguous substring of the canonical source
//! text derived from the typed payload. One unsupported bullet invalidates
//! the whole summary and the caller falls back to the raw typed payload.

use crate::planner::ChatMessage;
use crate::typed::TypedPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hard cap on the canonical source text fed to the summarizer.
const MAX_SOURCE_CHARS: usize = 8000;

// ============================================================================
// Types
// ============================================================================

/// One claim paired with its verbatim supporting quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBullet {
    pub claim: String,
    pub evidence: String,
}

/// A summary that passed grounding validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundedSummary {
    pub bullets: Vec<SummaryBullet>,
    pub risks: Vec<SummaryBullet>,
    pub recommendations: Vec<SummaryBullet>,
}

// ============================================================================
// Canonical source text
// ============================================================================

/// Deterministic text the summarizer sees and evidence is checked against.
pub fn to_source_text(typed: &TypedPayload) -> String {
    let mut src = match serde_json::to_string_pretty(typed) {
        Ok(s) => s,
        Err(_) => format!("{typed:?}"),
    };
    if src.len() > MAX_SOURCE_CHARS {
        let mut cut = MAX_SOURCE_CHARS;
        while !src.is_char_boundary(cut) {
            cut -= 1;
        }
        src.truncate(cut);
        src.push_str("\n...[TRUNCATED]...");
    }
    src
}

// ============================================================================
// Summarizer prompt
// ============================================================================

const SUMMARIZER_RULES: &str = "\
You are a strictly grounded summarizer.

HARD RULES (must follow):
1) Output ONLY ONE valid JSON object. No markdown, no extra text.
2) You MUST NOT add any facts not present in SOURCE.
3) Every item you output MUST include an 'evidence' string that is an EXACT substring copied from SOURCE.
4) NEVER paraphrase evidence. Evidence must be copied verbatim.
5) If SOURCE does not contain enough information to produce grounded claims, return empty lists.

COPY RULES (important):
- Prefer using evidence copied from fields named like: \"content\" or \"snippet\".
- If SOURCE is JSON, copy evidence from inside string values exactly as shown.

OUTPUT SCHEMA (exact keys):
{
  \"type\": \"summary\",
  \"bullets\": [{\"claim\": \"...\", \"evidence\": \"...\"}],
  \"risks\": [{\"claim\": \"...\", \"evidence\": \"...\"}],
  \"recommendations\": [{\"claim\": \"...\", \"evidence\": \"...\"}]
}

CONSTRAINTS:
- Keep claims short (<= 12 words).
- Limit: bullets <= 5, risks <= 3, recommendations <= 3.
- If SOURCE contains \"NOT_FOUND\" (or empty results), return empty lists.
";

pub fn build_summarizer_messages(source_text: &str) -> Vec<ChatMessage> {
    let user = format!(
        "SOURCE (you may ONLY use this text):\n{source_text}\n\n\
         Task:\n\
         - Produce a grounded summary strictly following the schema.\n\
         - Evidence MUST be copied verbatim from SOURCE (exact substring).\n"
    );
    vec![
        ChatMessage::system(SUMMARIZER_RULES),
        ChatMessage::user(user),
    ]
}

// ============================================================================
// Grounding validation
// ============================================================================

/// Parse the summarizer's raw output and enforce grounding against
/// `source_text`. All-or-nothing: any unsupported item rejects everything.
pub fn validate_grounded_summary(
    raw: &str,
    source_text: &str,
) -> Result<GroundedSummary, String> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| format!("summary is not valid JSON: {e}"))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "summary must be a JSON object".to_string())?;

    if obj.get("type").and_then(Value::as_str) != Some("summary") {
        return Err("summary 'type' must be 'summary'".to_string());
    }

    let mut sections: [(&str, Vec<SummaryBullet>); 3] = [
        ("bullets", Vec::new()),
        ("risks", Vec::new()),
        ("recommendations", Vec::new()),
    ];

    for (name, parsed) in &mut sections {
        let items = obj
            .get(*name)
            .and_then(Value::as_array)
            .ok_or_else(|| format!("'{name}' must be a list"))?;

        for (i, item) in items.iter().enumerate() {
            let entry = item
                .as_object()
                .ok_or_else(|| format!("{name}[{i}] must be an object"))?;
            let claim = entry
                .get("claim")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| format!("{name}[{i}].claim must be a non-empty string"))?;
            let evidence = entry
                .get("evidence")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| format!("{name}[{i}].evidence must be a non-empty string"))?;
            if !source_text.contains(evidence) {
                return Err(format!("{name}[{i}] evidence not found verbatim in source"));
            }
            parsed.push(SummaryBullet {
                claim: claim.to_string(),
                evidence: evidence.to_string(),
            });
        }
    }

    let [(_, bullets), (_, risks), (_, recommendations)] = sections;
    Ok(GroundedSummary {
        bullets,
        risks,
        recommendations,
    })
}
