//! Typed payload models, one per tool kind.
//!
//! These are the only shapes the host accepts out of `structuredContent`.
//! `deny_unknown_fields` everywhere: a provider adding fields is a schema
//! change that must be reviewed, not silently absorbed.

use serde::{Deserialize, Serialize};

// ---------- SharePoint ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharePointSearchHit {
    pub doc_id: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharePointSearchResult {
    pub query: String,
    #[serde(default)]
    pub results: Vec<SharePointSearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharePointDoc {
    pub doc_id: String,
    pub content: String,
}

// ---------- ServiceNow ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceNowTicketHit {
    pub ticket_id: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceNowSearchResult {
    pub query: String,
    #[serde(default)]
    pub results: Vec<ServiceNowTicketHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceNowTicket {
    pub ticket_id: String,
    pub content: String,
}

// ---------- Policy KB ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyKbSearchHit {
    pub policy_id: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyKbSearchResult {
    pub query: String,
    #[serde(default)]
    pub results: Vec<PolicyKbSearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyKbDoc {
    pub policy_id: String,
    pub content: String,
}

// ---------- Union ----------

/// A validated, typed tool payload. Exists only after the typed output gate
/// accepted the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TypedPayload {
    SharePointSearch(SharePointSearchResult),
    SharePointDoc(SharePointDoc),
    ServiceNowSearch(ServiceNowSearchResult),
    ServiceNowTicket(ServiceNowTicket),
    PolicyKbSearch(PolicyKbSearchResult),
    PolicyKbDoc(PolicyKbDoc),
}

impl TypedPayload {
    /// Tool kind label for traces and notes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SharePointSearch(_) => "sharepoint_search",
            Self::SharePointDoc(_) => "sharepoint_doc",
            Self::ServiceNowSearch(_) => "servicenow_search",
            Self::ServiceNowTicket(_) => "servicenow_ticket",
            Self::PolicyKbSearch(_) => "policy_kb_search",
            Self::PolicyKbDoc(_) => "policy_kb_doc",
        }
    }
}
