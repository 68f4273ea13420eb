//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.
//!
//! Gate halts (policy, parse, allowlist, schema, grounding...) are NOT errors:
//! they are reported outcome variants on the pipeline (`pipeline::AskOutcome`).
//! `Error` covers infrastructure faults only — transport setup, I/O,
//! serialization, protocol violations.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the gatehost runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (bad URLs, missing settings).
    #[error("config error: {0}")]
    Config(String),

    /// Transport errors (HTTP failures, connection loss, SSE stream errors).
    #[error("transport error: {0}")]
    Transport(String),

    /// MCP protocol violations (malformed JSON-RPC, missing endpoint event,
    /// error responses to handshake requests).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Resource not found (unknown server name, unknown tool).
    #[error("not found: {0}")]
    NotFound(String),

    /// Timeout waiting for a response.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
