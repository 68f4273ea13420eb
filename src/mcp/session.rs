//! One MCP client session connected to exactly one provider via SSE.
//!
//! Lifecycle: open the event stream, wait for the provider-assigned
//! `endpoint` event carrying the private messages URL, then perform the
//! initialization handshake (`initialize` request + `notifications/initialized`
//! notification). Only after that are `tools/list` and `tools/call` issued.
//!
//! Responses arrive on the SSE stream, not on the POST: a background reader
//! task parses events and completes the matching pending request by JSON-RPC
//! id. The POST itself typically returns 202 Accepted.

use crate::mcp::sse::SseParser;
use crate::mcp::{ToolDescriptor, ToolResponse, ToolTransport};
use crate::types::{Error, Result, TimeoutConfig};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Timeout for the POST half of a request. The response itself arrives on
/// the SSE stream under the caller's wait budget.
const POST_TIMEOUT: Duration = Duration::from_secs(10);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// A single MCP client session.
pub struct McpSession {
    name: String,
    http: Client,
    messages_url: Url,
    pending: PendingMap,
    next_id: AtomicU64,
    timeouts: TimeoutConfig,
    cancel: CancellationToken,
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("name", &self.name)
            .field("messages_url", &self.messages_url.as_str())
            .finish()
    }
}

impl McpSession {
    /// Open the stream, resolve the messages endpoint, and handshake.
    pub async fn connect(name: &str, sse_url: &str, timeouts: &TimeoutConfig) -> Result<Self> {
        // No client-wide timeout: the SSE stream stays open for the session
        // lifetime. POSTs carry per-request timeouts instead.
        let http = Client::builder().build()?;

        let base = Url::parse(sse_url)
            .map_err(|e| Error::config(format!("[{name}] invalid SSE url '{sse_url}': {e}")))?;

        let resp = http
            .get(base.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::transport(format!(
                "[{name}] SSE connect failed: {}",
                resp.status()
            )));
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_reader(
            name.to_string(),
            resp,
            base,
            pending.clone(),
            endpoint_tx,
            cancel.clone(),
        ));

        let messages_url = tokio::time::timeout(timeouts.connect, endpoint_rx)
            .await
            .map_err(|_| {
                Error::timeout(format!("[{name}] no endpoint event from {sse_url}"))
            })?
            .map_err(|_| {
                Error::protocol(format!("[{name}] stream closed before endpoint event"))
            })??;

        tracing::debug!(session = name, endpoint = %messages_url, "resolved messages endpoint");

        let session = Self {
            name: name.to_string(),
            http,
            messages_url,
            pending,
            next_id: AtomicU64::new(1),
            timeouts: timeouts.clone(),
            cancel,
        };

        session.initialize().await?;
        Ok(session)
    }

    /// Stop the reader task. Pending requests fail with a closed channel.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    // ---------- JSON-RPC ----------

    fn pending_insert(&self, id: u64, tx: oneshot::Sender<Value>) -> Result<()> {
        self.pending
            .lock()
            .map_err(|_| Error::internal(format!("[{}] pending map poisoned", self.name)))?
            .insert(id, tx);
        Ok(())
    }

    fn pending_remove(&self, id: u64) {
        if let Ok(mut map) = self.pending.lock() {
            map.remove(&id);
        }
    }

    /// Issue a request and wait for the correlated response on the stream.
    async fn rpc(&self, method: &str, params: Value, wait: Duration) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending_insert(id, tx)?;

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let posted = self
            .http
            .post(self.messages_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(POST_TIMEOUT)
            .json(&payload)
            .send()
            .await;

        let resp = match posted {
            Ok(resp) => resp,
            Err(err) => {
                self.pending_remove(id);
                return Err(err.into());
            }
        };
        if !resp.status().is_success() {
            self.pending_remove(id);
            return Err(Error::transport(format!(
                "[{}] POST {method} failed: {}",
                self.name,
                resp.status()
            )));
        }

        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(msg)) => Ok(msg),
            Ok(Err(_)) => {
                self.pending_remove(id);
                Err(Error::transport(format!(
                    "[{}] stream closed waiting for {method} response",
                    self.name
                )))
            }
            Err(_) => {
                self.pending_remove(id);
                Err(Error::timeout(format!(
                    "[{}] no response to {method} (id={id}) within {:?}",
                    self.name, wait
                )))
            }
        }
    }

    /// Issue a notification (no id, no response expected).
    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(self.messages_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(POST_TIMEOUT)
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::transport(format!(
                "[{}] POST notify {method} failed: {}",
                self.name,
                resp.status()
            )));
        }
        Ok(())
    }

    // ---------- Handshake ----------

    async fn initialize(&self) -> Result<()> {
        let msg = self
            .rpc(
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}, "resources": {}, "prompts": {}},
                    "clientInfo": {
                        "name": "gatehost",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
                self.timeouts.connect,
            )
            .await?;

        expect_result(&self.name, "initialize", msg)?;
        self.notify("notifications/initialized", json!({})).await
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl ToolTransport for McpSession {
    fn server_name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let msg = self
            .rpc("tools/list", json!({}), self.timeouts.discovery)
            .await?;
        let result = expect_result(&self.name, "tools/list", msg)?;

        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::protocol(format!("[{}] tools/list result missing 'tools'", self.name))
            })?;

        let mut descriptors = Vec::with_capacity(tools.len());
        for tool in tools {
            let mut desc: ToolDescriptor = serde_json::from_value(tool.clone())?;
            desc.server = self.name.clone();
            descriptors.push(desc);
        }
        Ok(descriptors)
    }

    async fn call_tool(&self, tool: &str, args: &Value) -> Result<ToolResponse> {
        let msg = self
            .rpc(
                "tools/call",
                json!({"name": tool, "arguments": args}),
                self.timeouts.tool_call,
            )
            .await?;
        let result = expect_result(&self.name, "tools/call", msg)?;
        Ok(serde_json::from_value(result)?)
    }
}

// =============================================================================
// Reader task
// =============================================================================

async fn run_reader(
    name: String,
    resp: reqwest::Response,
    base: Url,
    pending: PendingMap,
    endpoint_tx: oneshot::Sender<Result<Url>>,
    cancel: CancellationToken,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut parser = SseParser::new();
    let mut stream = resp.bytes_stream();

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return,
            chunk = stream.next() => chunk,
        };

        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => {
                tracing::warn!(session = %name, error = %err, "SSE stream error");
                return;
            }
            None => {
                tracing::debug!(session = %name, "SSE stream ended");
                return;
            }
        };

        for event in parser.push(&bytes) {
            match event.event.as_str() {
                "endpoint" => {
                    if let Some(tx) = endpoint_tx.take() {
                        let resolved = base.join(event.data.trim()).map_err(|e| {
                            Error::protocol(format!("[{name}] bad endpoint '{}': {e}", event.data))
                        });
                        let _ = tx.send(resolved);
                    }
                }
                "message" => route_message(&name, &pending, &event.data),
                other => {
                    tracing::trace!(session = %name, event = other, "ignoring SSE event");
                }
            }
        }
    }
}

/// Complete the pending request matching the message id, if any.
fn route_message(name: &str, pending: &PendingMap, data: &str) {
    let Ok(msg) = serde_json::from_str::<Value>(data) else {
        tracing::trace!(session = name, "dropping non-JSON SSE message");
        return;
    };
    let Some(id) = msg.get("id").and_then(Value::as_u64) else {
        return;
    };
    let sender = match pending.lock() {
        Ok(mut map) => map.remove(&id),
        Err(_) => None,
    };
    if let Some(tx) = sender {
        let _ = tx.send(msg);
    }
}

/// Reject JSON-RPC error responses and unwrap `result`.
fn expect_result(name: &str, method: &str, msg: Value) -> Result<Value> {
    if let Some(err) = msg.get("error") {
        return Err(Error::protocol(format!("[{name}] {method} failed: {err}")));
    }
    msg.get("result")
        .cloned()
        .ok_or_else(|| Error::protocol(format!("[{name}] {method} response missing 'result'")))
}
