//! MCP client over the legacy HTTP+SSE transport.
//!
//! The server pushes every response on a single event stream while the
//! client POSTs requests to a per-session endpoint announced on that stream.
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──endpoint──▶ Handshaking ──initialize──▶ Ready
//!       │                         │                        │                        │
//!       └────────────────────────close()──────────────────────────────────────────▶ Closed
//! ```

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::correlator::Correlator;
use super::error::{McpError, Result};
use super::listener::{self, EndpointSlot, FrameRouter};
use super::transport::HttpTransport;
use super::types::{
    CallToolParams, ClientInfo, InitializeParams, JsonRpcNotification, JsonRpcRequest,
    ResponseEnvelope,
};

/// Protocol revision spoken by HuskyLens firmware.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Lifecycle of an [`SseMcpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Listener running, endpoint not yet announced.
    Connecting,
    /// Endpoint known, `initialize` in flight.
    Handshaking,
    /// Accepts tool calls.
    Ready,
    Closed,
}

/// Connection settings for an [`SseMcpClient`].
#[derive(Debug, Clone)]
pub struct McpClientConfig {
    /// Server base URL, e.g. `http://192.168.88.1:3000`.
    pub server_url: String,
    /// How long a call waits for its response.
    pub request_timeout: Duration,
    /// Number of polls for the session endpoint.
    pub discovery_attempts: u32,
    /// Delay between endpoint polls.
    pub discovery_interval: Duration,
    pub protocol_version: String,
    pub client_info: ClientInfo,
}

impl McpClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            request_timeout: Duration::from_secs(15),
            discovery_attempts: 50,
            discovery_interval: Duration::from_millis(100),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_info: ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// Anything that can invoke a named remote tool.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invoke `name` with `arguments`.
    ///
    /// Transport failures and timeouts come back as an error-shaped
    /// [`ResponseEnvelope`]; `Err` is reserved for calls that were never sent.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ResponseEnvelope>;
}

/// MCP client session bound to one server.
#[derive(Debug)]
pub struct SseMcpClient {
    config: McpClientConfig,
    transport: Arc<HttpTransport>,
    correlator: Arc<Correlator>,
    endpoint: Arc<EndpointSlot>,
    state: Mutex<SessionState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SseMcpClient {
    pub fn new(config: McpClientConfig) -> Result<Self> {
        // Fail early on garbage instead of on the first request.
        url::Url::parse(&config.server_url)?;
        let transport = Arc::new(HttpTransport::new(config.server_url.clone()));
        Ok(Self {
            config,
            transport,
            correlator: Arc::new(Correlator::new()),
            endpoint: Arc::new(EndpointSlot::new()),
            state: Mutex::new(SessionState::Disconnected),
            listener: Mutex::new(None),
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Absolute submission endpoint, once announced.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint.get()
    }

    pub fn config(&self) -> &McpClientConfig {
        &self.config
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let prev = *state;
        if prev != SessionState::Closed {
            debug!(name: "mcp.session.state", from = ?prev, to = ?next, "Session state change");
            *state = next;
        }
    }

    fn stop_listener(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Undo a failed connect attempt so the next one starts from scratch.
    fn abandon_attempt(&self) {
        self.stop_listener();
        self.correlator.clear();
        self.endpoint.reset();
        self.transport.close();
        self.set_state(SessionState::Disconnected);
    }

    /// Open the event stream, wait for the session endpoint and run the
    /// `initialize` handshake.
    ///
    /// A failed attempt leaves the client `Disconnected`, ready to retry.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                SessionState::Disconnected => *state = SessionState::Connecting,
                SessionState::Closed => return Err(McpError::Closed),
                _ => return Err(McpError::AlreadyConnected),
            }
        }

        info!(name: "mcp.session.connecting", url = %self.config.server_url, "Connecting to SSE");

        self.endpoint.reset();
        if let Err(e) = self.transport.open() {
            self.abandon_attempt();
            return Err(e);
        }

        let router = FrameRouter::new(
            self.transport.base_url(),
            Arc::clone(&self.endpoint),
            Arc::clone(&self.correlator),
        );
        let handle = tokio::spawn(listener::run(Arc::clone(&self.transport), router));
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        if let Err(e) = self.await_endpoint().await {
            self.abandon_attempt();
            return Err(e);
        }

        self.set_state(SessionState::Handshaking);
        if let Err(e) = self.initialize().await {
            warn!(name: "mcp.session.handshake_failed", error = %e, "Handshake failed");
            self.abandon_attempt();
            return Err(e);
        }

        self.set_state(SessionState::Ready);
        if self.state() == SessionState::Closed {
            return Err(McpError::Closed);
        }
        info!(
            name: "mcp.session.ready",
            endpoint = %self.endpoint().unwrap_or_default(),
            "MCP session ready"
        );
        Ok(())
    }

    async fn await_endpoint(&self) -> Result<()> {
        let attempts = self.config.discovery_attempts;
        for _ in 0..attempts {
            if self.endpoint.get().is_some() {
                return Ok(());
            }
            if self.state() == SessionState::Closed {
                return Err(McpError::Closed);
            }
            tokio::time::sleep(self.config.discovery_interval).await;
        }
        if self.endpoint.get().is_some() {
            Ok(())
        } else {
            Err(McpError::EndpointDiscovery { attempts })
        }
    }

    async fn initialize(&self) -> Result<()> {
        let params = InitializeParams {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: json!({}),
            client_info: self.config.client_info.clone(),
        };
        let resp = self
            .request("initialize", serde_json::to_value(params)?)
            .await
            .map_err(|e| McpError::Handshake(e.to_string()))?;
        if let Some(msg) = resp.error_message() {
            return Err(McpError::Handshake(msg));
        }

        self.notify("notifications/initialized", json!({})).await
    }

    /// Send a request and wait for its correlated response.
    async fn request(&self, method: &str, params: Value) -> Result<ResponseEnvelope> {
        let endpoint = self.endpoint.get().ok_or(McpError::NotConnected)?;

        let (id, rx) = self.correlator.register();
        let _pending = self.correlator.guard(id);
        let body = JsonRpcRequest::new(id, method, params);
        debug!(name: "mcp.request.sent", id, method, "Sending request");

        self.transport.post_json(&endpoint, &body).await?;
        self.correlator
            .wait(id, rx, self.config.request_timeout)
            .await
    }

    /// Fire-and-forget notification.
    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let endpoint = self.endpoint.get().ok_or(McpError::NotConnected)?;
        let body = JsonRpcNotification::new(method, params);
        self.transport.post_json(&endpoint, &body).await
    }

    /// Stop the listener and release the transport. Safe to call repeatedly
    /// and before `connect()`.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != SessionState::Closed {
                info!(name: "mcp.session.closed", "Closing MCP session");
            }
            *state = SessionState::Closed;
        }
        self.stop_listener();
        self.correlator.clear();
        self.transport.close();
    }

    /// Whether the background listener task is still alive.
    pub fn listener_running(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

#[async_trait]
impl ToolInvoker for SseMcpClient {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ResponseEnvelope> {
        match self.state() {
            SessionState::Ready => {}
            SessionState::Closed => return Err(McpError::Closed),
            _ => return Err(McpError::NotConnected),
        }

        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;

        match self.request("tools/call", params).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                warn!(name: "mcp.tool.failed", tool = name, error = %e, "Tool call failed");
                Ok(ResponseEnvelope::failure(e.to_string()))
            }
        }
    }
}

impl Drop for SseMcpClient {
    fn drop(&mut self) {
        self.stop_listener();
    }
}
