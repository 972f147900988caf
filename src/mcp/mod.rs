//! Model Context Protocol (MCP) client for the HuskyLens 2 SSE server.
//!
//! The device speaks the HTTP+SSE flavour of MCP: the client opens
//! `GET {base}/sse`, the server announces a per-session submission endpoint
//! (`/message?session_id=<uuid>`) on that stream, and every JSON-RPC
//! response to a POSTed request is pushed back over the same stream.
//!
//! # Components
//!
//! - [`transport`]: HTTP connection pool, event-stream GET and request POSTs
//! - [`listener`]: background task classifying stream lines
//! - [`correlator`]: request ids and one-shot completion slots
//! - [`client`]: session state machine, handshake and `tools/call`
//!
//! # Example
//!
//! ```rust,no_run
//! use huskylens_mcp::mcp::{McpClientConfig, SseMcpClient, ToolInvoker, extract_text};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SseMcpClient::new(McpClientConfig::new("http://192.168.88.1:3000"))?;
//! client.connect().await?;
//! let resp = client
//!     .call_tool("manage_applications", serde_json::json!({"operation": "application_list"}))
//!     .await?;
//! println!("{}", extract_text(&resp));
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod correlator;
pub mod error;
pub mod listener;
pub mod transport;
pub mod types;

pub use client::{McpClientConfig, SessionState, SseMcpClient, ToolInvoker};
pub use error::{McpError, Result};
pub use types::{ContentBlock, ResponseEnvelope, extract_text};
