//! HTTP transport session: one streaming GET for events, plain POSTs for
//! requests and notifications.

use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use tracing::debug;

use super::error::{McpError, Result};

/// Owns the HTTP connection pool used by one MCP session.
///
/// The pool only exists between [`HttpTransport::open`] and
/// [`HttpTransport::close`].
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    http: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    /// `base_url` is the server address without a trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn event_stream_url(&self) -> String {
        format!("{}/sse", self.base_url)
    }

    pub fn is_open(&self) -> bool {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Build the connection pool. Opening an already open transport keeps the
    /// existing pool.
    pub fn open(&self) -> Result<()> {
        let mut slot = self.http.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reqwest::Client::builder().build()?);
            debug!(name: "mcp.transport.opened", base_url = %self.base_url, "Transport opened");
        }
        Ok(())
    }

    /// Release the connection pool. Always safe to call.
    pub fn close(&self) {
        let released = self
            .http
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if released {
            debug!(name: "mcp.transport.closed", base_url = %self.base_url, "Transport closed");
        }
    }

    fn client(&self) -> Result<reqwest::Client> {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(McpError::Closed)
    }

    /// Start the `GET {base}/sse` event stream.
    pub async fn open_event_stream(&self) -> Result<reqwest::Response> {
        let resp = self
            .client()?
            .get(self.event_stream_url())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;
        Ok(resp)
    }

    /// POST a JSON body to the submission endpoint and drain the reply body.
    ///
    /// The reply body is only an acknowledgement; real responses arrive on
    /// the event stream.
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        let resp = self
            .client()?
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        let _ack = resp.text().await?;
        Ok(())
    }
}
