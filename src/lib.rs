//! HuskyLens 2 MCP command line
//!
//! Bridges a HuskyLens 2 vision sensor, exposed as an MCP server over
//! HTTP+SSE, with an LLM that summarizes or answers questions about the
//! sensor's recognition data.
//!
//! # Architecture
//!
//! - **MCP Client**: event-stream listener, request correlation and handshake
//! - **Sensor Requests**: typed wrappers for the device's tools
//! - **Vision**: pluggable reasoning backend (Gemini or disabled)
//! - **REPL**: interactive command loop
//!
//! # Modules
//!
//! - [`mcp`]: SSE MCP client
//! - [`huskylens`]: tool names and arguments
//! - [`vision`]: reasoning adapters and prompt templates
//! - [`repl`]: command parsing and dispatch
//! - [`config`]: layered configuration
//! - [`telemetry`]: logging setup

#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod huskylens;
pub mod mcp;
pub mod repl;
pub mod telemetry;
pub mod vision;
