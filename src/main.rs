//! HuskyLens 2 MCP command line
//!
//! Entry point: load configuration, connect to the sensor, run the REPL.

use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::{error, info};

use huskylens_mcp::config::AppConfig;
use huskylens_mcp::mcp::SseMcpClient;
use huskylens_mcp::repl::Console;
use huskylens_mcp::{telemetry, vision};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// One foreground task (the REPL) and one background task (the event-stream
// listener) cooperate on a single thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init(&config.log.level);

    info!(
        name: "config.loaded",
        server_url = %config.server.url,
        model = %config.gemini.model,
        "Configuration loaded"
    );

    let analyzer = vision::select_analyzer(&config.gemini_settings())?;
    let client = Arc::new(SseMcpClient::new(config.mcp_client_config())?);

    println!("Connecting to SSE at {}...", config.server.url);
    if let Err(e) = client.connect().await {
        error!(name: "mcp.session.failed", error = %e, "Failed to connect to MCP server");
        client.close().await;
        return Err(e).context("failed to connect to the HuskyLens MCP server");
    }
    println!("Connected to HuskyLens MCP.");

    let tools = Arc::clone(&client);
    let mut console = Console::new(tokio::io::stdin(), std::io::stdout(), tools, analyzer);
    let result = console.run().await;

    println!("Closing connection...");
    client.close().await;
    result.context("console output failed")
}
