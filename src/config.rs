//! Layered application configuration.
//!
//! Priority (highest first): CLI flag / its env var > `HUSKY_*` environment >
//! config file > defaults.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::mcp::McpClientConfig;
use crate::vision::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiSettings};

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// HuskyLens MCP server URL (shown in the device's MCP settings)
    #[arg(long, env = "HUSKYLENS_URL")]
    pub server_url: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL")]
    pub gemini_model: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mcp: McpSettings,
    pub gemini: GeminiConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct McpSettings {
    pub request_timeout_secs: u64,
    pub discovery_attempts: u32,
    pub discovery_interval_ms: u64,
    pub protocol_version: String,
}

#[derive(Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.url", "http://127.0.0.1:3000")?
            .set_default("mcp.request_timeout_secs", 15)?
            .set_default("mcp.discovery_attempts", 50)?
            .set_default("mcp.discovery_interval_ms", 100)?
            .set_default("mcp.protocol_version", crate::mcp::client::DEFAULT_PROTOCOL_VERSION)?
            .set_default("gemini.model", DEFAULT_MODEL)?
            .set_default("gemini.base_url", DEFAULT_BASE_URL)?
            .set_default("gemini.timeout_secs", 60)?
            .set_default("log.level", "warn")?;

        // Explicit file must exist; ./huskylens.{toml,yaml,json} is optional.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("huskylens").required(false)),
        };

        // E.g. HUSKY_SERVER__URL=http://192.168.88.1:3000
        builder = builder.add_source(
            Environment::with_prefix("HUSKY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.server_url {
            builder = builder.set_override("server.url", url.as_str())?;
        }
        if let Some(key) = &cli.gemini_api_key {
            builder = builder.set_override("gemini.api_key", key.as_str())?;
        }
        if let Some(model) = &cli.gemini_model {
            builder = builder.set_override("gemini.model", model.as_str())?;
        }
        if let Some(level) = &cli.log_level {
            builder = builder.set_override("log.level", level.as_str())?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn mcp_client_config(&self) -> McpClientConfig {
        let mut cfg = McpClientConfig::new(self.server.url.clone());
        cfg.request_timeout = Duration::from_secs(self.mcp.request_timeout_secs);
        cfg.discovery_attempts = self.mcp.discovery_attempts;
        cfg.discovery_interval = Duration::from_millis(self.mcp.discovery_interval_ms);
        cfg.protocol_version.clone_from(&self.mcp.protocol_version);
        cfg
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            api_key: self
                .gemini
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            model: self.gemini.model.clone(),
            base_url: self.gemini.base_url.clone(),
            timeout: Duration::from_secs(self.gemini.timeout_secs),
        }
    }
}
