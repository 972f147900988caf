//! Scene reasoning over sensor data.
//!
//! The reasoning backend is a capability chosen once at startup:
//!
//! - [`GeminiAnalyzer`]: Google Gemini, used when an API key is configured
//! - [`DisabledAnalyzer`]: stand-in that refuses every request
//!
//! # Example
//!
//! ```rust,ignore
//! let analyzer = select_analyzer(&settings)?;
//! let answer = analyzer.analyze(r#"{"faces":[]}"#, Some("Is anyone there?")).await?;
//! ```

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiAnalyzer;

use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use tracing::{info, warn};

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini connection and model settings.
#[derive(Clone)]
pub struct GeminiSettings {
    /// API key; `None` disables reasoning.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Turns raw sensor JSON into natural language.
#[async_trait::async_trait]
pub trait VisionAnalyzer: Send + Sync + std::fmt::Debug {
    /// Describe `sensor_json`, or answer `question` about it.
    async fn analyze(&self, sensor_json: &str, question: Option<&str>) -> anyhow::Result<String>;

    /// Whether this analyzer can actually reach a model.
    fn is_enabled(&self) -> bool;
}

/// Analyzer used when no reasoning backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAnalyzer;

#[async_trait::async_trait]
impl VisionAnalyzer for DisabledAnalyzer {
    async fn analyze(&self, _sensor_json: &str, _question: Option<&str>) -> anyhow::Result<String> {
        Err(anyhow!(
            "Gemini is not configured (set GEMINI_API_KEY to enable scene reasoning)"
        ))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Pick the analyzer for `settings`: Gemini when a non-empty key is present,
/// otherwise [`DisabledAnalyzer`].
pub fn select_analyzer(settings: &GeminiSettings) -> anyhow::Result<Arc<dyn VisionAnalyzer>> {
    match settings.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            info!(name: "vision.backend.selected", model = %settings.model, "Gemini reasoning enabled");
            Ok(Arc::new(GeminiAnalyzer::new(key, settings.clone())?))
        }
        _ => {
            warn!(
                name: "vision.backend.disabled",
                "GEMINI_API_KEY is missing; 'see' and 'ask' are disabled"
            );
            Ok(Arc::new(DisabledAnalyzer))
        }
    }
}
