//! Google Gemini `generateContent` driver.
//!
//! One blocking (non-streaming) request per analysis.

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::debug;

use super::{GeminiSettings, VisionAnalyzer, prompt};

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Reasoning adapter backed by the Gemini REST API.
#[derive(Clone)]
pub struct GeminiAnalyzer {
    http: reqwest::Client,
    api_key: String,
    settings: GeminiSettings,
}

// Keep the key out of logs.
impl std::fmt::Debug for GeminiAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiAnalyzer")
            .field("model", &self.settings.model)
            .field("base_url", &self.settings.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiAnalyzer {
    pub fn new(api_key: impl Into<String>, settings: GeminiSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            settings,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    async fn generate(&self, prompt: String) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            return Err(anyhow!("Gemini returned {status}: {message}"));
        }

        let parsed: GenerateContentResponse =
            resp.json().await.context("invalid Gemini response body")?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("Gemini returned no candidates"))?;

        debug!(name: "vision.gemini.answered", model = %self.settings.model, chars = text.len(), "Gemini answered");
        Ok(text)
    }
}

#[async_trait::async_trait]
impl VisionAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, sensor_json: &str, question: Option<&str>) -> anyhow::Result<String> {
        self.generate(prompt::build_prompt(sensor_json, question))
            .await
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
