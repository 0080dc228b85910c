//! Gemini adapter for text generation and speech synthesis.
//!
//! Talks to the Generative Language REST API (`/v1beta/models/{model}:generateContent`).
//! Text requests carry the fixed system instruction and the chat handle's
//! history; speech requests ask for a single audio part with a prebuilt voice.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sahayak::backend::{GeminiClient, GeminiConfig, GenerateRequest, TextGenerator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GeminiClient::new(GeminiConfig::new("api-key"))?;
//! let reply = client
//!     .generate(GenerateRequest {
//!         system_instruction: "Be gentle.",
//!         history: &[],
//!         prompt: "I feel tired",
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use super::{GenerateRequest, RemoteError, SpeechRequest, SpeechSynthesizer, TextGenerator};
use crate::error::{Result, SahayakError};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default text model.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
/// Default speech model.
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
/// Prefix prepended to text sent for synthesis.
pub const DEFAULT_SPEECH_PREAMBLE: &str = "Say calmly and gently: ";

/// Connection settings for [`GeminiClient`].
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub speech_model: String,
    pub speech_preamble: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("speech_model", &self.speech_model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiConfig {
    /// Create a config with the default models and host.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            text_model: DEFAULT_TEXT_MODEL.to_owned(),
            speech_model: DEFAULT_SPEECH_MODEL.to_owned(),
            speech_preamble: DEFAULT_SPEECH_PREAMBLE.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_speech_model(mut self, model: impl Into<String>) -> Self {
        self.speech_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client implementing both backend traits.
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .finish()
    }
}

impl GeminiClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::Config`] if the API key is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SahayakError::Config("Gemini API key is empty".to_owned()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SahayakError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn model_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:generateContent",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn post(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, RemoteError> {
        let response = self
            .client
            .post(self.model_url(model))
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::new(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| RemoteError::new(format!("Gemini response was not JSON: {e}")))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: GenerateRequest<'_>,
    ) -> std::result::Result<String, RemoteError> {
        let body = build_text_request(request);
        let value = self.post(&self.config.text_model, &body).await?;
        let text = extract_text(&value);
        if text.trim().is_empty() {
            return Err(RemoteError::new("Gemini returned no text"));
        }
        Ok(text)
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(
        &self,
        request: SpeechRequest<'_>,
    ) -> std::result::Result<Option<Vec<u8>>, RemoteError> {
        let body = build_speech_request(&self.config.speech_preamble, request);
        let value = self.post(&self.config.speech_model, &body).await?;
        extract_audio(&value)
    }
}

/// Build the JSON body for a text `generateContent` call.
pub fn build_text_request(request: GenerateRequest<'_>) -> serde_json::Value {
    let mut contents: Vec<serde_json::Value> = request
        .history
        .iter()
        .map(|turn| {
            serde_json::json!({
                "role": turn.role.as_str(),
                "parts": [{ "text": turn.text }],
            })
        })
        .collect();
    contents.push(serde_json::json!({
        "role": "user",
        "parts": [{ "text": request.prompt }],
    }));

    let mut body = serde_json::json!({ "contents": contents });
    if !request.system_instruction.is_empty()
        && let Some(obj) = body.as_object_mut()
    {
        obj.insert(
            "systemInstruction".into(),
            serde_json::json!({ "parts": [{ "text": request.system_instruction }] }),
        );
    }
    body
}

/// Build the JSON body for a speech `generateContent` call.
pub fn build_speech_request(preamble: &str, request: SpeechRequest<'_>) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": format!("{preamble}{}", request.text) }],
        }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": request.voice },
                },
            },
        },
    })
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(value: &serde_json::Value) -> String {
    value
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Decode the inline audio payload of the first candidate, if any.
pub fn extract_audio(
    value: &serde_json::Value,
) -> std::result::Result<Option<Vec<u8>>, RemoteError> {
    let Some(data) = value
        .pointer("/candidates/0/content/parts/0/inlineData/data")
        .and_then(|d| d.as_str())
    else {
        return Ok(None);
    };
    if data.is_empty() {
        return Ok(None);
    }
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map(Some)
        .map_err(|e| RemoteError::new(format!("Gemini audio payload is not base64: {e}")))
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> RemoteError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => RemoteError::new(format!("Gemini authentication failed: {message}")),
        429 => RemoteError::new(format!("Gemini rate limited: {message}")),
        code => RemoteError::new(format!("Gemini HTTP {code}: {message}")),
    }
}

/// Extract an error message from a Google API error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
