//! Configuration types for the conversation pipeline.

use crate::backend::SYSTEM_INSTRUCTION;
use crate::backend::gemini::{
    DEFAULT_BASE_URL, DEFAULT_SPEECH_MODEL, DEFAULT_SPEECH_PREAMBLE, DEFAULT_TEXT_MODEL,
    GeminiConfig,
};
use crate::error::{Result, SahayakError};
use crate::phrases::PhraseBook;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SahayakConfig {
    /// Optional path to a replacement phrase book (TOML).
    pub phrase_book: Option<PathBuf>,
    /// Generative text and speech backend settings.
    pub backend: BackendConfig,
    /// Speech output settings.
    pub audio: AudioConfig,
}

/// Backend connection configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API host, without the `/v1beta` suffix.
    pub api_url: String,
    /// Inline API key. Prefer `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model used for text replies.
    pub text_model: String,
    /// Model used for speech synthesis.
    pub speech_model: String,
    /// Prebuilt voice name.
    pub voice: String,
    /// Persona constraint sent with every text request.
    pub system_instruction: String,
    /// Prefix prepended to text sent for synthesis.
    pub speech_preamble: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("text_model", &self.text_model)
            .field("speech_model", &self.speech_model)
            .field("voice", &self.voice)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            api_key_env: "API_KEY".to_owned(),
            text_model: DEFAULT_TEXT_MODEL.to_owned(),
            speech_model: DEFAULT_SPEECH_MODEL.to_owned(),
            voice: "Kore".to_owned(),
            system_instruction: SYSTEM_INSTRUCTION.to_owned(),
            speech_preamble: DEFAULT_SPEECH_PREAMBLE.to_owned(),
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Resolve the API key: inline value first, then the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref()
            && !key.trim().is_empty()
        {
            return Ok(key.to_owned());
        }
        let value = std::env::var(&self.api_key_env).map_err(|_| {
            SahayakError::Config(format!(
                "API key env var is not set: {}",
                self.api_key_env
            ))
        })?;
        if value.trim().is_empty() {
            return Err(SahayakError::Config(format!(
                "API key env var is empty: {}",
                self.api_key_env
            )));
        }
        Ok(value)
    }

    /// Build the Gemini client settings, resolving the API key.
    pub fn gemini_config(&self) -> Result<GeminiConfig> {
        let mut config = GeminiConfig::new(self.resolve_api_key()?)
            .with_base_url(self.api_url.clone())
            .with_text_model(self.text_model.clone())
            .with_speech_model(self.speech_model.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_secs.max(1)));
        config.speech_preamble = self.speech_preamble.clone();
        Ok(config)
    }
}

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Whether replies are synthesized at all.
    pub speech_enabled: bool,
    /// Sample rate of the raw PCM the speech backend returns.
    pub sample_rate: u32,
    /// Directory where reply clips are written (None = discard).
    pub output_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            speech_enabled: true,
            sample_rate: 24_000,
            output_dir: None,
        }
    }
}

impl SahayakConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SahayakError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SahayakError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the configured phrase book, or the built-in one.
    pub fn load_phrase_book(&self) -> Result<PhraseBook> {
        match &self.phrase_book {
            Some(path) => PhraseBook::from_file(path),
            None => Ok(PhraseBook::default()),
        }
    }

    /// Returns the default config file path: `~/.config/sahayak/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("sahayak").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("sahayak")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/sahayak-config/config.toml")
        }
    }
}
