//! Configuration module: built-in defaults, an optional TOML file, then the environment.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PodcastError;

pub const LLM_API_KEY_VAR: &str = "GROQ_API_KEY";
pub const LLM_API_KEY_FALLBACK_VAR: &str = "OPENAI_API_KEY";
pub const TTS_API_KEY_VAR: &str = "DEEPGRAM_API_KEY";
pub const LLM_API_BASE_VAR: &str = "PODCASTAI_LLM_API_BASE";
pub const LLM_MODEL_VAR: &str = "PODCASTAI_LLM_MODEL";
pub const TTS_API_BASE_VAR: &str = "PODCASTAI_TTS_API_BASE";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub voices: VoicesConfig,
    pub output: OutputConfig,
    pub pdf: PdfConfig,
}

/// Chat-completion endpoint used to draft scripts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            api_key: String::new(),
            model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.4,
            timeout_secs: None,
        }
    }
}

/// Hosted text-to-speech endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub api_base: String,
    pub api_key: String,
    pub encoding: String,
    pub container: String,
    pub timeout_secs: Option<u64>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.deepgram.com/v1".to_string(),
            api_key: String::new(),
            encoding: "linear16".to_string(),
            container: "wav".to_string(),
            timeout_secs: None,
        }
    }
}

/// Voice pools, one per gender category.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    pub male: Vec<String>,
    pub female: Vec<String>,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            male: vec![
                "aura-orpheus-en".to_string(),
                "aura-angus-en".to_string(),
                "aura-arcas-en".to_string(),
            ],
            female: vec![
                "aura-asteria-en".to_string(),
                "aura-luna-en".to_string(),
                "aura-stella-en".to_string(),
            ],
        }
    }
}

/// What to do when a single segment cannot be synthesized or decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentFailurePolicy {
    /// Drop the segment and keep going.
    #[default]
    Skip,
    /// Stop the run with the segment's error.
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write the model's JSON to `debug_script_path` on every run.
    pub debug_script: bool,
    pub debug_script_path: PathBuf,
    pub mp3_bitrate_kbps: u32,
    pub ffmpeg_path: String,
    pub on_segment_failure: SegmentFailurePolicy,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            debug_script: true,
            debug_script_path: PathBuf::from("script.json"),
            mp3_bitrate_kbps: 192,
            ffmpeg_path: "ffmpeg".to_string(),
            on_segment_failure: SegmentFailurePolicy::Skip,
        }
    }
}

impl OutputConfig {
    /// The dump location, or `None` when the dump is switched off.
    pub fn debug_dump_path(&self) -> Option<PathBuf> {
        self.debug_script.then(|| self.debug_script_path.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub word_limit: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            word_limit: crate::pdf_text::DEFAULT_WORD_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PodcastError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PodcastError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, PodcastError> {
        toml::from_str(content)
            .map_err(|e| PodcastError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Overlay values from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup. Blank values are ignored.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(LLM_API_KEY_VAR).or_else(|| get(LLM_API_KEY_FALLBACK_VAR)) {
            self.llm.api_key = key;
        }
        if let Some(key) = get(TTS_API_KEY_VAR) {
            self.tts.api_key = key;
        }
        if let Some(base) = get(LLM_API_BASE_VAR) {
            self.llm.api_base = base;
        }
        if let Some(model) = get(LLM_MODEL_VAR) {
            self.llm.model = model;
        }
        if let Some(base) = get(TTS_API_BASE_VAR) {
            self.tts.api_base = base;
        }
        self
    }

    /// Check that everything needed to serve a request is present.
    pub fn validate(&self) -> Result<(), PodcastError> {
        if self.llm.api_key.trim().is_empty() {
            return Err(PodcastError::ConfigError(format!(
                "{} is not set (LLM API key)",
                LLM_API_KEY_VAR
            )));
        }
        if self.tts.api_key.trim().is_empty() {
            return Err(PodcastError::ConfigError(format!(
                "{} is not set (TTS API key)",
                TTS_API_KEY_VAR
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(PodcastError::ConfigError("LLM model name is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PodcastError::ConfigError(format!(
                "LLM temperature must be within 0.0-2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.voices.male.is_empty() || self.voices.female.is_empty() {
            return Err(PodcastError::ConfigError(
                "Both voice pools need at least one voice".to_string(),
            ));
        }
        Ok(())
    }
}
