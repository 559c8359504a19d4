//! Text-to-speech through a hosted speech API.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::TtsConfig;
use crate::error::PodcastError;

/// Synthesizes one line of dialogue with one voice.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns the audio for `text` as WAV container bytes.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, PodcastError>;
}

/// Deepgram-compatible `/speak` client requesting linear16 PCM in a WAV container.
pub struct DeepgramTts {
    client: reqwest::Client,
    config: TtsConfig,
}

impl DeepgramTts {
    pub fn new(config: TtsConfig) -> Result<Self, PodcastError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| {
            PodcastError::ConfigError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client, config })
    }

    fn speak_url(&self) -> String {
        format!("{}/speak", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechSynthesizer for DeepgramTts {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, PodcastError> {
        debug!(target: "podcastai::tts", voice = voice_id, chars = text.len(), "speak request");

        let response = self
            .client
            .post(self.speak_url())
            .query(&[
                ("model", voice_id),
                ("encoding", self.config.encoding.as_str()),
                ("container", self.config.container.as_str()),
            ])
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PodcastError::TtsApi {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(PodcastError::Synthesis(format!(
                "empty audio returned for voice '{}'",
                voice_id
            )));
        }

        Ok(audio.to_vec())
    }
}

/// Generate a filename for the exported podcast.
pub fn generate_output_filename(title: &str, extension: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let truncated: String = sanitized.chars().take(50).collect();
    let trimmed = truncated.trim();
    let name = if trimmed.is_empty() { "Podcast" } else { trimmed };

    format!("PodcastAI - {}.{}", name, extension)
}
