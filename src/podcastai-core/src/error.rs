//! Error types for the podcast pipeline.

use thiserror::Error;

use crate::script::Gender;

#[derive(Error, Debug)]
pub enum PodcastError {
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS API returned {status}: {body}")]
    TtsApi { status: u16, body: String },

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Model output is not valid JSON: {0}")]
    InvalidScriptJson(#[source] serde_json::Error),

    #[error("Model output does not match the script shape: {0}")]
    ScriptShape(String),

    #[error("Not enough {gender} voices: {requested} speakers requested, {available} available")]
    VoicePoolExhausted {
        gender: Gender,
        available: usize,
        requested: usize,
    },

    #[error("Invalid speaker count: expected {min}-{max} {gender} speakers, got {actual}")]
    InvalidSpeakerCount {
        gender: Gender,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Audio decode error: {0}")]
    AudioDecode(#[from] hound::Error),

    #[error("Audio export failed: {0}")]
    Export(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] pdf::error::PdfError),

    #[error("No podcast topic provided")]
    MissingTopic,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
