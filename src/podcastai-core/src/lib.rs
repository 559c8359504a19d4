//! PodcastAI Core Library
//!
//! Drafts a multi-speaker podcast script with a hosted language model, voices
//! every line through a hosted speech API and stitches the clips into one
//! audio file.

pub mod assembler;
pub mod audio;
pub mod config;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod pdf_text;
pub mod script;
pub mod tts;
pub mod voices;

#[cfg(test)]
mod test_server;

pub use assembler::{PodcastAssembler, PodcastAudio, SkippedSegment};
pub use audio::{AudioBuffer, AudioEncoder, AudioFormat, Mp3Encoder, WavEncoder};
pub use config::{Config, SegmentFailurePolicy};
pub use error::PodcastError;
pub use generator::{LlmScriptWriter, ScriptWriter};
pub use orchestrator::{
    Podcast, PodcastCallback, PodcastEvent, PodcastRequest, Podcaster, resolve_topic,
};
pub use script::{Gender, Script, Segment, Speaker};
pub use tts::{DeepgramTts, SpeechSynthesizer};
pub use voices::{VoiceAssignment, VoiceRegistry};
