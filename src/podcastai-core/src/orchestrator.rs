//! Podcast orchestration logic.
//!
//! Drives one generation run: script drafting, the debug dump, then assembly.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::assembler::{PodcastAssembler, PodcastAudio};
use crate::audio::{AudioEncoder, Mp3Encoder};
use crate::config::Config;
use crate::error::PodcastError;
use crate::generator::{LlmScriptWriter, ScriptWriter, check_composition};
use crate::pdf_text;
use crate::script::{Gender, Script};
use crate::tts::DeepgramTts;
use crate::voices::VoiceRegistry;

/// Allowed speakers per gender category in a request.
pub const MIN_SPEAKERS_PER_GENDER: usize = 1;
pub const MAX_SPEAKERS_PER_GENDER: usize = 3;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastRequest {
    pub topic: String,
    pub male_count: usize,
    pub female_count: usize,
}

impl PodcastRequest {
    pub fn new(topic: impl Into<String>, male_count: usize, female_count: usize) -> Self {
        Self {
            topic: topic.into(),
            male_count,
            female_count,
        }
    }

    pub fn speaker_count(&self) -> usize {
        self.male_count + self.female_count
    }

    pub fn validate(&self) -> Result<(), PodcastError> {
        if self.topic.trim().is_empty() {
            return Err(PodcastError::MissingTopic);
        }
        for (gender, actual) in [
            (Gender::Male, self.male_count),
            (Gender::Female, self.female_count),
        ] {
            if !(MIN_SPEAKERS_PER_GENDER..=MAX_SPEAKERS_PER_GENDER).contains(&actual) {
                return Err(PodcastError::InvalidSpeakerCount {
                    gender,
                    min: MIN_SPEAKERS_PER_GENDER,
                    max: MAX_SPEAKERS_PER_GENDER,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Work out the topic from free text and an optional PDF upload.
///
/// PDF text is limited to `word_limit` words. When both are present the free
/// text comes first, separated from the PDF text by a blank line.
pub fn resolve_topic(
    text: &str,
    pdf: Option<Vec<u8>>,
    word_limit: usize,
) -> Result<String, PodcastError> {
    let text = text.trim();
    let pdf_text = match pdf {
        Some(data) if !data.is_empty() => pdf_text::extract_text(data, word_limit)?,
        _ => String::new(),
    };

    let topic = match (text.is_empty(), pdf_text.is_empty()) {
        (true, true) => return Err(PodcastError::MissingTopic),
        (false, true) => text.to_string(),
        (true, false) => pdf_text,
        (false, false) => format!("{}\n\n{}", text, pdf_text),
    };
    Ok(topic)
}

/// The outcome of a generation run.
#[derive(Debug, Clone)]
pub struct Podcast {
    pub script: Script,
    pub audio: PodcastAudio,
}

/// Callback for podcast events.
pub type PodcastCallback = Box<dyn Fn(PodcastEvent) + Send + Sync>;

/// Events emitted during generation.
#[derive(Debug, Clone)]
pub enum PodcastEvent {
    /// The script request is being sent.
    ScriptStarted { topic: String },
    /// The script came back and passed validation.
    ScriptReady {
        title: String,
        speakers: usize,
        segments: usize,
    },
    /// A speaker was given a voice.
    VoiceAssigned {
        speaker_id: String,
        gender: Gender,
        voice: String,
    },
    /// A segment is about to be synthesized.
    SegmentStarted {
        index: usize,
        total: usize,
        speaker_id: String,
    },
    /// A segment failed and was left out.
    SegmentSkipped {
        index: usize,
        speaker_id: String,
        reason: String,
    },
    /// All segments are done; encoding the artifact.
    ExportStarted,
    /// Generation has finished.
    Finished {
        duration_secs: f64,
        rendered: usize,
        skipped: usize,
    },
}

/// Orchestrates script generation and assembly.
pub struct Podcaster {
    writer: Arc<dyn ScriptWriter>,
    assembler: PodcastAssembler,
    debug_script_path: Option<PathBuf>,
    callback: Option<PodcastCallback>,
}

impl Podcaster {
    pub fn new(writer: Arc<dyn ScriptWriter>, assembler: PodcastAssembler) -> Self {
        Self {
            writer,
            assembler,
            debug_script_path: None,
            callback: None,
        }
    }

    /// Build the production pipeline, validating credentials first.
    pub fn from_config(config: &Config) -> Result<Self, PodcastError> {
        let encoder = Arc::new(Mp3Encoder::new(
            config.output.ffmpeg_path.clone(),
            config.output.mp3_bitrate_kbps,
        ));
        Self::from_config_with_encoder(config, encoder)
    }

    pub fn from_config_with_encoder(
        config: &Config,
        encoder: Arc<dyn AudioEncoder>,
    ) -> Result<Self, PodcastError> {
        config.validate()?;

        let writer = Arc::new(LlmScriptWriter::new(config.llm.clone())?);
        let tts = Arc::new(DeepgramTts::new(config.tts.clone())?);
        let assembler = PodcastAssembler::new(VoiceRegistry::new(&config.voices), tts, encoder)
            .with_failure_policy(config.output.on_segment_failure);

        Ok(Self::new(writer, assembler)
            .with_debug_script_path(config.output.debug_dump_path()))
    }

    pub fn with_debug_script_path(mut self, path: Option<PathBuf>) -> Self {
        self.debug_script_path = path;
        self
    }

    /// Set a callback for podcast events.
    pub fn with_callback(mut self, callback: PodcastCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn assembler(&self) -> &PodcastAssembler {
        &self.assembler
    }

    /// Run the full generation.
    pub async fn generate(&self, request: &PodcastRequest) -> Result<Podcast, PodcastError> {
        request.validate()?;

        self.emit_event(PodcastEvent::ScriptStarted {
            topic: request.topic.clone(),
        });
        let draft = self
            .writer
            .draft_script(&request.topic, request.male_count, request.female_count)
            .await?;
        self.dump_script(&draft).await;

        let script = Script::from_value(draft)?;
        check_composition(&script, request.male_count, request.female_count);
        self.emit_event(PodcastEvent::ScriptReady {
            title: script.title().to_string(),
            speakers: script.speakers().len(),
            segments: script.segments().len(),
        });

        let audio = self
            .assembler
            .assemble(&script, &|event| self.emit_event(event))
            .await?;

        info!(
            target: "podcastai::orchestrator",
            title = %audio.title,
            duration_secs = audio.duration_secs,
            "generation finished"
        );
        self.emit_event(PodcastEvent::Finished {
            duration_secs: audio.duration_secs,
            rendered: audio.rendered.len(),
            skipped: audio.skipped.len(),
        });

        Ok(Podcast { script, audio })
    }

    /// Overwrite the debug copy of the model's JSON. Failures are logged only.
    async fn dump_script(&self, draft: &serde_json::Value) {
        let Some(path) = &self.debug_script_path else {
            return;
        };

        let json = match serde_json::to_string_pretty(draft) {
            Ok(json) => json,
            Err(e) => {
                warn!(target: "podcastai::orchestrator", error = %e, "could not serialize script");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, json).await {
            warn!(
                target: "podcastai::orchestrator",
                path = %path.display(),
                error = %e,
                "could not write script dump"
            );
        }
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: PodcastEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
