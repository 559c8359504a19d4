//! Podcast assembly: voices in, one audio artifact out.

use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audio::{AudioBuffer, AudioEncoder, AudioFormat, decode_wav};
use crate::config::SegmentFailurePolicy;
use crate::error::PodcastError;
use crate::orchestrator::PodcastEvent;
use crate::script::{Script, Segment};
use crate::tts::SpeechSynthesizer;
use crate::voices::{VoiceAssignment, VoiceRegistry};

/// A segment that did not make it into the final audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSegment {
    pub index: usize,
    pub speaker_id: String,
    pub reason: String,
}

/// The exported artifact plus an account of what went into it.
#[derive(Debug, Clone)]
pub struct PodcastAudio {
    pub title: String,
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
    pub duration_secs: f64,
    pub voices: VoiceAssignment,
    /// Indices of segments whose audio is in the artifact, in script order.
    pub rendered: Vec<usize>,
    pub skipped: Vec<SkippedSegment>,
}

impl PodcastAudio {
    /// Every segment was rendered.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Some, but not all, segments were rendered.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty() && !self.rendered.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.rendered.len() + self.skipped.len()
    }
}

/// Turns a script into a single audio artifact.
pub struct PodcastAssembler {
    registry: VoiceRegistry,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    encoder: Arc<dyn AudioEncoder>,
    policy: SegmentFailurePolicy,
}

impl PodcastAssembler {
    pub fn new(
        registry: VoiceRegistry,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        encoder: Arc<dyn AudioEncoder>,
    ) -> Self {
        Self {
            registry,
            synthesizer,
            encoder,
            policy: SegmentFailurePolicy::Skip,
        }
    }

    pub fn with_failure_policy(mut self, policy: SegmentFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn format(&self) -> AudioFormat {
        self.encoder.format()
    }

    /// Draw a distinct voice for every speaker in the script.
    pub fn assign_voices<R: Rng + ?Sized>(
        &self,
        script: &Script,
        rng: &mut R,
    ) -> Result<VoiceAssignment, PodcastError> {
        self.registry.assign(script.speakers(), rng)
    }

    /// Assign voices with the thread-local RNG, then render.
    pub async fn assemble(
        &self,
        script: &Script,
        emit: &(dyn Fn(PodcastEvent) + Send + Sync),
    ) -> Result<PodcastAudio, PodcastError> {
        let voices = {
            let mut rng = rand::thread_rng();
            self.assign_voices(script, &mut rng)?
        };
        self.render(script, voices, emit).await
    }

    /// Synthesize every segment in order and export the concatenation.
    pub async fn render(
        &self,
        script: &Script,
        voices: VoiceAssignment,
        emit: &(dyn Fn(PodcastEvent) + Send + Sync),
    ) -> Result<PodcastAudio, PodcastError> {
        for entry in voices.entries() {
            emit(PodcastEvent::VoiceAssigned {
                speaker_id: entry.speaker_id.clone(),
                gender: entry.gender,
                voice: entry.voice.clone(),
            });
        }

        let segments = script.segments();
        let total = segments.len();
        let mut buffer = AudioBuffer::new();
        let mut rendered = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        for (index, segment) in segments.iter().enumerate() {
            emit(PodcastEvent::SegmentStarted {
                index,
                total,
                speaker_id: segment.speaker_id.clone(),
            });

            match self.render_segment(segment, &voices).await {
                Ok(clip_bytes) => match decode_wav(&clip_bytes) {
                    Ok(clip) => {
                        buffer.append(clip);
                        rendered.push(index);
                    }
                    Err(e) => self.on_segment_error(index, segment, e, &mut skipped, emit)?,
                },
                Err(e) => self.on_segment_error(index, segment, e, &mut skipped, emit)?,
            }
        }

        emit(PodcastEvent::ExportStarted);
        let bytes = self.encoder.encode(&buffer, script.title()).await?;
        let duration_secs = buffer.duration_secs();

        info!(
            target: "podcastai::assembler",
            rendered = rendered.len(),
            skipped = skipped.len(),
            duration_secs,
            "podcast assembled"
        );

        Ok(PodcastAudio {
            title: script.title().to_string(),
            bytes,
            format: self.encoder.format(),
            duration_secs,
            voices,
            rendered,
            skipped,
        })
    }

    async fn render_segment(
        &self,
        segment: &Segment,
        voices: &VoiceAssignment,
    ) -> Result<Vec<u8>, PodcastError> {
        let voice = voices.voice_for(&segment.speaker_id).ok_or_else(|| {
            PodcastError::Synthesis(format!(
                "no voice assigned to speaker '{}'",
                segment.speaker_id
            ))
        })?;
        self.synthesizer.synthesize(&segment.text, voice).await
    }

    fn on_segment_error(
        &self,
        index: usize,
        segment: &Segment,
        error: PodcastError,
        skipped: &mut Vec<SkippedSegment>,
        emit: &(dyn Fn(PodcastEvent) + Send + Sync),
    ) -> Result<(), PodcastError> {
        warn!(
            target: "podcastai::assembler",
            index,
            speaker_id = %segment.speaker_id,
            error = %error,
            "segment failed"
        );

        if self.policy == SegmentFailurePolicy::Abort {
            return Err(error);
        }

        let reason = error.to_string();
        emit(PodcastEvent::SegmentSkipped {
            index,
            speaker_id: segment.speaker_id.clone(),
            reason: reason.clone(),
        });
        skipped.push(SkippedSegment {
            index,
            speaker_id: segment.speaker_id.clone(),
            reason,
        });
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::{WavEncoder, encode_wav};
    use crate::config::VoicesConfig;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    /// Speaks each line as `len(text) * 10` frames of a constant level, failing on "FAIL".
    pub(crate) struct FakeTts {
        pub calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeTts {
        pub(crate) fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeTts {
        async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, PodcastError> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), voice_id.to_string()));
            if text.contains("FAIL") {
                return Err(PodcastError::TtsApi {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            if text.contains("GARBLED") {
                return Ok(b"RIFF but not really".to_vec());
            }
            let level = (text.len() % 10) as f32 / 10.0;
            encode_wav(&vec![level; text.len() * 10], 1_000, 1)
        }
    }

    pub(crate) fn script(segments: &[(&str, &str)]) -> Script {
        let segments: Vec<serde_json::Value> = segments
            .iter()
            .map(|(s, t)| serde_json::json!({"speaker": s, "text": t}))
            .collect();
        Script::from_value(serde_json::json!({
            "podcast": {
                "title": "Test Cast",
                "speakers": [
                    {"id": "S1", "gender": "male"},
                    {"id": "S2", "gender": "female"}
                ],
                "segments": segments
            }
        }))
        .unwrap()
    }

    fn assembler(tts: Arc<FakeTts>) -> PodcastAssembler {
        PodcastAssembler::new(
            VoiceRegistry::new(&VoicesConfig::default()),
            tts,
            Arc::new(WavEncoder),
        )
    }

    fn voices(assembler: &PodcastAssembler, script: &Script) -> VoiceAssignment {
        let mut rng = StdRng::seed_from_u64(42);
        assembler.assign_voices(script, &mut rng).unwrap()
    }

    #[tokio::test]
    async fn test_render_in_script_order() {
        let tts = Arc::new(FakeTts::new());
        let assembler = assembler(tts.clone());
        let script = script(&[("S2", "aa"), ("S1", "bbbb"), ("S2", "c")]);
        let voices = voices(&assembler, &script);

        let audio = assembler.render(&script, voices.clone(), &|_| {}).await.unwrap();

        assert!(audio.is_complete());
        assert_eq!(audio.rendered, vec![0, 1, 2]);
        // (2 + 4 + 1) chars * 10 frames at 1kHz
        assert!((audio.duration_secs - 0.07).abs() < 1e-9);

        let calls = tts.calls.lock().unwrap();
        let texts: Vec<&str> = calls.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["aa", "bbbb", "c"]);
        assert_eq!(calls[0].1, voices.voice_for("S2").unwrap());
        assert_eq!(calls[1].1, voices.voice_for("S1").unwrap());

        let clip = decode_wav(&audio.bytes).unwrap();
        assert_eq!(clip.frames(), 70);
        // First clip level (2 % 10) / 10, second clip level (4 % 10) / 10.
        assert!((clip.samples[0] - 0.2).abs() < 1e-3);
        assert!((clip.samples[20] - 0.4).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_failed_segments_contribute_nothing() {
        let tts = Arc::new(FakeTts::new());
        let assembler = assembler(tts);
        let script = script(&[("S1", "hello"), ("S2", "FAIL"), ("S1", "GARBLED"), ("S2", "bye")]);
        let voices = voices(&assembler, &script);

        let events = Mutex::new(Vec::new());
        let audio = assembler
            .render(&script, voices, &|e| events.lock().unwrap().push(e))
            .await
            .unwrap();

        assert!(audio.is_partial());
        assert_eq!(audio.rendered, vec![0, 3]);
        assert_eq!(
            audio.skipped.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(audio.skipped[0].reason.contains("500"));
        assert!((audio.duration_secs - 0.08).abs() < 1e-9);

        let events = events.lock().unwrap();
        let skipped_events = events
            .iter()
            .filter(|e| matches!(e, PodcastEvent::SegmentSkipped { .. }))
            .count();
        assert_eq!(skipped_events, 2);
        assert!(matches!(events.last(), Some(PodcastEvent::ExportStarted)));
    }

    #[tokio::test]
    async fn test_abort_policy_stops_on_first_failure() {
        let tts = Arc::new(FakeTts::new());
        let assembler = assembler(tts.clone()).with_failure_policy(SegmentFailurePolicy::Abort);
        let script = script(&[("S1", "hello"), ("S2", "FAIL"), ("S1", "never")]);
        let voices = voices(&assembler, &script);

        let err = assembler.render(&script, voices, &|_| {}).await.unwrap_err();
        assert!(matches!(err, PodcastError::TtsApi { status: 500, .. }));
        assert_eq!(tts.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_script_exports_zero_duration() {
        let assembler = assembler(Arc::new(FakeTts::new()));
        let script = script(&[]);

        let audio = assembler.assemble(&script, &|_| {}).await.unwrap();
        assert_eq!(audio.duration_secs, 0.0);
        assert!(audio.is_complete());
        assert!(!audio.is_partial());
        assert_eq!(audio.voices.len(), 2);
        assert!(decode_wav(&audio.bytes).unwrap().samples.is_empty());
    }

    #[tokio::test]
    async fn test_assemble_rejects_oversized_cast() {
        let assembler = assembler(Arc::new(FakeTts::new()));
        let script = Script::from_value(serde_json::json!({
            "podcast": {
                "title": "Crowded",
                "speakers": [
                    {"id": "S1", "gender": "female"},
                    {"id": "S2", "gender": "female"},
                    {"id": "S3", "gender": "female"},
                    {"id": "S4", "gender": "female"}
                ],
                "segments": []
            }
        }))
        .unwrap();

        let err = assembler.assemble(&script, &|_| {}).await.unwrap_err();
        assert!(matches!(err, PodcastError::VoicePoolExhausted { .. }));
    }
}
