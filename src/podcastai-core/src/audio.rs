//! Audio buffer, WAV decoding and final export.

use async_trait::async_trait;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::PodcastError;

/// Format used by an empty buffer; matches what the TTS service returns for linear16.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const DEFAULT_CHANNELS: u16 = 1;

/// A decoded clip: interleaved samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode a WAV container into an [`AudioClip`].
pub fn decode_wav(bytes: &[u8]) -> Result<AudioClip, PodcastError> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(hound::Error::FormatError("sample rate of zero").into());
    }
    if spec.channels == 0 {
        return Err(hound::Error::FormatError("zero channels").into());
    }

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(AudioClip {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Encode interleaved samples as 16-bit PCM WAV.
pub fn encode_wav(
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>, PodcastError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

/// Growing accumulator of clips in append order.
///
/// The first clip appended fixes the buffer's format. Later clips are remixed
/// and resampled to it, so each clip adds exactly its own duration.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    clips: usize,
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBuffer {
    /// Create an empty, zero-duration buffer.
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            clips: 0,
        }
    }

    pub fn append(&mut self, clip: AudioClip) {
        if self.clips == 0 && self.samples.is_empty() && clip.sample_rate > 0 && clip.channels > 0 {
            self.sample_rate = clip.sample_rate;
            self.channels = clip.channels;
        }

        let remixed = remix_channels(clip.samples, clip.channels, self.channels);
        let resampled = resample(remixed, self.channels, clip.sample_rate, self.sample_rate);
        debug!(
            target: "podcastai::audio",
            frames = resampled.len() / self.channels as usize,
            "appending clip"
        );
        self.samples.extend(resampled);
        self.clips += 1;
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn clip_count(&self) -> usize {
        self.clips
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Render the buffer as a 16-bit PCM WAV file.
    pub fn to_wav(&self) -> Result<Vec<u8>, PodcastError> {
        encode_wav(&self.samples, self.sample_rate, self.channels)
    }
}

/// Convert interleaved samples between channel counts.
fn remix_channels(samples: Vec<f32>, from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples;
    }
    let from = from as usize;
    let to = to as usize;

    samples
        .chunks(from)
        .flat_map(|frame| {
            if to == 1 {
                vec![frame.iter().sum::<f32>() / frame.len() as f32]
            } else {
                (0..to).map(|c| frame[c % frame.len()]).collect()
            }
        })
        .collect()
}

/// Resample interleaved samples using linear interpolation between adjacent frames.
fn resample(samples: Vec<f32>, channels: u16, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples;
    }

    let channels = channels.max(1) as usize;
    let frames = samples.len() / channels;
    let ratio = from_rate as f64 / to_rate as f64;
    let new_frames = (frames as f64 / ratio).round() as usize;
    let mut result = Vec::with_capacity(new_frames * channels);

    for i in 0..new_frames {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        for c in 0..channels {
            if src_idx + 1 < frames {
                let a = samples[src_idx * channels + c];
                let b = samples[(src_idx + 1) * channels + c];
                result.push(a * (1.0 - frac) + b * frac);
            } else if src_idx < frames {
                result.push(samples[src_idx * channels + c]);
            } else if frames > 0 {
                result.push(samples[(frames - 1) * channels + c]);
            }
        }
    }

    result
}

/// Container of the exported artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

/// Turns the finished buffer into the bytes handed back to the caller.
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    fn format(&self) -> AudioFormat;

    async fn encode(&self, buffer: &AudioBuffer, title: &str) -> Result<Vec<u8>, PodcastError>;
}

/// Uncompressed 16-bit WAV output.
#[derive(Debug, Clone, Default)]
pub struct WavEncoder;

#[async_trait]
impl AudioEncoder for WavEncoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    async fn encode(&self, buffer: &AudioBuffer, _title: &str) -> Result<Vec<u8>, PodcastError> {
        buffer
            .to_wav()
            .map_err(|e| PodcastError::Export(format!("Failed to write WAV: {}", e)))
    }
}

/// MP3 output by piping WAV through an external `ffmpeg` (libmp3lame).
#[derive(Debug, Clone)]
pub struct Mp3Encoder {
    ffmpeg_path: String,
    bitrate_kbps: u32,
}

impl Mp3Encoder {
    pub fn new(ffmpeg_path: impl Into<String>, bitrate_kbps: u32) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            bitrate_kbps,
        }
    }

    fn command(&self, title: &str) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg("wav")
            .arg("-i")
            .arg("pipe:0")
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg(format!("{}k", self.bitrate_kbps));

        if !title.trim().is_empty() {
            cmd.arg("-metadata").arg(format!("title={}", title.trim()));
        }

        cmd.arg("-f")
            .arg("mp3")
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for Mp3Encoder {
    fn default() -> Self {
        Self::new("ffmpeg", 192)
    }
}

#[async_trait]
impl AudioEncoder for Mp3Encoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    async fn encode(&self, buffer: &AudioBuffer, title: &str) -> Result<Vec<u8>, PodcastError> {
        let wav = buffer
            .to_wav()
            .map_err(|e| PodcastError::Export(format!("Failed to write WAV: {}", e)))?;

        let mut child = self.command(title).spawn().map_err(|e| {
            PodcastError::Export(format!(
                "ffmpeg conversion failed: {}. Is ffmpeg installed?",
                e
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PodcastError::Export("ffmpeg stdin unavailable".to_string()))?;
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&wav).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PodcastError::Export(format!("ffmpeg did not finish: {}", e)))?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(PodcastError::Export(format!(
                    "Failed to stream audio to ffmpeg: {}",
                    e
                )));
            }
            Err(e) => return Err(PodcastError::Export(format!("ffmpeg writer panicked: {}", e))),
        }

        if !output.status.success() {
            return Err(PodcastError::Export(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(
            target: "podcastai::audio",
            bytes = output.stdout.len(),
            bitrate_kbps = self.bitrate_kbps,
            "MP3 export completed"
        );
        Ok(output.stdout)
    }
}
