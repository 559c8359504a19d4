//! Voice registry and per-run voice assignment.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::VoicesConfig;
use crate::error::PodcastError;
use crate::script::{Gender, Speaker};

/// Fixed pools of voice identifiers, one per gender category.
#[derive(Debug, Clone)]
pub struct VoiceRegistry {
    male: Vec<String>,
    female: Vec<String>,
}

impl VoiceRegistry {
    pub fn new(voices: &VoicesConfig) -> Self {
        Self {
            male: voices.male.clone(),
            female: voices.female.clone(),
        }
    }

    /// Voices available for a gender category.
    pub fn pool(&self, gender: Gender) -> &[String] {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
        }
    }

    /// Assign every speaker a distinct voice from the pool matching their gender.
    ///
    /// Each pool is copied and shuffled, then voices are popped in speaker order.
    /// Fails before drawing anything if a category has more speakers than voices.
    pub fn assign<R: Rng + ?Sized>(
        &self,
        speakers: &[Speaker],
        rng: &mut R,
    ) -> Result<VoiceAssignment, PodcastError> {
        for gender in [Gender::Male, Gender::Female] {
            let requested = speakers.iter().filter(|s| s.gender == gender).count();
            let available = self.pool(gender).len();
            if requested > available {
                return Err(PodcastError::VoicePoolExhausted {
                    gender,
                    available,
                    requested,
                });
            }
        }

        let mut male = self.male.clone();
        let mut female = self.female.clone();
        male.shuffle(rng);
        female.shuffle(rng);

        let mut entries = Vec::with_capacity(speakers.len());
        for speaker in speakers {
            let pool = match speaker.gender {
                Gender::Male => &mut male,
                Gender::Female => &mut female,
            };
            let voice = pool.pop().ok_or(PodcastError::VoicePoolExhausted {
                gender: speaker.gender,
                available: self.pool(speaker.gender).len(),
                requested: self.pool(speaker.gender).len() + 1,
            })?;
            entries.push(AssignedVoice {
                speaker_id: speaker.id.clone(),
                gender: speaker.gender,
                voice,
            });
        }

        Ok(VoiceAssignment { entries })
    }
}

/// A speaker paired with the voice that will read their lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedVoice {
    pub speaker_id: String,
    pub gender: Gender,
    pub voice: String,
}

/// Speaker-to-voice mapping for one generation run, in speaker order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceAssignment {
    entries: Vec<AssignedVoice>,
}

impl VoiceAssignment {
    pub fn voice_for(&self, speaker_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.speaker_id == speaker_id)
            .map(|e| e.voice.as_str())
    }

    pub fn entries(&self) -> &[AssignedVoice] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
