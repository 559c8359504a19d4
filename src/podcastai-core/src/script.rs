//! Podcast script definitions.
//!
//! A script is the structured dialogue drafted by the language model: a title,
//! the cast of speakers, and the ordered segments they speak.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::PodcastError;

/// Gender category of a speaker, used to pick a voice pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("unsupported gender '{}'", other)),
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Gender> for String {
    fn from(gender: Gender) -> Self {
        gender.as_str().to_string()
    }
}

/// A member of the cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: String,
    pub gender: Gender,
}

/// One line of dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "speaker", alias = "speaker_id")]
    pub speaker_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptBody {
    pub title: String,
    pub speakers: Vec<Speaker>,
    pub segments: Vec<Segment>,
}

/// The full model output: `{ "podcast": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub podcast: ScriptBody,
}

/// First parsing stage: model output text to an untyped JSON value.
pub fn parse_json(text: &str) -> Result<serde_json::Value, PodcastError> {
    serde_json::from_str(text).map_err(PodcastError::InvalidScriptJson)
}

impl Script {
    /// Parse model output text into a validated script.
    ///
    /// Fails with [`PodcastError::InvalidScriptJson`] when the text is not JSON and
    /// with [`PodcastError::ScriptShape`] when it is JSON of the wrong shape.
    pub fn parse(text: &str) -> Result<Self, PodcastError> {
        Self::from_value(parse_json(text)?)
    }

    /// Second parsing stage: typed conversion followed by [`Script::validate`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, PodcastError> {
        let script: Script = serde_json::from_value(value)
            .map_err(|e| PodcastError::ScriptShape(e.to_string()))?;
        script.validate()?;
        Ok(script)
    }

    /// Check the cross-references serde cannot: unique speaker ids and known
    /// speaker references in every segment.
    pub fn validate(&self) -> Result<(), PodcastError> {
        let podcast = &self.podcast;
        if podcast.speakers.is_empty() {
            return Err(PodcastError::ScriptShape("script has no speakers".to_string()));
        }

        let mut ids = HashSet::new();
        for speaker in &podcast.speakers {
            if speaker.id.trim().is_empty() {
                return Err(PodcastError::ScriptShape("speaker with empty id".to_string()));
            }
            if !ids.insert(speaker.id.as_str()) {
                return Err(PodcastError::ScriptShape(format!(
                    "duplicate speaker id '{}'",
                    speaker.id
                )));
            }
        }

        for (index, segment) in podcast.segments.iter().enumerate() {
            if !ids.contains(segment.speaker_id.as_str()) {
                return Err(PodcastError::ScriptShape(format!(
                    "segment {} references unknown speaker '{}'",
                    index, segment.speaker_id
                )));
            }
        }

        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.podcast.title
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.podcast.speakers
    }

    pub fn segments(&self) -> &[Segment] {
        &self.podcast.segments
    }

    /// Number of speakers of the given gender.
    pub fn count_gender(&self, gender: Gender) -> usize {
        self.podcast
            .speakers
            .iter()
            .filter(|s| s.gender == gender)
            .count()
    }

    /// Number of segments spoken by the given speaker.
    pub fn segments_for(&self, speaker_id: &str) -> usize {
        self.podcast
            .segments
            .iter()
            .filter(|s| s.speaker_id == speaker_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "podcast": {
            "title": "Checkmate Through the Ages",
            "speakers": [
                {"id": "S1", "gender": "male"},
                {"id": "S2", "gender": "Female"}
            ],
            "segments": [
                {"speaker": "S1", "text": "Welcome... um, to the show."},
                {"speaker": "S2", "text": "Uh, thanks for having me."},
                {"speaker_id": "S1", "text": "So... chess."}
            ]
        }
    }"#;

    #[test]
    fn test_parse_valid_script() {
        let script = Script::parse(SAMPLE).unwrap();
        assert_eq!(script.title(), "Checkmate Through the Ages");
        assert_eq!(script.speakers().len(), 2);
        assert_eq!(script.speakers()[1].gender, Gender::Female);
        assert_eq!(script.segments().len(), 3);
        assert_eq!(script.segments()[2].speaker_id, "S1");
        assert_eq!(script.count_gender(Gender::Male), 1);
        assert_eq!(script.segments_for("S1"), 2);
    }

    #[test]
    fn test_parse_not_json() {
        let err = Script::parse("Sure! Here is your podcast:").unwrap_err();
        assert!(matches!(err, PodcastError::InvalidScriptJson(_)));
    }

    #[test]
    fn test_parse_wrong_shape() {
        let err = Script::parse(r#"{"title": "no wrapper"}"#).unwrap_err();
        assert!(matches!(err, PodcastError::ScriptShape(_)));
    }

    #[test]
    fn test_parse_unknown_gender() {
        let text = r#"{"podcast": {"title": "t",
            "speakers": [{"id": "S1", "gender": "robot"}], "segments": []}}"#;
        let err = Script::parse(text).unwrap_err();
        assert!(matches!(err, PodcastError::ScriptShape(_)));
    }

    #[test]
    fn test_validate_unknown_speaker_reference() {
        let text = r#"{"podcast": {"title": "t",
            "speakers": [{"id": "S1", "gender": "male"}],
            "segments": [{"speaker": "S9", "text": "hi"}]}}"#;
        let err = Script::parse(text).unwrap_err();
        assert!(err.to_string().contains("S9"));
    }

    #[test]
    fn test_validate_duplicate_speaker() {
        let text = r#"{"podcast": {"title": "t",
            "speakers": [{"id": "S1", "gender": "male"}, {"id": "S1", "gender": "female"}],
            "segments": []}}"#;
        let err = Script::parse(text).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_parse_json_keeps_raw_value() {
        let value = parse_json(SAMPLE).unwrap();
        assert_eq!(value["podcast"]["segments"][2]["speaker_id"], "S1");
        assert_eq!(value["podcast"]["speakers"][1]["gender"], "Female");
        assert!(matches!(
            parse_json("{\"podcast\": "),
            Err(PodcastError::InvalidScriptJson(_))
        ));
    }

    #[test]
    fn test_serialize_uses_speaker_key() {
        let script = Script::parse(SAMPLE).unwrap();
        let json = serde_json::to_string_pretty(&script).unwrap();
        assert!(json.contains("\"speaker\": \"S1\""));
        assert!(json.contains("\"gender\": \"female\""));
        assert_eq!(Script::parse(&json).unwrap(), script);
    }
}
