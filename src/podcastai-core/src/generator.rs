//! Script generation through an OpenAI-compatible chat-completion API.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::error::PodcastError;
use crate::script::{self, Gender, Script};

/// Drafts a podcast script for a topic and cast composition.
///
/// Returns the model's JSON as-is so the caller can keep a copy of exactly what
/// came back before checking it against [`Script`].
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn draft_script(
        &self,
        topic: &str,
        male_count: usize,
        female_count: usize,
    ) -> Result<serde_json::Value, PodcastError>;
}

/// Build the instruction sent to the model.
pub fn build_prompt(topic: &str, male_count: usize, female_count: usize) -> String {
    let num_speakers = male_count + female_count;
    format!(
        r#"Generate a podcast script based on this topic: {topic}

The podcast should have {num_speakers} speakers, with {male_count} male and {female_count} female speakers.

The script should be in the following JSON format:
{{
  "podcast": {{
    "title": "Title of the podcast",
    "speakers": [
      {{"id": "S1", "gender": "male/female"}},
      {{"id": "S2", "gender": "male/female"}}
    ],
    "segments": [
      {{
        "speaker": "S1",
        "text": "Speaker's dialogue..."
      }}
    ]
  }}
}}
List exactly {num_speakers} speakers and add as many segments as the rules below require.

IMPORTANT RULES:
- Alternate the order of the speakers. Do not always follow the same order like S1, S2, S3; mix it up (for example S1, S2, S1, S3, S2, S3, S1) to make the conversation more realistic
- Add ... (three dots) to signify longer pauses and before important points, as often as feels natural
- Use the filler words 'um' and 'uh' regularly, with exactly that spelling, to make the speakers sound realistic
- Give each speaker at least 6 segments
- Keep the script as long as you can, but no more than 10 segments per speaker

Ensure that the script has a natural conversation flow and uses all specified speakers.
Start directly with the JSON, with no text before or after it."#
    )
}

/// Chat-completion backed [`ScriptWriter`].
pub struct LlmScriptWriter {
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl LlmScriptWriter {
    pub fn new(config: LlmConfig) -> Result<Self, PodcastError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().map_err(|e| {
            PodcastError::ConfigError(format!("Failed to create HTTP client: {}", e))
        })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base);

        let client = Client::with_config(openai_config).with_http_client(http_client);

        Ok(Self { client, config })
    }

    /// Send a single prompt and return the raw text of the first choice.
    async fn get_completion(&self, prompt: String) -> Result<String, PodcastError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .temperature(self.config.temperature)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: prompt.into(),
                    name: None,
                },
            )])
            .build()?;

        let response = self.client.chat().create(request).await?;
        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ScriptWriter for LlmScriptWriter {
    async fn draft_script(
        &self,
        topic: &str,
        male_count: usize,
        female_count: usize,
    ) -> Result<serde_json::Value, PodcastError> {
        info!(
            target: "podcastai::script",
            model = %self.config.model,
            male_count,
            female_count,
            "requesting script"
        );

        let raw = self
            .get_completion(build_prompt(topic, male_count, female_count))
            .await?;
        script::parse_json(&sanitize_response(&raw))
    }
}

/// Log when the model's cast differs from what was asked for.
pub fn check_composition(script: &Script, male_count: usize, female_count: usize) -> bool {
    let male = script.count_gender(Gender::Male);
    let female = script.count_gender(Gender::Female);
    let matches = male == male_count && female == female_count;
    if !matches {
        warn!(
            target: "podcastai::script",
            requested_male = male_count,
            requested_female = female_count,
            male,
            female,
            "script cast differs from the request"
        );
    }
    matches
}

/// Strip reasoning blocks and a surrounding Markdown code fence from model output.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = ["thinking", "think", "reasoning", "reflection", "analysis"];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    let trimmed = result.trim();
    if let Ok(fence_re) = regex::Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?\s*```$") {
        if let Some(caps) = fence_re.captures(trimmed) {
            return caps[1].trim().to_string();
        }
    }

    trimmed.to_string()
}
