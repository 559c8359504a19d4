//! Web form: collects topic, speaker counts and an optional PDF, then plays the result.

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use podcastai_core::orchestrator::{MAX_SPEAKERS_PER_GENDER, MIN_SPEAKERS_PER_GENDER};
use podcastai_core::{
    PodcastCallback, PodcastError, PodcastEvent, PodcastRequest, Podcaster, resolve_topic,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const MISSING_TOPIC_WARNING: &str = "Please enter a podcast topic.";

#[derive(Clone)]
pub struct AppState {
    podcaster: Arc<Podcaster>,
    /// Held for the duration of a generation; only one runs at a time.
    busy: Arc<Mutex<()>>,
    word_limit: usize,
}

impl AppState {
    pub fn new(podcaster: Podcaster, word_limit: usize) -> Self {
        Self {
            podcaster: Arc::new(podcaster),
            busy: Arc::new(Mutex::new(())),
            word_limit,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate", get(index).post(generate))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    podcaster: Podcaster,
    word_limit: usize,
) -> std::io::Result<()> {
    let app = router(AppState::new(podcaster, word_limit));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "podcastai::web", "Podcast Generator listening on http://{}", addr);
    axum::serve(listener, app).await
}

/// Log pipeline progress for requests served over the web.
pub fn log_callback() -> PodcastCallback {
    Box::new(|event| match event {
        PodcastEvent::ScriptStarted { .. } => info!(target: "podcastai::web", "Generating script"),
        PodcastEvent::ScriptReady { title, segments, .. } => {
            info!(target: "podcastai::web", %title, segments, "Script Generation Finished")
        }
        PodcastEvent::VoiceAssigned { speaker_id, voice, .. } => {
            info!(target: "podcastai::web", %speaker_id, %voice, "voice assigned")
        }
        PodcastEvent::SegmentStarted { index, total, speaker_id } => info!(
            target: "podcastai::web",
            "Generating audio for speaker {} [{}/{}]",
            speaker_id,
            index + 1,
            total
        ),
        PodcastEvent::SegmentSkipped { index, speaker_id, reason } => {
            warn!(target: "podcastai::web", index, %speaker_id, %reason, "segment skipped")
        }
        PodcastEvent::ExportStarted => info!(target: "podcastai::web", "Exporting audio"),
        PodcastEvent::Finished { duration_secs, rendered, skipped } => {
            info!(target: "podcastai::web", duration_secs, rendered, skipped, "podcast ready")
        }
    })
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

async fn index() -> Html<String> {
    Html(render_page(&FormValues::default(), None, ""))
}

/// Values echoed back into the form.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormValues {
    topic: String,
    male: usize,
    female: usize,
}

impl Default for FormValues {
    fn default() -> Self {
        Self {
            topic: String::new(),
            male: MIN_SPEAKERS_PER_GENDER,
            female: MIN_SPEAKERS_PER_GENDER,
        }
    }
}

async fn generate(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut values = FormValues::default();
    let mut pdf: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_page(StatusCode::BAD_REQUEST, &values, &e.to_string()),
        };
        let name = field.name().unwrap_or_default().to_string();
        let result = match name.as_str() {
            "topic" => field.text().await.map(|t| values.topic = t),
            "male" => field.text().await.map(|t| values.male = parse_count(&t)),
            "female" => field.text().await.map(|t| values.female = parse_count(&t)),
            "pdf" => field.bytes().await.map(|b| {
                if !b.is_empty() {
                    pdf = Some(b.to_vec());
                }
            }),
            _ => Ok(()),
        };
        if let Err(e) = result {
            return error_page(StatusCode::BAD_REQUEST, &values, &e.to_string());
        }
    }

    // PDF parsing is CPU-bound; keep it off the async workers.
    let text = values.topic.clone();
    let word_limit = state.word_limit;
    let resolved =
        tokio::task::spawn_blocking(move || resolve_topic(&text, pdf, word_limit)).await;
    let topic = match resolved {
        Ok(Ok(topic)) => topic,
        Ok(Err(PodcastError::MissingTopic)) => {
            return Html(render_page(&values, Some(MISSING_TOPIC_WARNING), "")).into_response();
        }
        Ok(Err(e)) => {
            return error_page(StatusCode::UNPROCESSABLE_ENTITY, &values, &e.to_string());
        }
        Err(e) => {
            warn!(target: "podcastai::web", error = %e, "topic extraction task failed");
            return error_page(StatusCode::INTERNAL_SERVER_ERROR, &values, &e.to_string());
        }
    };

    let Ok(_guard) = state.busy.try_lock() else {
        return (
            StatusCode::CONFLICT,
            Html(render_page(
                &values,
                Some("A podcast is already being generated. Please wait for it to finish."),
                "",
            )),
        )
            .into_response();
    };

    let request = PodcastRequest::new(topic, values.male, values.female);
    match state.podcaster.generate(&request).await {
        Ok(podcast) => {
            let audio = &podcast.audio;
            let mut result = format!(
                "<h2>{}</h2>\n<audio controls src=\"data:{};base64,{}\"></audio>\n<p>{:.1} seconds, {} segments.</p>\n",
                escape_html(&audio.title),
                audio.format.mime_type(),
                STANDARD.encode(&audio.bytes),
                audio.duration_secs,
                audio.rendered.len()
            );
            if !audio.skipped.is_empty() {
                result.push_str(&format!(
                    "<p class=\"warning\">{} segment(s) could not be voiced and were left out.</p>\n",
                    audio.skipped.len()
                ));
            }
            Html(render_page(&values, None, &result)).into_response()
        }
        Err(e) => {
            warn!(target: "podcastai::web", error = %e, "generation failed");
            error_page(status_for(&e), &values, &format!("Error generating podcast: {}", e))
        }
    }
}

fn parse_count(text: &str) -> usize {
    text.trim().parse().unwrap_or(0)
}

fn status_for(error: &PodcastError) -> StatusCode {
    match error {
        PodcastError::MissingTopic | PodcastError::InvalidSpeakerCount { .. } => {
            StatusCode::BAD_REQUEST
        }
        PodcastError::Pdf(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PodcastError::OpenAI(_)
        | PodcastError::Http(_)
        | PodcastError::TtsApi { .. }
        | PodcastError::InvalidScriptJson(_)
        | PodcastError::ScriptShape(_)
        | PodcastError::VoicePoolExhausted { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_page(status: StatusCode, values: &FormValues, message: &str) -> Response {
    (status, Html(render_page(values, Some(message), ""))).into_response()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn count_options(selected: usize) -> String {
    (MIN_SPEAKERS_PER_GENDER..=MAX_SPEAKERS_PER_GENDER)
        .map(|n| {
            let attr = if n == selected { " selected" } else { "" };
            format!("<option value=\"{n}\"{attr}>{n}</option>")
        })
        .collect()
}

fn render_page(values: &FormValues, warning: Option<&str>, result: &str) -> String {
    let warning = warning
        .map(|w| format!("<p class=\"warning\">{}</p>\n", escape_html(w)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Podcast Generator</title>
<style>
body {{ font-family: sans-serif; max-width: 860px; margin: 2rem auto; }}
form {{ display: flex; gap: 2rem; }}
.warning {{ color: #a15c00; }}
#progress {{ display: none; }}
</style>
</head>
<body>
<h1>Podcast Generator</h1>
{warning}<form method="post" action="/generate" enctype="multipart/form-data"
      onsubmit="document.getElementById('generate').disabled = true; document.getElementById('progress').style.display = 'block';">
<div>
<label>Male Speakers<br><select name="male">{male}</select></label><br><br>
<label>Female Speakers<br><select name="female">{female}</select></label><br><br>
<label>PDF (optional)<br><input type="file" name="pdf" accept="application/pdf"></label><br><br>
<button id="generate" type="submit">Generate Podcast</button>
</div>
<div>
<label>Podcast Topic<br><textarea name="topic" rows="9" cols="60">{topic}</textarea></label>
</div>
</form>
<p id="progress">Generating podcast...</p>
{result}</body>
</html>
"#,
        warning = warning,
        male = count_options(values.male),
        female = count_options(values.female),
        topic = escape_html(&values.topic),
        result = result,
    )
}
