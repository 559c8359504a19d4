//! PodcastAI CLI - Podcast Generator
//!
//! Turns a topic (or a PDF) into a multi-speaker podcast, from the terminal or
//! through a small web form.

mod web;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use podcastai_core::tts::generate_output_filename;
use podcastai_core::{
    AudioEncoder, Config, Mp3Encoder, PodcastError, PodcastEvent, PodcastRequest, Podcaster,
    WavEncoder, resolve_topic,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "podcastai",
    version,
    about = "Podcast Generator - turn a topic into a multi-speaker podcast",
    long_about = "Drafts a podcast script with an OpenAI-compatible LLM, voices it with a hosted TTS API and exports a single audio file."
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a podcast and write it to a file
    Generate(GenerateArgs),
    /// Serve the web form
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000", value_name = "ADDR")]
        addr: SocketAddr,
    },
}

#[derive(clap::Args)]
struct GenerateArgs {
    /// The podcast topic
    #[arg(value_name = "TOPIC", default_value = "")]
    topic: String,

    /// Number of male speakers (1-3)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
    male: u8,

    /// Number of female speakers (1-3)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
    female: u8,

    /// PDF whose text is used as (or added to) the topic
    #[arg(long, value_name = "FILE")]
    pdf: Option<PathBuf>,

    /// Maximum number of words taken from the PDF
    #[arg(long, value_name = "N")]
    words: Option<usize>,

    /// Output file (defaults to a name derived from the podcast title)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output audio format
    #[arg(long, value_enum, default_value_t = OutputFormat::Mp3)]
    format: OutputFormat,

    /// Do not write the model's JSON to the debug script path
    #[arg(long)]
    no_debug_dump: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Mp3,
    Wav,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_env();

    match cli.command {
        Command::Generate(args) => {
            if args.no_debug_dump {
                config.output.debug_script = false;
            }
            run_generate(&config, args).await
        }
        Command::Serve { addr } => {
            let podcaster = match Podcaster::from_config(&config) {
                Ok(podcaster) => podcaster.with_callback(web::log_callback()),
                Err(e) => exit_with_error(&e),
            };
            web::serve(addr, podcaster, config.pdf.word_limit).await?;
            Ok(())
        }
    }
}

async fn run_generate(
    config: &Config,
    args: GenerateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let encoder: Arc<dyn AudioEncoder> = match args.format {
        OutputFormat::Mp3 => Arc::new(Mp3Encoder::new(
            config.output.ffmpeg_path.clone(),
            config.output.mp3_bitrate_kbps,
        )),
        OutputFormat::Wav => Arc::new(WavEncoder),
    };
    let podcaster = match Podcaster::from_config_with_encoder(config, encoder) {
        Ok(podcaster) => podcaster.with_callback(create_console_callback()),
        Err(e) => exit_with_error(&e),
    };

    let pdf = match &args.pdf {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };
    let word_limit = args.words.unwrap_or(config.pdf.word_limit);
    let topic = match resolve_topic(&args.topic, pdf, word_limit) {
        Ok(topic) => topic,
        Err(PodcastError::MissingTopic) => {
            eprintln!("{}", "Please enter a podcast topic.".yellow());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let request = PodcastRequest::new(topic, args.male as usize, args.female as usize);

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", format!("  {}", "PodcastAI".bold()).bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!(
        "{} {}",
        "Topic:".bold(),
        summarize(&request.topic, 120).bright_white()
    );
    println!(
        "{} {} male, {} female",
        "Speakers:".bold(),
        request.male_count,
        request.female_count
    );
    println!();

    let podcast = podcaster.generate(&request).await?;
    let audio = &podcast.audio;

    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(generate_output_filename(&audio.title, audio.format.extension()))
    });
    std::fs::write(&output, &audio.bytes)?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    if audio.is_complete() {
        println!("{}", "  Podcast ready.".bright_green().bold());
    } else {
        println!(
            "{}",
            format!(
                "  Podcast ready with {} of {} segments.",
                audio.rendered.len(),
                audio.segment_count()
            )
            .yellow()
            .bold()
        );
    }
    println!("  {} {}", "Saved to:".bold(), output.display());
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

/// Report a startup failure and exit.
fn exit_with_error(e: &PodcastError) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), e);
    std::process::exit(1);
}

/// Create a callback that prints podcast events to the console.
fn create_console_callback() -> Box<dyn Fn(PodcastEvent) + Send + Sync> {
    Box::new(move |event| match event {
        PodcastEvent::ScriptStarted { .. } => {
            println!("{} {}", "▶".bright_cyan(), "Generating script".bright_cyan().bold());
        }
        PodcastEvent::ScriptReady {
            title,
            speakers,
            segments,
        } => {
            println!(
                "  {} {} ({} speakers, {} segments)",
                "Script Generation Finished:".green(),
                title.bright_white().bold(),
                speakers,
                segments
            );
            println!();
        }
        PodcastEvent::VoiceAssigned {
            speaker_id,
            gender,
            voice,
        } => {
            println!(
                "  {} {} → {}",
                speaker_id.bright_cyan(),
                format!("({})", gender).yellow(),
                voice.dimmed()
            );
        }
        PodcastEvent::SegmentStarted {
            index,
            total,
            speaker_id,
        } => {
            println!(
                "{} Generating audio for speaker {} {}",
                "▶".bright_cyan(),
                speaker_id.bright_cyan().bold(),
                format!("[{}/{}]", index + 1, total).dimmed()
            );
        }
        PodcastEvent::SegmentSkipped {
            index,
            speaker_id,
            reason,
        } => {
            eprintln!(
                "  {} segment {} ({}): {}",
                "Skipped".yellow().bold(),
                index + 1,
                speaker_id,
                reason
            );
        }
        PodcastEvent::ExportStarted => {
            println!("{} {}", "▶".bright_cyan(), "Exporting audio".bright_cyan().bold());
        }
        PodcastEvent::Finished {
            duration_secs,
            rendered,
            skipped,
        } => {
            println!(
                "  {:.1}s of audio, {} segments rendered, {} skipped",
                duration_secs, rendered, skipped
            );
        }
    })
}

/// Shorten long topics (e.g. PDF text) for display.
fn summarize(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
