//! Application entry point — Sleepy News.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load `.env` files, [`AppConfig`] from disk and environment overrides.
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Open the audio output (optional) and the background music track.
//! 5. Build the speech synthesizer, player and content provider.
//! 6. Install SIGINT/SIGTERM handlers.
//! 7. Run the [`Supervisor`] on the main thread until shutdown.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rodio::OutputStream;

use sleepy_news::{
    audio::{select_player, BackgroundTrack, Ducker, CANCEL_POLL},
    config::{AppConfig, AppPaths},
    content::{
        ApiChatClient, ContentProvider, FeedFile, NewsSource, PromptBuilder, RedditSource,
        ScriptProvider, TranscriptProvider,
    },
    pipeline::{
        listen_for_signals, Consumer, ConsumerSettings, ExitStatus, Producer, ProducerSettings,
        Shared, Supervisor,
    },
    tts::ElevenLabsSynth,
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "sleepy-news", version, about = "Bedtime news, read aloud over soft music")]
struct Cli {
    /// Settings file to use instead of the per-user settings.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read paragraphs from a text file (blank-line separated) instead of the news.
    #[arg(short, long, conflicts_with = "feed")]
    script: Option<PathBuf>,

    /// Paragraphs handed to the queue per script batch.
    #[arg(long, default_value_t = 1)]
    per_batch: usize,

    /// JSON news feed to narrate instead of fetching Reddit.
    #[arg(short, long)]
    feed: Option<PathBuf>,

    /// Do not play background music.
    #[arg(long)]
    no_music: bool,
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn load_config(cli: &Cli, paths: &AppPaths) -> Result<AppConfig> {
    // Process-local .env first; dotenvy never overrides what is already set.
    dotenvy::dotenv().ok();
    dotenvy::from_path(&paths.env_file).ok();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };
    config.apply_env()?;
    config.validate()?;

    if cli.no_music {
        config.background.music_path = None;
    }
    if cli.feed.is_some() {
        config.news.feed_file = cli.feed.clone();
    }
    Ok(config)
}

fn content_provider(cli: &Cli, config: &AppConfig) -> Result<Box<dyn ContentProvider>> {
    if let Some(path) = &cli.script {
        let script = ScriptProvider::load(path, cli.per_batch)
            .with_context(|| format!("cannot read script {}", path.display()))?;
        log::info!("Reading {} batches from {}", script.remaining(), path.display());
        return Ok(Box::new(script));
    }

    let source: Box<dyn NewsSource> = match &config.news.feed_file {
        Some(path) => {
            log::info!("News from feed file {}", path.display());
            Box::new(FeedFile::new(path.clone()))
        }
        None => {
            log::info!("News from r/{} (top, {})", config.news.subreddit, config.news.timeframe);
            Box::new(RedditSource::from_config(&config.news))
        }
    };
    if config.llm.api_key.is_none() {
        log::warn!("LLM_API_KEY is not set; transcript requests will likely be rejected");
    }

    let transcript = TranscriptProvider::new(
        source,
        Box::new(ApiChatClient::from_config(&config.llm)),
        config.fallback_paragraph.clone(),
    )
    .with_prompt(PromptBuilder::new().with_sleep_guidance(config.llm.sleep_guidance));
    Ok(Box::new(transcript))
}

fn run(cli: Cli) -> Result<ExitStatus> {
    let paths = AppPaths::new();
    let config = load_config(&cli, &paths)?;
    log::info!(
        "Queue capacity {}, low watermark {}, batch {}",
        config.pipeline.queue_capacity,
        config.pipeline.low_watermark,
        config.pipeline.batch_produce_count
    );

    // Tokio runtime (2 worker threads: content HTTP and speech HTTP)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // Audio output; the stream must outlive every sink created from it.
    // Without one, music is disabled and only an external player can speak.
    let audio = match OutputStream::try_default() {
        Ok(audio) => Some(audio),
        Err(e) => {
            log::warn!("No audio output device ({e}); background music disabled");
            None
        }
    };
    let output = audio.as_ref().map(|(_stream, handle)| handle);

    let background = Arc::new(BackgroundTrack::from_output(
        output,
        config.background.music_path.as_deref(),
        config.background.initial_volume,
    ));
    background.start();

    let player = select_player(
        config.playback.command.as_deref(),
        config.playback.kill_grace(),
        output,
    )?;

    if config.tts.api_key.is_none() {
        log::warn!("ELEVENLABS_API_KEY is not set; speech synthesis will likely fail");
    }
    let synth = Arc::new(ElevenLabsSynth::from_config(&config.tts));

    let shared = Shared::new(config.pipeline.queue_capacity, config.shutdown.grace());
    listen_for_signals(rt.handle(), shared.clone()).context("cannot install signal handlers")?;

    let producer = Producer::new(
        shared.clone(),
        content_provider(&cli, &config)?,
        ProducerSettings::from_config(&config),
        rt.handle().clone(),
    );
    let consumer = Consumer::new(
        shared.clone(),
        synth,
        player,
        Ducker::new(
            background.clone(),
            config.background.initial_volume,
            config.background.ducked_volume,
            config.background.fade(),
        ),
        ConsumerSettings::from_config(&config),
        rt.handle().clone(),
    );

    let status = Supervisor::new(shared).run(producer, consumer)?;

    match status {
        ExitStatus::Graceful => background.stop(config.background.fade()),
        ExitStatus::Forced => {
            // Give an in-flight player process the chance to be terminated.
            std::thread::sleep(config.playback.kill_grace() + CANCEL_POLL);
            rt.shutdown_background();
        }
    }
    Ok(status)
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Sleepy News starting up");

    match run(Cli::parse()) {
        Ok(status) => {
            log::info!("Goodnight (exit code {})", status.code());
            status.into()
        }
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
