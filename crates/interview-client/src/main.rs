use anyhow::{Context, Result};
use clap::Parser;
use interview_client::{FileDecoderFactory, PcmClip, SessionOptions, run_interview};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Answer an interview from a recorded WAV file")]
struct Cli {
    /// 16-bit PCM WAV file with the candidate's speech
    #[arg(short, long)]
    input: PathBuf,

    /// Interview server WebSocket endpoint
    #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// Directory the reply audio is written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Milliseconds of audio per frame
    #[arg(long, default_value_t = 20)]
    frame_ms: u64,

    /// Sample rate the server is configured to transcribe
    #[arg(long, default_value_t = 16_000)]
    sample_rate: u32,

    /// Channel count the server is configured to transcribe
    #[arg(long, default_value_t = 1)]
    channels: u16,

    /// Seconds to keep listening after the recording has been sent
    #[arg(long, default_value_t = 20)]
    linger_secs: u64,

    #[arg(long, default_value = "INFO")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let clip = PcmClip::load(&cli.input)
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;
    clip.ensure_format(cli.sample_rate, cli.channels)?;
    tracing::info!("Loaded {:?} of audio from {}", clip.duration(), cli.input.display());

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("Failed to create {}", cli.out_dir.display()))?;

    let options = SessionOptions {
        url: cli.url,
        frame: Duration::from_millis(cli.frame_ms.max(1)),
        linger: Duration::from_secs(cli.linger_secs),
    };
    let mut factory = FileDecoderFactory::new(&cli.out_dir);
    let summary = run_interview(&options, &clip, &mut factory)
        .await
        .context("Interview session failed")?;

    tracing::info!(
        frames_sent = summary.frames_sent,
        replies_saved = summary.replies_saved,
        retries = summary.playback.retries,
        "Session finished"
    );
    println!(
        "saved {} replies to {}{}",
        summary.replies_saved,
        cli.out_dir.display(),
        if summary.interview_complete { ", interview complete" } else { "" }
    );
    Ok(())
}
