mod analysis;
mod audio;
mod cli;
mod config;
mod export;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use analysis::{AnalysisSettings, SmoothingParams};
use cli::Cli;
use pipeline::{Producer, Stream};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();
    let mut smoothing = SmoothingParams {
        octave: cli.octave_smoothing,
        note: cli.note_smoothing,
        overtone: cli.overtone_smoothing,
        ..SmoothingParams::default()
    };
    let mut realtime = !cli.fast;

    // Config values apply only where the CLI is at its default.
    if let Some(path) = cli.config.clone().or_else(config::find_config) {
        match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                let a = cfg.analysis;
                if cli.buffer_size == 4096 { cli.buffer_size = a.buffer_size; }
                if cli.octaves_below == 2 { cli.octaves_below = a.octaves_below; }
                if cli.octaves_above == 3 { cli.octaves_above = a.octaves_above; }
                if !cli.overtone { cli.overtone = a.add_overtone; }
                if cli.window == audio::window::WindowKind::Bartlett { cli.window = a.window; }
                if cli.octave_smoothing == 3.0 { smoothing.octave = a.smoothing.octave; }
                if cli.note_smoothing == 3.0 { smoothing.note = a.smoothing.note; }
                if cli.overtone_smoothing == 3.0 { smoothing.overtone = a.smoothing.overtone; }
                smoothing.floor = a.smoothing.floor;
                smoothing.squelch = a.smoothing.squelch;

                let p = cfg.playback;
                if cli.fps == 30 { cli.fps = p.fps; }
                if !cli.fast { realtime = p.realtime; }
                if cli.channel == audio::decode::ChannelMode::Left { cli.channel = p.channel; }
            }
            Err(e) => log::warn!("{:#}", e),
        }
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("chromascope - chromatic spectrum analyzer");
    log::info!("Input: {}", input.display());

    log::info!("Decoding audio...");
    let audio = audio::decode::decode_audio(input, cli.channel)?;

    let settings = AnalysisSettings {
        sample_rate: audio.sample_rate,
        buffer_size: cli.buffer_size,
        octaves_below: cli.octaves_below,
        octaves_above: cli.octaves_above,
        add_overtone: cli.overtone,
        window: cli.window,
        smoothing,
    };
    log::info!(
        "Analysis: {} samples/frame, octaves -{}..+{}, {:?} window, overtone={}",
        settings.buffer_size,
        settings.octaves_below,
        settings.octaves_above,
        settings.window,
        settings.add_overtone
    );

    if let Some(ref path) = cli.export {
        let export = export::analyze_file(&audio, settings)?;
        export::write_json(&export, path)?;
        return Ok(());
    }

    monitor(audio, settings, cli.fps, realtime)
}

/// Play the file through the producer thread and show the latest frame.
fn monitor(
    audio: audio::decode::AudioData,
    settings: AnalysisSettings,
    fps: u32,
    realtime: bool,
) -> Result<()> {
    let total = audio.frame_count(settings.buffer_size);
    let producer = Producer::new(settings)?;
    let stream = Stream::spawn(producer, audio, realtime)?;

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let interval = Duration::from_secs_f32(1.0 / fps.max(1) as f32);
    pipeline::consume(&stream, interval, |seq, frame| {
        pb.set_position(seq);
        if frame.frame_ready {
            let line = pipeline::chroma_line(frame);
            let note = pipeline::dominant_name(frame);
            log::debug!("frame {}: {} {}", seq, note, line);
            pb.set_message(format!("{} {:<2}", line, note));
        } else {
            pb.set_message("no signal");
        }
    });
    pb.finish_with_message("Playback complete");

    let stats = stream.join()?;
    if stats.invalid > 0 {
        log::warn!("{} of {} frames held (non-finite input)", stats.invalid, stats.frames);
    }
    Ok(())
}
