use clap::Parser;
use std::path::PathBuf;

use crate::audio::decode::ChannelMode;
use crate::audio::window::WindowKind;

#[derive(Parser, Debug)]
#[command(name = "chromascope", about = "Chromatic spectrum analyzer for audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Write every analysis frame to this JSON file instead of monitoring
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Config file (default: ./chromascope.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Samples per analysis frame (FFT size)
    #[arg(short, long, default_value_t = 4096)]
    pub buffer_size: usize,

    /// Octaves below A4 covered by the note table
    #[arg(long, default_value_t = 2)]
    pub octaves_below: u32,

    /// Octaves above A4 covered by the note table
    #[arg(long, default_value_t = 3)]
    pub octaves_above: u32,

    /// Blend each note with the same pitch class in higher octaves
    #[arg(long)]
    pub overtone: bool,

    /// Smoothing window for pitch-class channels (>= 1, larger is slower)
    #[arg(long, default_value_t = 3.0)]
    pub octave_smoothing: f32,

    /// Smoothing window for note channels
    #[arg(long, default_value_t = 3.0)]
    pub note_smoothing: f32,

    /// Smoothing window for overtone-blended note channels
    #[arg(long, default_value_t = 3.0)]
    pub overtone_smoothing: f32,

    /// Window function applied before the FFT
    #[arg(long, value_enum, default_value_t = WindowKind::Bartlett)]
    pub window: WindowKind,

    /// How multichannel input is folded to mono
    #[arg(long, value_enum, default_value_t = ChannelMode::Left)]
    pub channel: ChannelMode,

    /// Consumer poll rate in monitor mode
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Run frames back to back instead of at the audio rate
    #[arg(long)]
    pub fast: bool,
}
