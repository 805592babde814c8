use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::SmoothingParams;
use crate::audio::decode::ChannelMode;
use crate::audio::window::WindowKind;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_octaves_below")]
    pub octaves_below: u32,
    #[serde(default = "default_octaves_above")]
    pub octaves_above: u32,
    #[serde(default)]
    pub add_overtone: bool,
    #[serde(default)]
    pub window: WindowKind,
    #[serde(default)]
    pub smoothing: SmoothingParams,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_realtime")]
    pub realtime: bool,
    #[serde(default)]
    pub channel: ChannelMode,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            octaves_below: default_octaves_below(),
            octaves_above: default_octaves_above(),
            add_overtone: false,
            window: WindowKind::default(),
            smoothing: SmoothingParams::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            realtime: default_realtime(),
            channel: ChannelMode::default(),
        }
    }
}

fn default_buffer_size() -> usize { 4096 }
fn default_octaves_below() -> u32 { 2 }
fn default_octaves_above() -> u32 { 3 }
fn default_fps() -> u32 { 30 }
fn default_realtime() -> bool { true }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

/// `./chromascope.toml`, then `~/.config/chromascope/config.toml`, then the
/// platform config directory.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("chromascope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("chromascope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("chromascope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.analysis.buffer_size, 4096);
        assert_eq!(config.analysis.octaves_below, 2);
        assert_eq!(config.analysis.octaves_above, 3);
        assert_eq!(config.analysis.window, WindowKind::Bartlett);
        assert_eq!(config.analysis.smoothing, SmoothingParams::default());
        assert_eq!(config.playback.fps, 30);
        assert!(config.playback.realtime);
    }

    #[test]
    fn partial_tables_merge_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [analysis]
            buffer_size = 2048
            add_overtone = true
            window = "hann"

            [analysis.smoothing]
            overtone = 6.0

            [playback]
            channel = "mix"
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.buffer_size, 2048);
        assert!(config.analysis.add_overtone);
        assert_eq!(config.analysis.window, WindowKind::Hann);
        assert_eq!(config.analysis.smoothing.overtone, 6.0);
        assert_eq!(config.analysis.smoothing.note, 3.0);
        assert_eq!(config.playback.channel, ChannelMode::Mix);
        assert_eq!(config.playback.fps, 30);
    }

    #[test]
    fn unknown_window_is_rejected() {
        assert!(toml::from_str::<Config>("[analysis]\nwindow = \"kaiser\"").is_err());
    }
}
