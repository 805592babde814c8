use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rustfft::FftPlanner;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analysis::pitch::NOTE_NAMES;
use crate::analysis::{Analysis, AnalysisFrame, AnalysisSettings};
use crate::audio::decode::AudioData;
use crate::audio::spectrum::SpectrumTransform;

#[derive(Serialize)]
pub struct ExportFrame {
    pub time: f32,
    #[serde(flatten)]
    pub frame: AnalysisFrame,
}

#[derive(Serialize)]
pub struct Export {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub add_overtone: bool,
    pub pitch_classes: Vec<&'static str>,
    pub notes: Vec<String>,
    pub frames: Vec<ExportFrame>,
}

/// Analyse a whole file.
///
/// Spectra are independent and computed in parallel, one planner per
/// worker. Smoothing depends on frame order, so the engine then runs over
/// them sequentially.
pub fn analyze_file(audio: &AudioData, settings: AnalysisSettings) -> Result<Export> {
    let mut analysis = Analysis::new(settings)?;
    let size = settings.buffer_size;
    let total = audio.frame_count(size);

    log::info!("Pass 1: Per-frame FFT ({} frames)...", total);
    let chunks: Vec<&[f32]> = audio.frames(size).collect();
    let spectra: Vec<Vec<f32>> = chunks
        .par_iter()
        .map_init(
            || {
                let mut planner = FftPlanner::<f32>::new();
                SpectrumTransform::with_planner(&mut planner, size, settings.window)
            },
            |transform, samples| transform.magnitude_spectrum(samples).to_vec(),
        )
        .collect();

    log::info!("Pass 2: Chromatic analysis & smoothing...");
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let period = settings.frame_period();
    let mut frames = Vec::with_capacity(total);
    for (i, spectrum) in spectra.iter().enumerate() {
        let frame = analysis.analyze_spectrum(spectrum).clone();
        frames.push(ExportFrame {
            time: i as f32 * period,
            frame,
        });
        pb.inc(1);
    }
    pb.finish_with_message("Analysis complete");

    let invalid = frames.iter().filter(|f| !f.frame.frame_ready).count();
    if invalid > 0 {
        log::warn!("{} of {} frames were not usable", invalid, total);
    }

    let table = analysis.table();
    Ok(Export {
        sample_rate: settings.sample_rate,
        buffer_size: size,
        add_overtone: analysis.add_overtone(),
        pitch_classes: NOTE_NAMES.to_vec(),
        notes: table.entries().iter().map(|e| e.label()).collect(),
        frames,
    })
}

pub fn write_json(export: &Export, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, export).context("Failed to serialize analysis")?;
    writer.flush()?;
    log::info!(
        "Wrote {} frames to {}",
        export.frames.len(),
        path.display()
    );
    Ok(())
}
