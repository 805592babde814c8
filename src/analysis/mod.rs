//! Chromatic analysis engine.
//!
//! Turns a magnitude spectrum into per-note and per-pitch-class series,
//! normalised and smoothed over time:
//!
//! spectrum → [`BinTable`] lookup → [`FrameNormalizer`] →
//! [`OvertoneAggregator`] (optional) → [`TemporalSmoother`] → [`AnalysisFrame`]
//!
//! [`Analysis`] owns all mutable state and is driven by a single producer.
//! Readers get frames through a [`FrameBuffer`].

pub mod bins;
pub mod frame;
pub mod handoff;
pub mod normalize;
pub mod overtone;
pub mod pitch;
pub mod smoothing;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::audio::spectrum::bin_for_frequency;
use crate::audio::window::WindowKind;

pub use bins::BinTable;
pub use frame::{AnalysisFrame, SoundType};
pub use handoff::FrameBuffer;
pub use normalize::FrameNormalizer;
pub use overtone::OvertoneAggregator;
pub use pitch::PITCH_CLASSES;
pub use smoothing::{SmoothingParams, TemporalSmoother};

/// Initialisation errors. Per-frame faults are never reported this way.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("buffer size must be greater than zero")]
    ZeroBufferSize,

    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("FFT of {buffer_size} samples gives {bins} bins, fewer than the {entries} scale entries")]
    TooFewBins {
        buffer_size: usize,
        bins: usize,
        entries: usize,
    },

    #[error("{count} scale frequencies lie above Nyquist ({nyquist} Hz); lower octaves_above or raise the sample rate")]
    AboveNyquist { count: usize, nyquist: f32 },

    #[error("octave window -{below}..+{above} is out of range; at most {max} octaves, lowest note above bin 0")]
    OctaveRange { below: u32, above: u32, max: u32 },

    #[error("smoothing window for {channel} must be a finite value >= 1, got {value}")]
    InvalidSmoothing { channel: &'static str, value: f32 },
}

/// Widest octave window accepted, counting the reference octave.
pub const MAX_OCTAVES: u32 = 10;

/// Parameters fixed at initialisation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalysisSettings {
    pub sample_rate: u32,
    /// Samples per frame; also the FFT size.
    pub buffer_size: usize,
    pub octaves_below: u32,
    pub octaves_above: u32,
    pub add_overtone: bool,
    pub window: WindowKind,
    pub smoothing: SmoothingParams,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 4096,
            octaves_below: 2,
            octaves_above: 3,
            add_overtone: false,
            window: WindowKind::default(),
            smoothing: SmoothingParams::default(),
        }
    }
}

impl AnalysisSettings {
    pub fn bin_count(&self) -> usize {
        self.buffer_size / 2
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.buffer_size == 0 {
            return Err(AnalysisError::ZeroBufferSize);
        }
        if self.sample_rate == 0 {
            return Err(AnalysisError::ZeroSampleRate);
        }
        let s = &self.smoothing;
        for (channel, value) in [("octave", s.octave), ("note", s.note), ("overtone", s.overtone)] {
            if !value.is_finite() || value < 1.0 {
                return Err(AnalysisError::InvalidSmoothing { channel, value });
            }
        }
        let octaves = self.octaves()?;
        let entries = octaves as usize * PITCH_CLASSES;
        if self.bin_count() < entries {
            return Err(AnalysisError::TooFewBins {
                buffer_size: self.buffer_size,
                bins: self.bin_count(),
                entries,
            });
        }
        // Only reached with a bounded window, so the negation cannot overflow.
        let lowest = pitch::PitchClass::of_entry(0).frequency(-(self.octaves_below as i32));
        if bin_for_frequency(lowest, self.sample_rate, self.bin_count()).round() < 1.0 {
            return Err(self.octave_range());
        }
        Ok(())
    }

    /// Octaves in the window, reference octave included.
    pub fn octaves(&self) -> Result<u32, AnalysisError> {
        self.octaves_below
            .checked_add(self.octaves_above)
            .and_then(|n| n.checked_add(1))
            .filter(|&n| n <= MAX_OCTAVES)
            .ok_or_else(|| self.octave_range())
    }

    fn octave_range(&self) -> AnalysisError {
        AnalysisError::OctaveRange {
            below: self.octaves_below,
            above: self.octaves_above,
            max: MAX_OCTAVES,
        }
    }

    /// Seconds of audio per frame.
    pub fn frame_period(&self) -> f32 {
        self.buffer_size as f32 / self.sample_rate as f32
    }
}

/// Shared on/off switch for overtone blending, readable from the producer
/// without locking.
#[derive(Clone, Debug, Default)]
pub struct OvertoneSwitch(Arc<AtomicBool>);

impl OvertoneSwitch {
    pub fn set(&self, on: bool) {
        self.0.store(on, Ordering::Relaxed);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The analysis engine. One instance per stream; stepped by one thread.
pub struct Analysis {
    settings: AnalysisSettings,
    table: Arc<BinTable>,
    smoother: TemporalSmoother,
    blended: Vec<f32>,
    frame: AnalysisFrame,
    add_overtone: OvertoneSwitch,
    invalid_frames: Arc<AtomicU64>,
}

impl Analysis {
    pub fn new(settings: AnalysisSettings) -> Result<Self, AnalysisError> {
        settings.validate()?;

        let table = BinTable::build(
            settings.sample_rate,
            settings.bin_count(),
            settings.octaves_below,
            settings.octaves_above,
        );
        if table.clamped() > 0 {
            return Err(AnalysisError::AboveNyquist {
                count: table.clamped(),
                nyquist: settings.sample_rate as f32 / 2.0,
            });
        }

        log::info!(
            "Bin table: {} entries over {} octaves, {} bins @ {}Hz",
            table.len(),
            table.octaves(),
            table.bin_count(),
            settings.sample_rate
        );

        let notes = table.len();
        let add_overtone = OvertoneSwitch::default();
        add_overtone.set(settings.add_overtone);

        let mut engine = Self {
            settings,
            smoother: TemporalSmoother::new(settings.smoothing, notes),
            blended: vec![0.0; notes],
            frame: AnalysisFrame::new(notes, settings.bin_count()),
            table: Arc::new(table),
            add_overtone,
            invalid_frames: Arc::new(AtomicU64::new(0)),
        };
        engine.copy_smoothed();
        Ok(engine)
    }

    /// Run one spectrum through the pipeline. Never allocates or fails;
    /// a non-finite frame holds the smoothed state and clears `frame_ready`.
    pub fn analyze_spectrum(&mut self, spectrum: &[f32]) -> &AnalysisFrame {
        let n = self.frame.spectrum.len().min(spectrum.len());
        self.frame.spectrum[..n].copy_from_slice(&spectrum[..n]);
        self.frame.spectrum[n..].fill(0.0);

        FrameNormalizer::extract(
            spectrum,
            &self.table,
            &mut self.frame.note_raw,
            &mut self.frame.octave_sum,
        );

        let overtone = self.add_overtone.get();
        let blended = if overtone {
            OvertoneAggregator::blend(&self.frame.note_raw, &mut self.blended);
            Some(&self.blended[..])
        } else {
            None
        };

        let ready = self
            .smoother
            .step(&self.frame.octave_sum, &self.frame.note_raw, blended);

        if ready {
            self.copy_smoothed();
            self.frame.overtone_active = overtone;
        } else {
            self.invalid_frames.fetch_add(1, Ordering::Relaxed);
            sanitize(&mut self.frame.note_raw);
            sanitize(&mut self.frame.octave_sum);
            sanitize(&mut self.frame.spectrum);
        }
        self.frame.frame_ready = ready;
        &self.frame
    }

    fn copy_smoothed(&mut self) {
        self.frame.octave_smoothed = *self.smoother.octave_smoothed();
        self.frame.note_smoothed.copy_from_slice(self.smoother.note_smoothed());
        self.frame
            .note_overtone
            .copy_from_slice(self.smoother.note_overtone_smoothed());
    }

    pub fn add_overtone(&self) -> bool {
        self.add_overtone.get()
    }

    /// Counter of frames rejected as non-finite.
    pub fn invalid_frame_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.invalid_frames)
    }

    pub fn scale_size(&self) -> usize {
        self.table.len()
    }

    pub fn table(&self) -> Arc<BinTable> {
        Arc::clone(&self.table)
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }
}

/// Direct read access for callers driving the engine in-thread. The live
/// monitor reads through a [`FrameBuffer`] instead.
#[allow(dead_code)]
impl Analysis {
    /// Turn overtone blending on or off from the next frame on.
    pub fn set_add_overtone(&self, on: bool) {
        self.add_overtone.set(on);
    }

    pub fn is_frame_ready(&self) -> bool {
        self.frame.frame_ready
    }

    pub fn frame(&self) -> &AnalysisFrame {
        &self.frame
    }

    pub fn octave_sum(&self) -> &[f32] {
        &self.frame.octave_sum
    }

    pub fn note_raw(&self) -> &[f32] {
        &self.frame.note_raw
    }

    /// Pitch-class output. Values under the squelch level are squared here;
    /// the running average they come from is not.
    pub fn octave_smoothed(&self) -> &[f32] {
        &self.frame.octave_smoothed
    }

    /// Smoothed notes; overtone-blended when that mode was on for the
    /// last valid frame.
    pub fn note_smoothed(&self) -> &[f32] {
        self.frame.notes()
    }

    pub fn data(&self, kind: SoundType) -> &[f32] {
        self.frame.data(kind)
    }

    pub fn size(&self, kind: SoundType) -> usize {
        self.frame.size(kind)
    }

    pub fn octave_size(&self) -> usize {
        PITCH_CLASSES
    }

    /// Return smoothing to its start state. Only call while no frames are
    /// being produced.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.copy_smoothed();
        self.frame.frame_ready = false;
    }
}

fn sanitize(values: &mut [f32]) {
    for v in values.iter_mut().filter(|v| !v.is_finite()) {
        *v = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            sample_rate: 44100,
            buffer_size: 2048,
            ..AnalysisSettings::default()
        }
    }

    fn spike(engine: &Analysis, freq: f32, magnitude: f32) -> Vec<f32> {
        let bins = engine.settings().bin_count();
        let mut spectrum = vec![0.0; bins];
        let bin = crate::audio::spectrum::bin_for_frequency(freq, 44100, bins).round() as usize;
        spectrum[bin] = magnitude;
        spectrum
    }

    #[test]
    fn rejects_zero_buffer() {
        let s = AnalysisSettings { buffer_size: 0, ..settings() };
        assert_eq!(Analysis::new(s).err(), Some(AnalysisError::ZeroBufferSize));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let s = AnalysisSettings { sample_rate: 0, ..settings() };
        assert_eq!(Analysis::new(s).err(), Some(AnalysisError::ZeroSampleRate));
    }

    #[test]
    fn rejects_tiny_fft() {
        let s = AnalysisSettings { buffer_size: 64, ..settings() };
        assert!(matches!(
            Analysis::new(s),
            Err(AnalysisError::TooFewBins { bins: 32, entries: 72, .. })
        ));
    }

    #[test]
    fn fails_fast_instead_of_clamping() {
        let s = AnalysisSettings { sample_rate: 8000, ..settings() };
        assert!(matches!(Analysis::new(s), Err(AnalysisError::AboveNyquist { .. })));
    }

    #[test]
    fn rejects_sub_unit_smoothing() {
        let mut s = settings();
        s.smoothing.overtone = 0.5;
        assert!(matches!(
            Analysis::new(s),
            Err(AnalysisError::InvalidSmoothing { channel: "overtone", .. })
        ));
    }

    #[test]
    fn a440_spike_end_to_end() {
        let mut engine = Analysis::new(settings()).unwrap();
        assert_eq!(engine.scale_size(), 72);
        let spectrum = spike(&engine, 440.0, 1.0);
        let frame = engine.analyze_spectrum(&spectrum);

        assert!(frame.frame_ready);
        assert_eq!(frame.note_raw[24], 1.0);
        assert_eq!(frame.note_raw.iter().filter(|&&v| v != 0.0).count(), 1);
        assert_eq!(frame.octave_sum[0], 1.0);
        assert!(frame.octave_sum[1..].iter().all(|&v| v == 0.0));
        assert!(frame.note_smoothed[24] > frame.note_smoothed[25]);
    }

    #[test]
    fn nan_frame_holds_smoothed_output() {
        let mut engine = Analysis::new(settings()).unwrap();
        let spectrum = spike(&engine, 440.0, 1.0);
        for _ in 0..4 {
            engine.analyze_spectrum(&spectrum);
        }
        let before = engine.frame().clone();

        let poisoned = vec![f32::NAN; engine.settings().bin_count()];
        let frame = engine.analyze_spectrum(&poisoned);
        assert!(!frame.frame_ready);
        assert_eq!(frame.note_smoothed, before.note_smoothed);
        assert_eq!(frame.octave_smoothed, before.octave_smoothed);
        assert!(frame.is_sane());
        assert_eq!(engine.invalid_frame_counter().load(Ordering::Relaxed), 1);

        for _ in 0..20 {
            assert!(engine.analyze_spectrum(&spectrum).frame_ready);
        }
        assert!(engine.frame().is_sane());
    }

    #[test]
    fn silence_is_valid_and_fades_to_floor() {
        let mut engine = Analysis::new(settings()).unwrap();
        let loud = spike(&engine, 440.0, 1.0);
        for _ in 0..10 {
            engine.analyze_spectrum(&loud);
        }
        let quiet = vec![0.0; engine.settings().bin_count()];
        for _ in 0..200 {
            assert!(engine.analyze_spectrum(&quiet).frame_ready);
        }
        let frame = engine.frame();
        assert!(frame.note_raw.iter().all(|&v| v == 0.0));
        assert!(frame.note_smoothed.iter().all(|&v| v == 0.001));
    }

    #[test]
    fn overtone_toggle_switches_note_series() {
        let mut engine = Analysis::new(settings()).unwrap();
        // Low A: blending with silent upper octaves halves it.
        let spectrum = spike(&engine, 110.0, 1.0);

        engine.analyze_spectrum(&spectrum);
        assert_eq!(engine.note_smoothed(), &engine.frame().note_smoothed[..]);

        engine.set_add_overtone(true);
        assert!(engine.add_overtone());
        for _ in 0..30 {
            engine.analyze_spectrum(&spectrum);
        }
        let plain = engine.frame().note_smoothed[0];
        let blended = engine.note_smoothed()[0];
        assert!((plain - 1.0).abs() < 0.01);
        assert!((blended - 0.5).abs() < 0.01);
    }

    #[test]
    fn toggle_on_invalid_frame_keeps_published_notes() {
        let mut engine = Analysis::new(settings()).unwrap();
        engine.set_add_overtone(true);
        let spectrum = spike(&engine, 110.0, 1.0);
        for _ in 0..30 {
            engine.analyze_spectrum(&spectrum);
        }
        let before = engine.note_smoothed().to_vec();
        assert!((before[0] - 0.5).abs() < 0.01);

        engine.set_add_overtone(false);
        let poisoned = vec![f32::NAN; engine.settings().bin_count()];
        assert!(!engine.analyze_spectrum(&poisoned).frame_ready);
        assert!(engine.frame().overtone_active);
        assert_eq!(engine.note_smoothed(), &before[..]);

        // The next valid frame picks up the new mode.
        assert!(!engine.analyze_spectrum(&spectrum).overtone_active);
        assert!(engine.note_smoothed()[0] > 0.9);
    }

    #[test]
    fn accessors_mirror_frame_fields() {
        let mut engine = Analysis::new(settings()).unwrap();
        let spectrum = spike(&engine, 440.0, 0.8);
        engine.analyze_spectrum(&spectrum);
        let frame = engine.frame().clone();

        assert!(engine.is_frame_ready());
        assert_eq!(engine.octave_sum(), &frame.octave_sum[..]);
        assert_eq!(engine.note_raw(), &frame.note_raw[..]);
        assert_eq!(engine.octave_smoothed(), &frame.octave_smoothed[..]);
        assert_eq!(engine.note_smoothed(), &frame.note_smoothed[..]);
        assert_eq!(engine.data(SoundType::RawFull), &spectrum[..]);
        assert_eq!(engine.data(SoundType::RawOctave), engine.octave_sum());
        assert_eq!(engine.data(SoundType::SmoothOctave), engine.octave_smoothed());
        assert_eq!(engine.data(SoundType::RawScale), engine.note_raw());
        assert_eq!(engine.data(SoundType::SmoothScale), &frame.note_smoothed[..]);
        assert_eq!(engine.data(SoundType::SmoothScaleOvertone), &frame.note_overtone[..]);
        assert!(!engine.add_overtone());
    }

    #[test]
    fn rejects_overflowing_octave_window() {
        let s = AnalysisSettings { octaves_above: u32::MAX, ..settings() };
        assert!(matches!(Analysis::new(s), Err(AnalysisError::OctaveRange { .. })));

        let s = AnalysisSettings { octaves_below: u32::MAX, octaves_above: 1, ..settings() };
        assert!(matches!(Analysis::new(s), Err(AnalysisError::OctaveRange { .. })));

        let s = AnalysisSettings { octaves_below: 6, octaves_above: 4, ..settings() };
        assert!(matches!(Analysis::new(s), Err(AnalysisError::OctaveRange { max: 10, .. })));
    }

    #[test]
    fn rejects_octaves_below_first_bin() {
        // 440 / 2^6 = 6.9 Hz lands on bin 0 of a 1024-bin spectrum.
        let s = AnalysisSettings { octaves_below: 6, octaves_above: 0, ..settings() };
        assert!(matches!(
            Analysis::new(s),
            Err(AnalysisError::OctaveRange { below: 6, above: 0, .. })
        ));
    }

    #[test]
    fn channel_sizes() {
        let engine = Analysis::new(settings()).unwrap();
        assert_eq!(engine.size(SoundType::RawFull), 1024);
        assert_eq!(engine.size(SoundType::RawOctave), 12);
        assert_eq!(engine.size(SoundType::SmoothScale), 72);
        assert_eq!(engine.octave_size(), 12);
    }

    #[test]
    fn reset_returns_to_floor() {
        let mut engine = Analysis::new(settings()).unwrap();
        let spectrum = spike(&engine, 440.0, 1.0);
        engine.analyze_spectrum(&spectrum);
        engine.reset();
        assert!(!engine.is_frame_ready());
        assert!(engine.frame().note_smoothed.iter().all(|&v| v == 0.001));
    }
}
