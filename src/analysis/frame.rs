use serde::Serialize;

use super::pitch::PITCH_CLASSES;

/// Selects one output series of an analysis frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundType {
    /// Full magnitude spectrum as delivered by the transform.
    RawFull,
    RawOctave,
    SmoothOctave,
    RawScale,
    SmoothScale,
    /// Smoothed notes blended with their overtones.
    SmoothScaleOvertone,
}

/// One analysis cycle's output. Lengths are fixed when the engine is built,
/// so copying one frame into another never reallocates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisFrame {
    pub octave_sum: [f32; PITCH_CLASSES],
    pub octave_smoothed: [f32; PITCH_CLASSES],
    pub note_raw: Vec<f32>,
    pub note_smoothed: Vec<f32>,
    pub note_overtone: Vec<f32>,
    #[serde(skip)]
    pub spectrum: Vec<f32>,
    /// Overtone blending was on when this frame was produced.
    pub overtone_active: bool,
    pub frame_ready: bool,
}

impl AnalysisFrame {
    pub fn new(notes: usize, bins: usize) -> Self {
        Self {
            octave_sum: [0.0; PITCH_CLASSES],
            octave_smoothed: [0.0; PITCH_CLASSES],
            note_raw: vec![0.0; notes],
            note_smoothed: vec![0.0; notes],
            note_overtone: vec![0.0; notes],
            spectrum: vec![0.0; bins],
            overtone_active: false,
            frame_ready: false,
        }
    }

    /// Overwrite with `other`. Panics if the shapes differ.
    pub fn copy_from(&mut self, other: &AnalysisFrame) {
        self.octave_sum = other.octave_sum;
        self.octave_smoothed = other.octave_smoothed;
        self.note_raw.copy_from_slice(&other.note_raw);
        self.note_smoothed.copy_from_slice(&other.note_smoothed);
        self.note_overtone.copy_from_slice(&other.note_overtone);
        self.spectrum.copy_from_slice(&other.spectrum);
        self.overtone_active = other.overtone_active;
        self.frame_ready = other.frame_ready;
    }

    /// Smoothed notes in the mode the frame was produced with.
    pub fn notes(&self) -> &[f32] {
        if self.overtone_active {
            &self.note_overtone
        } else {
            &self.note_smoothed
        }
    }

    pub fn data(&self, kind: SoundType) -> &[f32] {
        match kind {
            SoundType::RawFull => &self.spectrum,
            SoundType::RawOctave => &self.octave_sum,
            SoundType::SmoothOctave => &self.octave_smoothed,
            SoundType::RawScale => &self.note_raw,
            SoundType::SmoothScale => &self.note_smoothed,
            SoundType::SmoothScaleOvertone => &self.note_overtone,
        }
    }

    pub fn size(&self, kind: SoundType) -> usize {
        self.data(kind).len()
    }

    /// Index of the loudest smoothed pitch class, if any rises above `min`.
    pub fn dominant_pitch(&self, min: f32) -> Option<usize> {
        self.octave_smoothed
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > min)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }

    /// True when every published value is finite.
    pub fn is_sane(&self) -> bool {
        [
            &self.octave_sum[..],
            &self.octave_smoothed[..],
            &self.note_raw[..],
            &self.note_smoothed[..],
            &self.note_overtone[..],
        ]
        .iter()
        .all(|s| s.iter().all(|v| v.is_finite()))
    }
}
