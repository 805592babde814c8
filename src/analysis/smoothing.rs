use serde::{Deserialize, Serialize};

use super::pitch::PITCH_CLASSES;

/// Window constants and floor for the running averages.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Window for the pitch-class channels.
    pub octave: f32,
    /// Window for the plain per-note channels.
    pub note: f32,
    /// Window for the overtone-blended per-note channels.
    pub overtone: f32,
    /// Start value, and the level silence settles to.
    pub floor: f32,
    /// Pitch-class output below this is squared.
    pub squelch: f32,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            octave: 3.0,
            note: 3.0,
            overtone: 3.0,
            floor: 0.001,
            squelch: 0.3,
        }
    }
}

/// Exponential moving average with window `n`: `avg - avg/n + sample/n`.
#[inline]
pub fn approx_rolling_average(avg: f32, sample: f32, n: f32) -> f32 {
    avg - avg / n + sample / n
}

/// Running averages for every output channel. Owned and stepped by the
/// producer only.
pub struct TemporalSmoother {
    params: SmoothingParams,
    octave: [f32; PITCH_CLASSES],
    octave_out: [f32; PITCH_CLASSES],
    note: Vec<f32>,
    note_overtone: Vec<f32>,
}

impl TemporalSmoother {
    pub fn new(params: SmoothingParams, notes: usize) -> Self {
        let mut smoother = Self {
            params,
            octave: [0.0; PITCH_CLASSES],
            octave_out: [0.0; PITCH_CLASSES],
            note: vec![0.0; notes],
            note_overtone: vec![0.0; notes],
        };
        smoother.reset();
        smoother
    }

    pub fn reset(&mut self) {
        let floor = self.params.floor;
        self.octave.fill(floor);
        self.note.fill(floor);
        self.note_overtone.fill(floor);
        self.refresh_octave_out();
    }

    /// Fold one frame into the averages.
    ///
    /// Returns `false` and leaves every average untouched when the frame
    /// holds a non-finite value. `blended` is the overtone-blended note
    /// series when that mode is on; otherwise the blended channel mirrors
    /// the plain one so switching the mode on starts from current state.
    pub fn step(
        &mut self,
        octave_sum: &[f32; PITCH_CLASSES],
        note_raw: &[f32],
        blended: Option<&[f32]>,
    ) -> bool {
        if !is_finite_frame(octave_sum, note_raw, blended) {
            return false;
        }

        let p = self.params;
        for (avg, &sample) in self.octave.iter_mut().zip(octave_sum) {
            *avg = approx_rolling_average(*avg, sample, p.octave).max(p.floor);
        }
        self.refresh_octave_out();

        for (avg, &sample) in self.note.iter_mut().zip(note_raw) {
            *avg = approx_rolling_average(*avg, sample, p.note).max(p.floor);
        }

        match blended {
            Some(blended) => {
                for (avg, &sample) in self.note_overtone.iter_mut().zip(blended) {
                    *avg = approx_rolling_average(*avg, sample, p.overtone).max(p.floor);
                }
            }
            None => self.note_overtone.copy_from_slice(&self.note),
        }

        true
    }

    /// Pitch-class output with the noise squelch applied. Only this copy is
    /// squared; the running average in `octave_average` never is.
    pub fn octave_smoothed(&self) -> &[f32; PITCH_CLASSES] {
        &self.octave_out
    }

    /// Unsquelched pitch-class running average.
    #[allow(dead_code)]
    pub fn octave_average(&self) -> &[f32; PITCH_CLASSES] {
        &self.octave
    }

    pub fn note_smoothed(&self) -> &[f32] {
        &self.note
    }

    pub fn note_overtone_smoothed(&self) -> &[f32] {
        &self.note_overtone
    }

    fn refresh_octave_out(&mut self) {
        let squelch = self.params.squelch;
        for (out, &avg) in self.octave_out.iter_mut().zip(&self.octave) {
            *out = if avg < squelch { avg * avg } else { avg };
        }
    }
}

fn is_finite_frame(octave_sum: &[f32], note_raw: &[f32], blended: Option<&[f32]>) -> bool {
    octave_sum.iter().all(|v| v.is_finite())
        && note_raw.iter().all(|v| v.is_finite())
        && blended.map_or(true, |b| b.iter().all(|v| v.is_finite()))
}
