use crate::audio::spectrum::bin_for_frequency;

use super::pitch::{PitchClass, ScaleEntry, PITCH_CLASSES};

/// FFT bin index for every ScaleEntry, octave-major (`index = octave * 12 + pitch`).
///
/// Built once from (sample rate, bin count, octave window) and read-only
/// afterwards, so it can be shared across threads behind an `Arc`.
#[derive(Clone, Debug)]
pub struct BinTable {
    bins: Vec<usize>,
    entries: Vec<ScaleEntry>,
    bin_count: usize,
    clamped: usize,
}

impl BinTable {
    /// Map each (pitch class, octave) in `[-octaves_below, octaves_above]`
    /// to its nearest FFT bin.
    ///
    /// Bins past the end of the spectrum are clamped to the last bin so the
    /// table length stays `12 * octaves`; `clamped()` reports how many were.
    /// The window must already be bounded, see `AnalysisSettings::validate`.
    pub fn build(
        sample_rate: u32,
        bin_count: usize,
        octaves_below: u32,
        octaves_above: u32,
    ) -> Self {
        let octaves = octaves_below as usize + octaves_above as usize + 1;
        let mut bins = Vec::with_capacity(octaves * PITCH_CLASSES);
        let mut entries = Vec::with_capacity(octaves * PITCH_CLASSES);
        let last = bin_count.saturating_sub(1);
        let mut clamped = 0;

        for octave in -(octaves_below as i32)..=(octaves_above as i32) {
            for pitch in 0..PITCH_CLASSES {
                let entry = ScaleEntry {
                    pitch: PitchClass::of_entry(pitch),
                    octave,
                };
                let bin = bin_for_frequency(entry.frequency(), sample_rate, bin_count).round() as usize;
                if bin > last {
                    clamped += 1;
                }
                bins.push(bin.min(last));
                entries.push(entry);
            }
        }

        Self {
            bins,
            entries,
            bin_count,
            clamped,
        }
    }

    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    pub fn entries(&self) -> &[ScaleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn octaves(&self) -> usize {
        self.bins.len() / PITCH_CLASSES
    }

    /// Spectrum length this table was built for.
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn clamped(&self) -> usize {
        self.clamped
    }

    /// Table index of a pitch class at an octave offset, if inside the window.
    #[allow(dead_code)]
    pub fn index_of(&self, pitch: PitchClass, octave: i32) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.pitch == pitch && e.octave == octave)
    }
}
