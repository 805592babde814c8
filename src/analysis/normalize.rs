use super::bins::BinTable;
use super::pitch::PITCH_CLASSES;

/// Pulls per-note magnitudes out of a spectrum and folds them into
/// pitch classes, rescaling both series into [0, 1] by their own maxima.
pub struct FrameNormalizer;

/// Per-frame maxima found before rescaling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameMaxima {
    pub note: f32,
    pub octave: f32,
}

impl FrameNormalizer {
    /// Fill `note_raw` and `octave_sum` from `spectrum`.
    ///
    /// A series whose max is not positive (silence) is left unscaled.
    /// NaN magnitudes pass through untouched; the smoother rejects them.
    pub fn extract(
        spectrum: &[f32],
        table: &BinTable,
        note_raw: &mut [f32],
        octave_sum: &mut [f32; PITCH_CLASSES],
    ) -> FrameMaxima {
        debug_assert_eq!(note_raw.len(), table.len());
        octave_sum.fill(0.0);

        let mut maxima = FrameMaxima::default();
        for (i, (&bin, slot)) in table.bins().iter().zip(note_raw.iter_mut()).enumerate() {
            let val = spectrum.get(bin).copied().unwrap_or(0.0);
            *slot = val;
            if val > maxima.note {
                maxima.note = val;
            }

            let sum = &mut octave_sum[i % PITCH_CLASSES];
            *sum += val;
            if *sum > maxima.octave {
                maxima.octave = *sum;
            }
        }

        rescale(note_raw, maxima.note);
        rescale(octave_sum, maxima.octave);
        maxima
    }
}

fn rescale(values: &mut [f32], max: f32) {
    if max > 0.0 && max.is_finite() {
        for v in values.iter_mut() {
            *v = (*v / max).min(1.0);
        }
    }
}
