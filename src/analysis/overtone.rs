use super::pitch::PITCH_CLASSES;

/// Blends each note with the mean of the same pitch class in every higher
/// octave. Stateless; entries in the top octave pass through unchanged.
pub struct OvertoneAggregator;

impl OvertoneAggregator {
    pub fn blend(note_raw: &[f32], blended: &mut [f32]) {
        debug_assert_eq!(note_raw.len(), blended.len());
        for (i, out) in blended.iter_mut().enumerate() {
            let mut overtone = 0.0;
            let mut count = 0;
            for &v in note_raw.iter().skip(i + PITCH_CLASSES).step_by(PITCH_CLASSES) {
                overtone += v;
                count += 1;
            }
            *out = if count > 0 {
                (note_raw[i] + overtone / count as f32) / 2.0
            } else {
                note_raw[i]
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.013) % 1.0).collect()
    }

    #[test]
    fn top_octave_is_identity() {
        let raw = ramp(72);
        let mut out = vec![0.0; 72];
        OvertoneAggregator::blend(&raw, &mut out);
        assert_eq!(&out[60..], &raw[60..]);
    }

    #[test]
    fn averages_higher_octaves() {
        // Three octaves; pitch 0 holds 0.2, 0.4, 0.8 going up.
        let mut raw = vec![0.0; 36];
        raw[0] = 0.2;
        raw[12] = 0.4;
        raw[24] = 0.8;
        let mut out = vec![0.0; 36];
        OvertoneAggregator::blend(&raw, &mut out);

        // (0.2 + (0.4 + 0.8) / 2) / 2
        assert!((out[0] - 0.4).abs() < 1e-6);
        // (0.4 + 0.8) / 2
        assert!((out[12] - 0.6).abs() < 1e-6);
        assert_eq!(out[24], 0.8);
        // Other pitch classes stay silent.
        assert!(out.iter().enumerate().all(|(i, &v)| i % 12 == 0 || v == 0.0));
    }

    #[test]
    fn single_octave_passes_through() {
        let raw = ramp(12);
        let mut out = vec![0.0; 12];
        OvertoneAggregator::blend(&raw, &mut out);
        assert_eq!(out, raw);
    }
}
