use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::window::WindowKind;

/// Fractional FFT bin for `freq` in a spectrum of `bin_count` bins
/// spanning 0..Nyquist.
pub fn bin_for_frequency(freq: f32, sample_rate: u32, bin_count: usize) -> f32 {
    freq * bin_count as f32 / (sample_rate as f32 / 2.0)
}

/// Windowed forward FFT producing a magnitude spectrum of `size / 2` bins.
///
/// All buffers are allocated up front; `magnitude_spectrum` does not
/// allocate.
pub struct SpectrumTransform {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectrumTransform {
    pub fn new(size: usize, window: WindowKind) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self::with_planner(&mut planner, size, window)
    }

    /// Reuse an existing planner (one per worker thread).
    pub fn with_planner(
        planner: &mut FftPlanner<f32>,
        size: usize,
        window: WindowKind,
    ) -> Self {
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            window: window.coefficients(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            magnitudes: vec![0.0; size / 2],
        }
    }

    /// Transform one PCM frame.
    ///
    /// The frame is scaled so its peak is 1 before windowing; a silent
    /// frame stays silent. Short frames are zero-padded, long ones truncated.
    pub fn magnitude_spectrum(&mut self, samples: &[f32]) -> &[f32] {
        let size = self.buffer.len();
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        let gain = if peak > 0.0 && peak.is_finite() { 1.0 / peak } else { 1.0 };

        for (i, (slot, &w)) in self.buffer.iter_mut().zip(&self.window).enumerate() {
            let s = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(s * gain * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 2.0 / size.max(1) as f32;
        for (mag, c) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = c.norm() * scale;
        }
        &self.magnitudes
    }

    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }
}
