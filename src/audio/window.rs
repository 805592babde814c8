use serde::Deserialize;
use std::f32::consts::PI;

/// Taper applied to each PCM frame before the transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Bartlett,
    Hann,
    Hamming,
    Rectangular,
}

impl WindowKind {
    pub fn value(self, index: usize, size: usize) -> f32 {
        if size <= 1 {
            return 1.0;
        }
        let x = index as f32 / (size - 1) as f32;
        match self {
            WindowKind::Bartlett => 1.0 - (2.0 * x - 1.0).abs(),
            WindowKind::Hann => 0.5 * (1.0 - (2.0 * PI * x).cos()),
            WindowKind::Hamming => 0.54 - 0.46 * (2.0 * PI * x).cos(),
            WindowKind::Rectangular => 1.0,
        }
    }

    pub fn coefficients(self, size: usize) -> Vec<f32> {
        (0..size).map(|i| self.value(i, size)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tapered_windows_peak_in_the_middle() {
        let size = 1025;
        for kind in [WindowKind::Bartlett, WindowKind::Hann] {
            assert!(kind.value(0, size).abs() < 0.01);
            assert!(kind.value(size - 1, size).abs() < 0.01);
            assert!((kind.value(size / 2, size) - 1.0).abs() < 0.01);
        }
        assert!((WindowKind::Hamming.value(0, size) - 0.08).abs() < 0.01);
    }

    #[test]
    fn rectangular_is_flat() {
        assert!(WindowKind::Rectangular.coefficients(64).iter().all(|&w| w == 1.0));
    }

    #[test]
    fn degenerate_sizes() {
        assert_eq!(WindowKind::Hann.coefficients(1), vec![1.0]);
        assert!(WindowKind::Bartlett.coefficients(0).is_empty());
    }
}
