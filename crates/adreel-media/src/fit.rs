//! Fit-mode selection against the output canvas.

use adreel_models::{AspectRatio, FitMode};

/// Default relative aspect-ratio tolerance for `cover`.
pub const DEFAULT_FIT_TOLERANCE: f64 = 0.02;

/// Decides whether an asset is cropped (`cover`) or letterboxed (`contain`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPolicy {
    pub canvas: AspectRatio,
    /// Maximum relative deviation `|asset - canvas| / canvas` still covered
    pub tolerance: f64,
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self {
            canvas: AspectRatio::PORTRAIT,
            tolerance: DEFAULT_FIT_TOLERANCE,
        }
    }
}

impl FitPolicy {
    pub fn new(canvas: AspectRatio, tolerance: f64) -> Self {
        Self {
            canvas,
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.max(0.0);
        self
    }

    /// Choose the fit mode for an asset of the given dimensions.
    ///
    /// Unknown (zero) dimensions are treated as covering.
    pub fn decide(&self, width: u32, height: u32) -> FitMode {
        if width == 0 || height == 0 {
            return FitMode::Cover;
        }
        let canvas = self.canvas.as_f64();
        let asset = width as f64 / height as f64;
        let deviation = (asset - canvas).abs() / canvas;
        if deviation <= self.tolerance {
            FitMode::Cover
        } else {
            FitMode::Contain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_on_portrait_contains() {
        let policy = FitPolicy::default().with_tolerance(0.05);
        assert_eq!(policy.decide(1920, 1080), FitMode::Contain);
    }

    #[test]
    fn test_matching_ratio_covers() {
        let policy = FitPolicy::default().with_tolerance(0.05);
        assert_eq!(policy.decide(1080, 1920), FitMode::Cover);
        assert_eq!(policy.decide(720, 1280), FitMode::Cover);
    }

    #[test]
    fn test_tolerance_boundary() {
        // 1080x1850 deviates ~3.8% from 9:16
        assert_eq!(FitPolicy::default().decide(1080, 1850), FitMode::Contain);
        assert_eq!(
            FitPolicy::default().with_tolerance(0.05).decide(1080, 1850),
            FitMode::Cover
        );
    }

    #[test]
    fn test_zero_dimensions_cover() {
        assert_eq!(FitPolicy::default().decide(0, 1920), FitMode::Cover);
        assert_eq!(FitPolicy::default().decide(1080, 0), FitMode::Cover);
    }
}
