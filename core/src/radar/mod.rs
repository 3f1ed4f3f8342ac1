//! Radar-level transforms and estimators built from the algorithm blocks.

pub mod capon;
pub mod dbf;
pub mod doppler_spectrogram;
pub mod monopulse;
pub mod peak_search;
pub mod rai;
pub mod range_spectrum;
pub mod rdm;
pub mod spectrum_axis;

use ndarray::ArrayViewMut2;
use serde::{Deserialize, Serialize};

use crate::prelude::Float;

pub use capon::{AngleCapon, AngleCaponConfig};
pub use dbf::{Dbf, DbfConfig};
pub use doppler_spectrogram::{DopplerSpectrogram, DopplerSpectrogramConfig};
pub use monopulse::AngleMonopulse;
pub use peak_search::{PeakSearch, PeakSearchConfig};
pub use rai::{RangeAngleImage, RangeAngleImageConfig};
pub use range_spectrum::{RangeSpectrum, RangeSpectrumConfig, RangeSpectrumMode};
pub use rdm::{RangeDopplerMap, RangeDopplerMapConfig};

/// Lowest reportable linear magnitude, i.e. -120 dB.
pub const CLIPPING_VALUE: Float = 1e-6;

/// Output scale of a magnitude spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    Linear,
    /// `20·log10(magnitude)`
    Db20,
    /// `10·log10(magnitude)`
    Db10,
}

impl ScaleType {
    /// Clamps `magnitude` to at least `threshold` and converts it to this scale.
    pub fn convert(self, magnitude: Float, threshold: Float) -> Float {
        let value = magnitude.max(threshold);
        match self {
            ScaleType::Linear => value,
            ScaleType::Db20 => 20.0 * value.log10(),
            ScaleType::Db10 => 10.0 * value.log10(),
        }
    }
}

/// Spectrum thresholds are kept at or above [`CLIPPING_VALUE`].
pub(crate) fn clamp_threshold(threshold: Float) -> Float {
    if threshold < CLIPPING_VALUE {
        CLIPPING_VALUE
    } else {
        threshold
    }
}

/// Moves every row down by one; row 0 keeps its old content.
pub(crate) fn shift_rows_down<T: Copy>(matrix: &mut ArrayViewMut2<T>) {
    let (rows, cols) = matrix.dim();
    for r in (1..rows).rev() {
        for c in 0..cols {
            matrix[[r, c]] = matrix[[r - 1, c]];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn scale_conversion_clamps_first() {
        assert_eq!(ScaleType::Linear.convert(0.5, 1e-6), 0.5);
        assert_eq!(ScaleType::Linear.convert(1e-9, 1e-6), 1e-6);
        assert!((ScaleType::Db20.convert(10.0, 1e-6) - 20.0).abs() < 1e-5);
        assert!((ScaleType::Db10.convert(100.0, 1e-6) - 20.0).abs() < 1e-5);
        assert!((ScaleType::Db20.convert(0.0, CLIPPING_VALUE) + 120.0).abs() < 1e-3);
    }

    #[test]
    fn rows_move_down() {
        let mut m = array![[1, 1], [2, 2], [3, 3]];
        shift_rows_down(&mut m.view_mut());
        assert_eq!(m, array![[1, 1], [1, 1], [2, 2]]);
        assert_eq!(clamp_threshold(0.0), CLIPPING_VALUE);
        assert_eq!(clamp_threshold(0.5), 0.5);
    }
}
