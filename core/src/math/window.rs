use serde::{Deserialize, Serialize};

use crate::containers::VectorR;
use crate::prelude::{Float, RadarError, RadarResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Rect,
    Hann,
    Hamming,
    Blackman,
    BlackmanHarris,
    /// Dolph-Chebyshev; `at_db` is the sidelobe attenuation in dB.
    Chebyshev,
    FlatTop,
    Bartlett,
}

/// Window shape, length and post-scale.
///
/// `scale` is applied after construction (and after normalization when the
/// normalized variant is requested); `0` and `1` leave the window untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub window_type: WindowType,
    pub length: usize,
    pub at_db: Float,
    pub scale: Float,
}

impl WindowConfig {
    pub fn new(window_type: WindowType, length: usize) -> Self {
        Self {
            window_type,
            length,
            at_db: 100.0,
            scale: 1.0,
        }
    }

    pub fn chebyshev(length: usize, at_db: Float) -> Self {
        Self {
            window_type: WindowType::Chebyshev,
            length,
            at_db,
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: Float) -> Self {
        self.scale = scale;
        self
    }

    fn validate(&self) -> RadarResult<()> {
        if self.length == 0 {
            return Err(RadarError::ArgumentInvalid("window length is zero".into()));
        }
        if self.window_type == WindowType::Chebyshev && !(self.at_db > 0.0) {
            return Err(RadarError::ArgumentOutOfBounds(format!(
                "chebyshev attenuation {} dB must be positive",
                self.at_db
            )));
        }
        Ok(())
    }
}

/// Builds the un-normalized window described by `config`.
pub fn build(config: &WindowConfig) -> RadarResult<VectorR> {
    config.validate()?;
    let mut window = raw_window(config);
    apply_scale(&mut window, config.scale);
    Ok(window)
}

/// Builds the window and divides each element by the window sum.
pub fn build_normalized(config: &WindowConfig) -> RadarResult<VectorR> {
    config.validate()?;
    let mut window = raw_window(config);
    let total = window.sum();
    if total <= 0.0 {
        return Err(RadarError::NotPossible("window sum is not positive".into()));
    }
    window.mapv_inplace(|v| v / total);
    apply_scale(&mut window, config.scale);
    Ok(window)
}

fn apply_scale(window: &mut VectorR, scale: Float) {
    if scale != 0.0 && scale != 1.0 {
        window.mapv_inplace(|v| v * scale);
    }
}

fn raw_window(config: &WindowConfig) -> VectorR {
    let n = config.length;
    if n == 1 {
        return VectorR::ones(1);
    }
    let denom = (n - 1) as f64;
    let cosine_sum = |coefficients: &[f64]| {
        VectorR::from_shape_fn(n, |i| {
            let phi = 2.0 * std::f64::consts::PI * i as f64 / denom;
            coefficients
                .iter()
                .enumerate()
                .map(|(k, a)| {
                    let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                    sign * a * (k as f64 * phi).cos()
                })
                .sum::<f64>() as Float
        })
    };

    match config.window_type {
        WindowType::Rect => VectorR::ones(n),
        WindowType::Hann => cosine_sum(&[0.5, 0.5]),
        WindowType::Hamming => cosine_sum(&[0.54, 0.46]),
        WindowType::Blackman => cosine_sum(&[0.42, 0.5, 0.08]),
        WindowType::BlackmanHarris => cosine_sum(&[0.35875, 0.48829, 0.14128, 0.01168]),
        WindowType::FlatTop => cosine_sum(&[
            0.215_578_95,
            0.416_631_58,
            0.277_263_158,
            0.083_578_947,
            0.006_947_368,
        ]),
        WindowType::Bartlett => {
            VectorR::from_shape_fn(n, |i| (1.0 - (2.0 * i as f64 / denom - 1.0).abs()) as Float)
        }
        WindowType::Chebyshev => chebyshev(n, config.at_db as f64),
    }
}

fn acos_one_minus(x: f64) -> f64 {
    if x < 0.01 {
        // Taylor expansion around x = 0.
        let x2 = x * x;
        let x3 = x * x2;
        let x4 = x2 * x2;
        (2.0 * x).sqrt() * (1.0 + x / 12.0 + 3.0 * x2 / 160.0 + 5.0 * x3 / 896.0 + 35.0 * x4 / 18432.0)
    } else {
        (1.0 - x).acos()
    }
}

fn acosh_one_plus(x: f64) -> f64 {
    (x + (x * (x + 2.0)).sqrt()).ln_1p()
}

fn cos_minus_one(x: f64) -> f64 {
    let s = (x / 2.0).sin();
    -2.0 * s * s
}

fn cosh_minus_one(x: f64) -> f64 {
    let s = (x / 2.0).sinh();
    2.0 * s * s
}

/// Chebyshev polynomial of order `n` evaluated at `x + 1`.
fn chebyshev_poly_shifted(n: usize, x: f64) -> f64 {
    if (-2.0..0.0).contains(&x) {
        (n as f64 * acos_one_minus(-x)).cos()
    } else {
        (n as f64 * acosh_one_plus(x)).cosh()
    }
}

fn chebyshev(n: usize, at_db: f64) -> VectorR {
    let ripple = 10f64.powf(at_db / 20.0);
    let x0_minus_one = cosh_minus_one(ripple.acosh() / (n - 1) as f64);
    let mut values = vec![0.0f64; n];
    let mut max_value = 0.0f64;

    for j in 0..n / 2 + 1 {
        let t = j as f64 + 0.5;
        let mut sign = -1.0;
        let mut sum = 0.0;
        for i in 1..(n - 1) / 2 + 1 {
            let cm1 = cos_minus_one(i as f64 * std::f64::consts::PI / n as f64);
            let arg = cm1 + x0_minus_one * (1.0 + cm1);
            sum += sign
                * chebyshev_poly_shifted(n - 1, arg)
                * ((2.0 * std::f64::consts::PI * t * i as f64) / n as f64).cos();
            sign = -sign;
        }
        let value = ripple + 2.0 * sum;
        max_value = max_value.max(value);
        values[j] = value;
        values[n - j - 1] = value;
    }

    VectorR::from_shape_fn(n, |i| (values[i] / max_value) as Float)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_window_sums() {
        let config = WindowConfig::new(WindowType::Rect, 16);
        assert_eq!(build(&config).unwrap().sum(), 16.0);
        let normalized = build_normalized(&config).unwrap();
        assert!((normalized.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hann_is_symmetric_with_zero_edges() {
        let window = build(&WindowConfig::new(WindowType::Hann, 9)).unwrap();
        assert!(window[0].abs() < 1e-7);
        assert!((window[4] - 1.0).abs() < 1e-6);
        assert!((window.sum() - 4.0).abs() < 1e-5);
        for i in 0..9 {
            assert!((window[i] - window[8 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn blackman_harris_peaks_at_centre() {
        let window = build(&WindowConfig::new(WindowType::BlackmanHarris, 65)).unwrap();
        assert!((window[32] - 1.0).abs() < 1e-5);
        assert!(window[0] < 1e-4);
    }

    #[test]
    fn chebyshev_is_normalized_and_symmetric() {
        let window = build(&WindowConfig::chebyshev(32, 100.0)).unwrap();
        let max = window.iter().cloned().fold(Float::MIN, Float::max);
        assert!((max - 1.0).abs() < 1e-6);
        for i in 0..32 {
            assert!((window[i] - window[31 - i]).abs() < 1e-5);
            assert!(window[i] > 0.0);
        }
        assert!(window[0] < window[8]);
    }

    #[test]
    fn chebyshev_rejects_non_positive_attenuation() {
        assert!(build(&WindowConfig::chebyshev(16, 0.0)).is_err());
        assert!(build(&WindowConfig::new(WindowType::Hann, 0)).is_err());
    }

    #[test]
    fn scale_applies_after_normalization() {
        let config = WindowConfig::new(WindowType::Rect, 4).with_scale(2.0);
        let window = build_normalized(&config).unwrap();
        assert!((window.sum() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn bartlett_and_flat_top_shapes() {
        let bartlett = build(&WindowConfig::new(WindowType::Bartlett, 5)).unwrap();
        assert_eq!(bartlett.to_vec(), vec![0.0, 0.5, 1.0, 0.5, 0.0]);
        let flat = build(&WindowConfig::new(WindowType::FlatTop, 33)).unwrap();
        assert!((flat[16] - 1.0).abs() < 1e-3);
    }
}
