use ndarray::{ArrayView1, ArrayViewMut1};

use crate::prelude::{Float, RadarError, RadarResult};

pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[Float]) -> Float {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: Float = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as Float).sqrt()
    }

    pub fn mean(samples: &[Float]) -> Float {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<Float>() / samples.len() as Float
    }

    /// Median of `samples`, averaging the two middle values for even
    /// lengths. `scratch` is reordered; it must hold at least `samples.len()`.
    pub fn median_with(samples: &[Float], scratch: &mut [Float]) -> Option<Float> {
        let n = samples.len();
        if n == 0 || scratch.len() < n {
            return None;
        }
        let work = &mut scratch[..n];
        work.copy_from_slice(samples);
        let mid = n / 2;
        let (lower, upper, _) = work.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        let upper = *upper;
        if n % 2 == 1 {
            Some(upper)
        } else {
            let below = lower.iter().copied().fold(Float::NEG_INFINITY, Float::max);
            Some((upper + below) / 2.0)
        }
    }

    pub fn median(samples: &[Float]) -> Option<Float> {
        let mut scratch = vec![0.0; samples.len()];
        Self::median_with(samples, &mut scratch)
    }
}

/// Sliding median over a fixed window.
///
/// The window around sample `i` spans `[i - w/2, i + w - w/2)` clipped to the
/// signal, so edges use a shorter window.
#[derive(Debug, Clone)]
pub struct MedianFilter {
    window: usize,
    scratch: Vec<Float>,
}

impl MedianFilter {
    pub fn new(window: usize) -> RadarResult<Self> {
        if window == 0 {
            return Err(RadarError::ArgumentInvalid("median window is zero".into()));
        }
        Ok(Self {
            window,
            scratch: vec![0.0; window],
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn run(&mut self, input: ArrayView1<Float>, mut output: ArrayViewMut1<Float>) -> RadarResult<()> {
        let len = input.len();
        if output.len() != len {
            return Err(RadarError::DimensionMismatch(format!(
                "median output {} vs input {}",
                output.len(),
                len
            )));
        }
        let window = self.window.min(2 * len);
        let left = window / 2;
        let right = window - left;
        let samples = input.to_vec();
        for i in 0..len {
            let start = i.saturating_sub(left);
            let end = (i + right).min(len);
            if let Some(value) = StatsHelper::median_with(&samples[start..end], &mut self.scratch) {
                output[i] = value;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn rms_zero_sequence_yields_zero() {
        assert_eq!(StatsHelper::rms(&[]), 0.0);
        assert_eq!(StatsHelper::rms(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_handles_single_value() {
        assert_eq!(StatsHelper::rms(&[4.0]), 4.0);
    }

    #[test]
    fn median_of_odd_and_even_lengths() {
        assert_eq!(StatsHelper::median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(StatsHelper::median(&[3.0, 2.0, 1.0, 7.0]), Some(2.5));
        assert_eq!(StatsHelper::median(&[]), None);
    }

    #[test]
    fn median_filter_removes_impulse() {
        let input = Array1::from(vec![1.0, 1.0, 1.0, 50.0, 1.0, 1.0, 1.0]);
        let mut output = Array1::zeros(7);
        let mut filter = MedianFilter::new(3).unwrap();
        filter.run(input.view(), output.view_mut()).unwrap();
        assert!(output.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn median_filter_checks_output_length() {
        let input = Array1::from(vec![1.0, 2.0]);
        let mut output = Array1::zeros(3);
        let mut filter = MedianFilter::new(3).unwrap();
        assert!(filter.run(input.view(), output.view_mut()).is_err());
        assert!(MedianFilter::new(0).is_err());
    }
}
