use std::sync::Arc;

use ndarray::{ArrayView1, ArrayViewMut1};
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::prelude::{Complex, Float, RadarError, RadarResult};

pub const MIN_FFT_SIZE: usize = 4;
pub const MAX_FFT_SIZE: usize = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FftType {
    /// Real input, positive-frequency half of the spectrum as output.
    R2C,
    C2C,
}

/// Preplanned transform of a fixed power-of-two size.
///
/// Plans and work buffers are created once; running a transform never
/// allocates. Inputs shorter than the plan are zero-padded.
pub struct FftHelper {
    fft_type: FftType,
    size: usize,
    forward: Arc<dyn Fft<Float>>,
    inverse: Arc<dyn Fft<Float>>,
    buffer: Vec<Complex>,
    scratch: Vec<Complex>,
}

impl std::fmt::Debug for FftHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftHelper")
            .field("fft_type", &self.fft_type)
            .field("size", &self.size)
            .finish()
    }
}

impl FftHelper {
    pub fn new(fft_type: FftType, size: usize) -> RadarResult<Self> {
        if !size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
            return Err(RadarError::ArgumentInvalid(format!(
                "fft size {} must be a power of two in [{}, {}]",
                size, MIN_FFT_SIZE, MAX_FFT_SIZE
            )));
        }
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Ok(Self {
            fft_type,
            size,
            forward,
            inverse,
            buffer: vec![Complex::zero(); size],
            scratch: vec![Complex::zero(); scratch_len],
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fft_type(&self) -> FftType {
        self.fft_type
    }

    /// Number of bins produced by a forward run.
    pub fn output_len(&self) -> usize {
        match self.fft_type {
            FftType::R2C => self.size / 2,
            FftType::C2C => self.size,
        }
    }

    /// Real-input transform. `output` holds either the `size/2` positive
    /// bins of at most `size/2` samples, or all `size` bins of at most
    /// `size` samples with the negative half mirrored.
    pub fn forward_real(&mut self, input: ArrayView1<Float>, mut output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        if self.fft_type != FftType::R2C {
            return Err(RadarError::ArgumentInvalid("plan expects complex input".into()));
        }
        let half = self.size / 2;
        if output.len() != half && output.len() != self.size {
            return Err(RadarError::DimensionMismatch(format!(
                "r2c output of {} bins, expected {} or {}",
                output.len(),
                half,
                self.size
            )));
        }
        if output.len() == half {
            check_input_len(input.len(), max_input_len(FftType::R2C, self.size))?;
        } else {
            check_input_len(input.len(), self.size)?;
        }

        for (slot, &value) in self.buffer.iter_mut().zip(input.iter()) {
            *slot = Complex::new(value, 0.0);
        }
        self.buffer[input.len()..].fill(Complex::zero());
        self.forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (out, &value) in output.iter_mut().zip(self.buffer.iter()) {
            *out = value;
        }
        if output.len() == self.size {
            for i in (half + 1)..self.size {
                output[i] = self.buffer[self.size - i].conj();
            }
        }
        Ok(())
    }

    pub fn forward(&mut self, input: ArrayView1<Complex>, mut output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        if self.fft_type != FftType::C2C {
            return Err(RadarError::ArgumentInvalid("plan expects real input".into()));
        }
        check_input_len(input.len(), self.size)?;
        self.check_full_output(output.len())?;

        for (slot, &value) in self.buffer.iter_mut().zip(input.iter()) {
            *slot = value;
        }
        self.buffer[input.len()..].fill(Complex::zero());
        self.forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        output
            .iter_mut()
            .zip(self.buffer.iter())
            .for_each(|(out, &value)| *out = value);
        Ok(())
    }

    /// Inverse transform of a full spectrum, scaled by `1/size`.
    pub fn inverse(&mut self, input: ArrayView1<Complex>, mut output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        self.check_full_output(output.len())?;
        self.run_inverse(input)?;
        let scale = 1.0 / self.size as Float;
        output
            .iter_mut()
            .zip(self.buffer.iter())
            .for_each(|(out, &value)| *out = value * scale);
        Ok(())
    }

    /// Inverse transform keeping only the real part.
    pub fn inverse_real(&mut self, input: ArrayView1<Complex>, mut output: ArrayViewMut1<Float>) -> RadarResult<()> {
        self.check_full_output(output.len())?;
        self.run_inverse(input)?;
        let scale = 1.0 / self.size as Float;
        output
            .iter_mut()
            .zip(self.buffer.iter())
            .for_each(|(out, value)| *out = value.re * scale);
        Ok(())
    }

    fn run_inverse(&mut self, input: ArrayView1<Complex>) -> RadarResult<()> {
        if input.len() != self.size {
            return Err(RadarError::DimensionMismatch(format!(
                "inverse input of {} bins, expected {}",
                input.len(),
                self.size
            )));
        }
        for (slot, &value) in self.buffer.iter_mut().zip(input.iter()) {
            *slot = value;
        }
        self.inverse
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        Ok(())
    }

    fn check_full_output(&self, len: usize) -> RadarResult<()> {
        if len != self.size {
            return Err(RadarError::DimensionMismatch(format!(
                "output of {} bins, expected {}",
                len, self.size
            )));
        }
        Ok(())
    }
}

/// Longest input a forward run of the positive-half spectrum accepts.
pub fn max_input_len(fft_type: FftType, size: usize) -> usize {
    match fft_type {
        FftType::R2C => size / 2,
        FftType::C2C => size,
    }
}

fn check_input_len(len: usize, limit: usize) -> RadarResult<()> {
    if len > limit {
        return Err(RadarError::DimensionMismatch(format!(
            "input of {} samples exceeds the limit of {}",
            len, limit
        )));
    }
    Ok(())
}

/// Value range covered by a spectrum axis, with the width of one bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub min_value: Float,
    pub max_value: Float,
    pub value_bin_per_step: Float,
}

/// Frequency axis of a transform sampled at `sampling_frequency_hz`.
///
/// C2C spans `[0, fs]`; R2C spans the positive half, `[0, fs/2 - step]`.
pub fn frequency_axis(fft_type: FftType, fft_size: usize, sampling_frequency_hz: Float) -> RadarResult<AxisSpec> {
    if fft_size == 0 || !(sampling_frequency_hz > 0.0) {
        return Err(RadarError::ArgumentOutOfBounds(format!(
            "frequency axis for size {} at {} Hz",
            fft_size, sampling_frequency_hz
        )));
    }
    let step = sampling_frequency_hz / fft_size as Float;
    let max_value = match fft_type {
        FftType::C2C => sampling_frequency_hz,
        FftType::R2C => sampling_frequency_hz / 2.0 - step,
    };
    Ok(AxisSpec {
        min_value: 0.0,
        max_value,
        value_bin_per_step: step,
    })
}

/// Rotates `input` by half its length so the DC bin lands at `len/2`.
pub fn fft_shift<T: Copy>(input: ArrayView1<T>, mut output: ArrayViewMut1<T>) -> RadarResult<()> {
    if input.len() != output.len() {
        return Err(RadarError::DimensionMismatch(format!(
            "shift output {} vs input {}",
            output.len(),
            input.len()
        )));
    }
    let len = input.len();
    if len == 0 {
        return Ok(());
    }
    let half = len / 2;
    for (i, &value) in input.iter().enumerate() {
        output[(i + half) % len] = value;
    }
    Ok(())
}

/// In-place variant of [`fft_shift`].
pub fn fft_shift_in_place<T>(values: &mut [T]) {
    let half = values.len() / 2;
    values.rotate_right(half);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn rejects_invalid_sizes() {
        assert!(FftHelper::new(FftType::C2C, 2).is_err());
        assert!(FftHelper::new(FftType::C2C, 48).is_err());
        assert!(FftHelper::new(FftType::R2C, 131072).is_err());
        assert!(FftHelper::new(FftType::R2C, 4).is_ok());
    }

    #[test]
    fn r2c_returns_positive_half() {
        let mut fft = FftHelper::new(FftType::R2C, 32).unwrap();
        assert_eq!(fft.output_len(), 16);
        let input = Array1::from_shape_fn(16, |n| {
            (2.0 * std::f32::consts::PI * 3.0 * n as f32 / 16.0).cos()
        });
        let mut output = Array1::zeros(16);
        fft.forward_real(input.view(), output.view_mut()).unwrap();
        let peak = output
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().partial_cmp(&b.1.norm()).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak, 6);
        assert!((output[6].norm() - 8.0).abs() < 1e-4);
    }

    #[test]
    fn r2c_half_spectrum_takes_at_most_half_the_size() {
        let mut fft = FftHelper::new(FftType::R2C, 16).unwrap();
        let mut half = Array1::<Complex>::zeros(8);
        assert!(fft.forward_real(Array1::<Float>::zeros(8).view(), half.view_mut()).is_ok());
        assert!(matches!(
            fft.forward_real(Array1::<Float>::zeros(9).view(), half.view_mut()),
            Err(RadarError::DimensionMismatch(_))
        ));
        let mut full = Array1::<Complex>::zeros(16);
        assert!(fft.forward_real(Array1::<Float>::zeros(16).view(), full.view_mut()).is_ok());
        assert!(fft.forward_real(Array1::<Float>::zeros(17).view(), full.view_mut()).is_err());
        assert_eq!(max_input_len(FftType::R2C, 16), 8);
        assert_eq!(max_input_len(FftType::C2C, 16), 16);
    }

    #[test]
    fn real_round_trip_recovers_input() {
        let mut rng = StdRng::seed_from_u64(7);
        for &size in &[4usize, 64, 1024] {
            let mut fft = FftHelper::new(FftType::R2C, size).unwrap();
            let input: Array1<Float> = Array1::from_shape_fn(size, |_| rng.gen_range(-1.0..1.0));
            let mut spectrum = Array1::zeros(size);
            fft.forward_real(input.view(), spectrum.view_mut()).unwrap();
            let mut back = Array1::zeros(size);
            fft.inverse_real(spectrum.view(), back.view_mut()).unwrap();

            let norm = input.iter().map(|v| v * v).sum::<Float>().sqrt();
            let err = (&back - &input).iter().map(|v| v * v).sum::<Float>().sqrt();
            assert!(err <= 1e-5 * norm, "size {} err {}", size, err);
        }
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut fft = FftHelper::new(FftType::C2C, 8).unwrap();
        let input = Array1::from_elem(1, Complex::new(1.0, 0.0));
        let mut output = Array1::zeros(8);
        fft.forward(input.view(), output.view_mut()).unwrap();
        for bin in output.iter() {
            assert!((bin - Complex::new(1.0, 0.0)).norm() < 1e-6);
        }
    }

    #[test]
    fn plan_type_is_enforced() {
        let mut fft = FftHelper::new(FftType::C2C, 8).unwrap();
        let input = Array1::<Float>::zeros(8);
        let mut output = Array1::zeros(8);
        assert!(fft.forward_real(input.view(), output.view_mut()).is_err());
    }

    #[test]
    fn frequency_axis_depends_on_type() {
        let c2c = frequency_axis(FftType::C2C, 8, 800.0).unwrap();
        assert_eq!(c2c.value_bin_per_step, 100.0);
        assert_eq!(c2c.max_value, 800.0);
        let r2c = frequency_axis(FftType::R2C, 8, 800.0).unwrap();
        assert_eq!(r2c.max_value, 300.0);
        assert!(frequency_axis(FftType::R2C, 8, 0.0).is_err());
    }

    #[test]
    fn shift_moves_dc_to_centre() {
        let input = Array1::from(vec![0, 1, 2, 3, 4, 5]);
        let mut output = Array1::from(vec![0; 6]);
        fft_shift(input.view(), output.view_mut()).unwrap();
        assert_eq!(output.to_vec(), vec![3, 4, 5, 0, 1, 2]);

        let mut values = vec![0, 1, 2, 3];
        fft_shift_in_place(&mut values);
        assert_eq!(values, vec![2, 3, 0, 1]);
    }
}
