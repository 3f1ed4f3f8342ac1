//! Preprocessed FFT: mean removal, windowing and zero-padding ahead of a
//! preplanned transform.

use ndarray::{ArrayView1, ArrayViewMut1};
use rustfft::num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::containers::{SquaredMagnitude, VectorC, VectorR};
use crate::math::fft::{frequency_axis, max_input_len, AxisSpec, FftHelper, FftType};
use crate::math::window::{self, WindowConfig, WindowType};
use crate::prelude::{Complex, Float, RadarError, RadarResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PpfftConfig {
    pub fft_type: FftType,
    pub fft_size: usize,
    pub mean_removal: bool,
    pub window: WindowConfig,
    /// Divide the window by its sum before use.
    pub normalized_window: bool,
}

impl PpfftConfig {
    pub fn new(fft_type: FftType, fft_size: usize, window: WindowConfig) -> Self {
        Self {
            fft_type,
            fft_size,
            mean_removal: false,
            window,
            normalized_window: false,
        }
    }

    pub fn with_mean_removal(mut self, enabled: bool) -> Self {
        self.mean_removal = enabled;
        self
    }

    pub fn with_normalized_window(mut self, enabled: bool) -> Self {
        self.normalized_window = enabled;
        self
    }
}

/// Sample types a [`Ppfft`] accepts.
pub trait PpfftInput: SquaredMagnitude {
    fn transform(ppfft: &mut Ppfft, input: ArrayView1<Self>, output: ArrayViewMut1<Complex>) -> RadarResult<()>;
}

impl PpfftInput for Float {
    fn transform(ppfft: &mut Ppfft, input: ArrayView1<Self>, output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        ppfft.run_real(input, output)
    }
}

impl PpfftInput for Complex {
    fn transform(ppfft: &mut Ppfft, input: ArrayView1<Self>, output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        ppfft.run_complex(input, output)
    }
}

pub struct Ppfft {
    config: PpfftConfig,
    window: VectorR,
    fft: FftHelper,
    work_real: VectorR,
    work_complex: VectorC,
}

impl Ppfft {
    pub fn new(config: PpfftConfig) -> RadarResult<Self> {
        let fft = FftHelper::new(config.fft_type, config.fft_size)?;
        let window = Self::build_window(&config)?;
        Ok(Self {
            work_real: VectorR::zeros(window.len()),
            work_complex: VectorC::zeros(window.len()),
            config,
            window,
            fft,
        })
    }

    fn check_window(window_len: usize, fft_type: FftType, fft_size: usize) -> RadarResult<()> {
        let limit = max_input_len(fft_type, fft_size);
        if window_len > limit {
            return Err(RadarError::ArgumentOutOfBounds(format!(
                "window length {} exceeds {} for a {:?} fft of size {}",
                window_len, limit, fft_type, fft_size
            )));
        }
        Ok(())
    }

    fn build_window(config: &PpfftConfig) -> RadarResult<VectorR> {
        Self::check_window(config.window.length, config.fft_type, config.fft_size)?;
        if config.normalized_window {
            window::build_normalized(&config.window)
        } else {
            window::build(&config.window)
        }
    }

    pub fn config(&self) -> &PpfftConfig {
        &self.config
    }

    pub fn window(&self) -> &VectorR {
        &self.window
    }

    pub fn window_type(&self) -> WindowType {
        self.config.window.window_type
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    pub fn window_attenuation_db(&self) -> Float {
        self.config.window.at_db
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn fft_type(&self) -> FftType {
        self.config.fft_type
    }

    /// Number of bins written by a run.
    pub fn output_len(&self) -> usize {
        self.fft.output_len()
    }

    pub fn mean_removal(&self) -> bool {
        self.config.mean_removal
    }

    pub fn set_mean_removal(&mut self, enabled: bool) {
        self.config.mean_removal = enabled;
    }

    pub fn set_window(&mut self, config: WindowConfig) -> RadarResult<()> {
        let next = PpfftConfig {
            window: config,
            ..self.config
        };
        let window = Self::build_window(&next)?;
        self.work_real = VectorR::zeros(window.len());
        self.work_complex = VectorC::zeros(window.len());
        self.window = window;
        self.config = next;
        Ok(())
    }

    pub fn set_fft_size(&mut self, fft_size: usize) -> RadarResult<()> {
        self.replan(self.config.fft_type, fft_size)
    }

    pub fn set_fft_type(&mut self, fft_type: FftType) -> RadarResult<()> {
        self.replan(fft_type, self.config.fft_size)
    }

    fn replan(&mut self, fft_type: FftType, fft_size: usize) -> RadarResult<()> {
        Self::check_window(self.window.len(), fft_type, fft_size)?;
        self.fft = FftHelper::new(fft_type, fft_size)?;
        self.config.fft_type = fft_type;
        self.config.fft_size = fft_size;
        Ok(())
    }

    /// Frequency axis of the output for a given sampling rate.
    pub fn freq_axis(&self, sampling_frequency_hz: Float) -> RadarResult<AxisSpec> {
        frequency_axis(self.config.fft_type, self.config.fft_size, sampling_frequency_hz)
    }

    fn check(&self, input_len: usize, output_len: usize) -> RadarResult<()> {
        if input_len != self.window.len() {
            return Err(RadarError::DimensionMismatch(format!(
                "ppfft input of {} samples, window is {}",
                input_len,
                self.window.len()
            )));
        }
        if output_len != self.fft.output_len() {
            return Err(RadarError::DimensionMismatch(format!(
                "ppfft output of {} bins, expected {}",
                output_len,
                self.fft.output_len()
            )));
        }
        Ok(())
    }

    /// Dispatches on the sample type of `input`.
    pub fn run<T: PpfftInput>(&mut self, input: ArrayView1<T>, output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        T::transform(self, input, output)
    }

    /// Runs on real samples with either plan type.
    pub fn run_real(&mut self, input: ArrayView1<Float>, output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        self.check(input.len(), output.len())?;
        let mean = if self.config.mean_removal {
            input.sum() / input.len() as Float
        } else {
            0.0
        };
        match self.config.fft_type {
            FftType::R2C => {
                for ((slot, &x), &w) in self.work_real.iter_mut().zip(input.iter()).zip(self.window.iter()) {
                    *slot = (x - mean) * w;
                }
                self.fft.forward_real(self.work_real.view(), output)
            }
            FftType::C2C => {
                for ((slot, &x), &w) in self.work_complex.iter_mut().zip(input.iter()).zip(self.window.iter()) {
                    *slot = Complex::new((x - mean) * w, 0.0);
                }
                self.fft.forward(self.work_complex.view(), output)
            }
        }
    }

    /// Runs on complex samples; needs a C2C plan.
    pub fn run_complex(&mut self, input: ArrayView1<Complex>, output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        if self.config.fft_type != FftType::C2C {
            return Err(RadarError::ArgumentInvalid("complex input needs a c2c plan".into()));
        }
        self.check(input.len(), output.len())?;
        let mean = if self.config.mean_removal {
            input.iter().fold(Complex::zero(), |acc, &v| acc + v) / input.len() as Float
        } else {
            Complex::zero()
        };
        for ((slot, &x), &w) in self.work_complex.iter_mut().zip(input.iter()).zip(self.window.iter()) {
            *slot = (x - mean) * w;
        }
        self.fft.forward(self.work_complex.view(), output)
    }
}
