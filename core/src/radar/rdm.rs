//! Range-Doppler map: range FFT per chirp, Doppler FFT per range bin,
//! FFT-shift along Doppler.

use ndarray::{ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

use crate::algo::ppfft::{Ppfft, PpfftConfig, PpfftInput};
use crate::containers::{MatrixC, VectorC};
use crate::math::fft::{fft_shift, FftType};
use crate::math::window::WindowConfig;
use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};
use crate::radar::{clamp_threshold, ScaleType, CLIPPING_VALUE};
use crate::telemetry::LogManager;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeDopplerMapConfig {
    pub spect_threshold: Float,
    pub output_scale: ScaleType,
    /// Window length is the number of samples per chirp.
    pub range_fft: PpfftConfig,
    /// Window length is the number of chirps per frame; must be C2C.
    pub doppler_fft: PpfftConfig,
}

pub struct RangeDopplerMap {
    range_ppfft: Ppfft,
    doppler_ppfft: Ppfft,
    spect_threshold: Float,
    output_scale: ScaleType,
    /// `range_bins x chirps` after the range transform.
    range_spectra: MatrixC,
    doppler_spectrum: VectorC,
    map: MatrixC,
    logger: LogManager,
}

impl RangeDopplerMap {
    pub fn new(config: &RangeDopplerMapConfig) -> RadarResult<Self> {
        if config.doppler_fft.fft_type != FftType::C2C {
            return Err(RadarError::ArgumentInvalid("doppler transform must be c2c".into()));
        }
        let logger = LogManager::new("rdm");
        if config.spect_threshold < CLIPPING_VALUE {
            logger.degraded(format_args!("spectrum threshold raised to the clipping value"));
        }
        let range_ppfft = Ppfft::new(config.range_fft)?;
        let doppler_ppfft = Ppfft::new(config.doppler_fft)?;
        let range_bins = range_ppfft.output_len();
        let doppler_bins = doppler_ppfft.output_len();
        let chirps = doppler_ppfft.window_size();
        Ok(Self {
            range_spectra: MatrixC::zeros((range_bins, chirps)),
            doppler_spectrum: VectorC::zeros(doppler_bins),
            map: MatrixC::zeros((range_bins, doppler_bins)),
            range_ppfft,
            doppler_ppfft,
            spect_threshold: clamp_threshold(config.spect_threshold),
            output_scale: config.output_scale,
            logger,
        })
    }

    /// `(range_bins, doppler_bins)` of the output map.
    pub fn shape(&self) -> (usize, usize) {
        self.map.dim()
    }

    pub fn num_samples_per_chirp(&self) -> usize {
        self.range_ppfft.window_size()
    }

    pub fn num_chirps_per_frame(&self) -> usize {
        self.doppler_ppfft.window_size()
    }

    pub fn threshold(&self) -> Float {
        self.spect_threshold
    }

    pub fn set_threshold(&mut self, threshold: Float) -> RadarResult<()> {
        if threshold < 0.0 {
            return Err(RadarError::ArgumentOutOfBounds(format!("threshold {}", threshold)));
        }
        if threshold < CLIPPING_VALUE {
            self.logger.degraded(format_args!("spectrum threshold raised to the clipping value"));
        }
        self.spect_threshold = clamp_threshold(threshold);
        Ok(())
    }

    pub fn output_scale(&self) -> ScaleType {
        self.output_scale
    }

    pub fn set_output_scale(&mut self, scale: ScaleType) {
        self.output_scale = scale;
    }

    /// Replaces the range window; its length must stay the chirp length.
    pub fn set_range_window(&mut self, window: WindowConfig) -> RadarResult<()> {
        self.check_window(window.length, self.num_samples_per_chirp())?;
        self.range_ppfft.set_window(window)
    }

    pub fn set_doppler_window(&mut self, window: WindowConfig) -> RadarResult<()> {
        self.check_window(window.length, self.num_chirps_per_frame())?;
        self.doppler_ppfft.set_window(window)
    }

    fn check_window(&self, length: usize, expected: usize) -> RadarResult<()> {
        if length != expected {
            return Err(RadarError::DimensionMismatch(format!(
                "window of {} for {} samples",
                length, expected
            )));
        }
        Ok(())
    }

    fn transform<T: PpfftInput>(&mut self, input: ArrayView2<T>) -> RadarResult<()> {
        ensure_shape(
            "rdm input",
            &[self.num_chirps_per_frame(), self.num_samples_per_chirp()],
            input.shape(),
        )?;
        for (chirp, column) in input.axis_iter(Axis(0)).zip(self.range_spectra.axis_iter_mut(Axis(1))) {
            self.range_ppfft.run(chirp, column)?;
        }
        for (slow_time, map_row) in self.range_spectra.axis_iter(Axis(0)).zip(self.map.axis_iter_mut(Axis(0))) {
            self.doppler_ppfft
                .run_complex(slow_time, self.doppler_spectrum.view_mut())?;
            fft_shift(self.doppler_spectrum.view(), map_row)?;
        }
        Ok(())
    }

    /// Complex map of a `chirps x samples` matrix, DC Doppler at column
    /// `doppler_bins / 2`.
    pub fn run_complex<T: PpfftInput>(
        &mut self,
        input: ArrayView2<T>,
        mut output: ArrayViewMut2<Complex>,
    ) -> RadarResult<()> {
        ensure_shape("rdm output", self.map.shape(), output.shape())?;
        self.transform(input)?;
        output.assign(&self.map);
        Ok(())
    }

    /// Magnitude map clamped to the threshold and scaled.
    pub fn run<T: PpfftInput>(&mut self, input: ArrayView2<T>, mut output: ArrayViewMut2<Float>) -> RadarResult<()> {
        ensure_shape("rdm output", self.map.shape(), output.shape())?;
        self.transform(input)?;
        let (scale, threshold) = (self.output_scale, self.spect_threshold);
        output.zip_mut_with(&self.map, |out, value| *out = scale.convert(value.norm(), threshold));
        Ok(())
    }

    /// Complex map of the most recent run.
    pub fn last_map(&self) -> ArrayView2<'_, Complex> {
        self.map.view()
    }
}
