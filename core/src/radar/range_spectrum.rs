//! Range spectrum of one chirp matrix, plus a rolling range spectrogram.

use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};
use rustfft::num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::algo::mti::Mti;
use crate::algo::ppfft::{Ppfft, PpfftConfig, PpfftInput};
use crate::containers::{sum_sqr, MatrixC, VectorC};
use crate::math::window::WindowConfig;
use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};
use crate::radar::{clamp_threshold, shift_rows_down, ScaleType};
use crate::telemetry::LogManager;

/// Receive channels a spectrogram keeps clutter state for.
pub const MAX_RX: usize = 4;

const SPECTROGRAM_MTI_ALPHA: Float = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSpectrumMode {
    /// Transform one selected chirp.
    SingleChirp,
    /// Average the complex spectra of all chirps.
    CoherentIntegration,
    /// Transform the chirp with the highest energy.
    MaxEnergy,
    /// Per bin, keep the chirp value with the largest magnitude.
    MaxBin,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSpectrumConfig {
    pub fft: PpfftConfig,
    pub num_chirps_per_frame: usize,
    pub spect_threshold: Float,
    pub output_scale: ScaleType,
}

pub struct RangeSpectrum {
    ppfft: Ppfft,
    mode: RangeSpectrumMode,
    num_chirps: usize,
    single_chirp_index: usize,
    spect_threshold: Float,
    output_scale: ScaleType,
    chirp_spectra: MatrixC,
    spectrum: VectorC,
    mti: Vec<Mti>,
    logger: LogManager,
}

impl RangeSpectrum {
    pub fn new(config: &RangeSpectrumConfig) -> RadarResult<Self> {
        if config.num_chirps_per_frame == 0 {
            return Err(RadarError::ArgumentInvalid("no chirps per frame".into()));
        }
        let ppfft = Ppfft::new(config.fft)?;
        let bins = ppfft.output_len();
        let mti = (0..MAX_RX)
            .map(|_| Mti::new(SPECTROGRAM_MTI_ALPHA, bins))
            .collect::<RadarResult<Vec<_>>>()?;
        let mode = if config.num_chirps_per_frame == 1 {
            RangeSpectrumMode::SingleChirp
        } else {
            RangeSpectrumMode::CoherentIntegration
        };
        Ok(Self {
            ppfft,
            mode,
            num_chirps: config.num_chirps_per_frame,
            single_chirp_index: 0,
            spect_threshold: clamp_threshold(config.spect_threshold),
            output_scale: config.output_scale,
            chirp_spectra: MatrixC::zeros((config.num_chirps_per_frame, bins)),
            spectrum: VectorC::zeros(bins),
            mti,
            logger: LogManager::new("range_spectrum"),
        })
    }

    /// Number of range bins produced per run.
    pub fn bins(&self) -> usize {
        self.ppfft.output_len()
    }

    pub fn mode(&self) -> RangeSpectrumMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RangeSpectrumMode) {
        self.mode = mode;
    }

    pub fn single_chirp_index(&self) -> usize {
        self.single_chirp_index
    }

    pub fn set_single_chirp_index(&mut self, index: usize) -> RadarResult<()> {
        if index >= self.num_chirps {
            return Err(RadarError::ArgumentOutOfBounds(format!(
                "chirp {} of {}",
                index, self.num_chirps
            )));
        }
        self.single_chirp_index = index;
        Ok(())
    }

    pub fn threshold(&self) -> Float {
        self.spect_threshold
    }

    pub fn set_threshold(&mut self, threshold: Float) -> RadarResult<()> {
        if threshold < 0.0 {
            return Err(RadarError::ArgumentOutOfBounds(format!("threshold {}", threshold)));
        }
        if threshold < crate::radar::CLIPPING_VALUE {
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

    pub fn set_window(&mut self, window: WindowConfig) -> RadarResult<()> {
        self.ppfft.set_window(window)
    }

    /// Per-chirp spectra of the last coherent-integration or max-bin run.
    pub fn chirp_spectra(&self) -> ArrayView2<'_, Complex> {
        self.chirp_spectra.view()
    }

    /// Complex range spectrum of a `chirps x samples` matrix.
    pub fn run_complex<T: PpfftInput>(
        &mut self,
        input: ArrayView2<T>,
        mut output: ArrayViewMut1<Complex>,
    ) -> RadarResult<()> {
        ensure_shape("range spectrum output", &[self.bins()], output.shape())?;
        match self.mode {
            RangeSpectrumMode::SingleChirp => {
                if self.single_chirp_index >= input.nrows() {
                    return Err(RadarError::DimensionMismatch(format!(
                        "chirp {} of a {}-chirp frame",
                        self.single_chirp_index,
                        input.nrows()
                    )));
                }
                self.ppfft.run(input.row(self.single_chirp_index), output)
            }
            RangeSpectrumMode::MaxEnergy => {
                let (row, _) = input
                    .axis_iter(Axis(0))
                    .enumerate()
                    .fold((0, 0.0), |best, (i, chirp)| {
                        let energy = sum_sqr(chirp);
                        if energy > best.1 {
                            (i, energy)
                        } else {
                            best
                        }
                    });
                self.ppfft.run(input.row(row), output)
            }
            RangeSpectrumMode::CoherentIntegration | RangeSpectrumMode::MaxBin => {
                if input.nrows() > self.chirp_spectra.nrows() || input.nrows() == 0 {
                    return Err(RadarError::DimensionMismatch(format!(
                        "{} chirps, configured for {}",
                        input.nrows(),
                        self.chirp_spectra.nrows()
                    )));
                }
                for (chirp, spectrum) in input.axis_iter(Axis(0)).zip(self.chirp_spectra.axis_iter_mut(Axis(0))) {
                    self.ppfft.run(chirp, spectrum)?;
                }
                let used = self.chirp_spectra.slice(ndarray::s![..input.nrows(), ..]);
                if self.mode == RangeSpectrumMode::CoherentIntegration {
                    let scale = 1.0 / input.nrows() as Float;
                    for (bin, column) in output.iter_mut().zip(used.axis_iter(Axis(1))) {
                        *bin = column.iter().fold(Complex::zero(), |acc, &v| acc + v) * scale;
                    }
                } else {
                    for (bin, column) in output.iter_mut().zip(used.axis_iter(Axis(1))) {
                        *bin = column.iter().copied().fold(Complex::zero(), |best, v| {
                            if v.norm() > best.norm() {
                                v
                            } else {
                                best
                            }
                        });
                    }
                }
                Ok(())
            }
        }
    }

    /// Magnitude spectrum clamped to the threshold and converted to the
    /// output scale.
    pub fn run<T: PpfftInput>(&mut self, input: ArrayView2<T>, mut output: ArrayViewMut1<Float>) -> RadarResult<()> {
        ensure_shape("range spectrum output", &[self.bins()], output.shape())?;
        let mut spectrum = std::mem::take(&mut self.spectrum);
        let result = self.run_complex(input, spectrum.view_mut());
        if result.is_ok() {
            for (out, value) in output.iter_mut().zip(spectrum.iter()) {
                *out = self.output_scale.convert(value.norm(), self.spect_threshold);
            }
        }
        self.spectrum = spectrum;
        result
    }

    /// Pushes `input` as the newest row (row 0) of a rolling spectrogram,
    /// optionally through a per-channel slow-time MTI.
    pub fn spectrogram(
        &mut self,
        rx: usize,
        static_target_removal: bool,
        input: ArrayView1<Float>,
        mut output: ArrayViewMut2<Float>,
    ) -> RadarResult<()> {
        if rx >= MAX_RX {
            return Err(RadarError::ArgumentOutOfBounds(format!("rx {}", rx)));
        }
        if output.nrows() == 0 {
            return Err(RadarError::DimensionMismatch("spectrogram has no rows".into()));
        }
        ensure_shape("spectrogram row", &[output.ncols()], input.shape())?;
        if static_target_removal {
            ensure_shape("spectrogram row", &[self.mti[rx].len()], input.shape())?;
        }
        shift_rows_down(&mut output);
        let mut newest = output.row_mut(0);
        if static_target_removal {
            self.mti[rx].run(input, newest)
        } else {
            newest.assign(&input);
            Ok(())
        }
    }
}
