//! Rolling Doppler spectrogram: row 0 holds the newest frame, the last row
//! the oldest.

use ndarray::{ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

use crate::algo::ppfft::{Ppfft, PpfftConfig};
use crate::containers::{MatrixC, VectorC};
use crate::math::fft::{fft_shift, FftType};
use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};
use crate::radar::rdm::{RangeDopplerMap, RangeDopplerMapConfig};
use crate::radar::{clamp_threshold, shift_rows_down, ScaleType};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DopplerSpectrogramConfig {
    pub spect_threshold: Float,
    /// Slow-time transform; must be C2C.
    pub doppler_fft: PpfftConfig,
    /// Fast-time transform for multi-chirp frames. `None` selects the
    /// single-chirp mode where every frame contributes one slow-time sample
    /// vector.
    pub range_fft: Option<PpfftConfig>,
}

enum Source {
    MultiChirp { rdm: RangeDopplerMap, map: MatrixC },
    SingleChirp { ppfft: Ppfft, spectrum: VectorC, shifted: VectorC },
}

pub struct DopplerSpectrogram {
    source: Source,
    spect_threshold: Float,
    doppler_bins: usize,
    selected_range_bin: usize,
}

impl DopplerSpectrogram {
    pub fn new(config: &DopplerSpectrogramConfig) -> RadarResult<Self> {
        if config.doppler_fft.fft_type != FftType::C2C {
            return Err(RadarError::ArgumentInvalid("doppler transform must be c2c".into()));
        }
        let spect_threshold = clamp_threshold(config.spect_threshold);
        let (source, doppler_bins) = match config.range_fft {
            Some(range_fft) => {
                let rdm = RangeDopplerMap::new(&RangeDopplerMapConfig {
                    spect_threshold,
                    output_scale: ScaleType::Linear,
                    range_fft,
                    doppler_fft: config.doppler_fft,
                })?;
                let shape = rdm.shape();
                (
                    Source::MultiChirp {
                        rdm,
                        map: MatrixC::zeros(shape),
                    },
                    shape.1,
                )
            }
            None => {
                let ppfft = Ppfft::new(config.doppler_fft)?;
                let bins = ppfft.output_len();
                (
                    Source::SingleChirp {
                        ppfft,
                        spectrum: VectorC::zeros(bins),
                        shifted: VectorC::zeros(bins),
                    },
                    bins,
                )
            }
        };
        Ok(Self {
            source,
            spect_threshold,
            doppler_bins,
            selected_range_bin: 0,
        })
    }

    /// Width of a spectrogram row.
    pub fn doppler_bins(&self) -> usize {
        self.doppler_bins
    }

    /// Range bin picked by the last multi-chirp frame.
    pub fn selected_range_bin(&self) -> usize {
        self.selected_range_bin
    }

    pub fn threshold(&self) -> Float {
        self.spect_threshold
    }

    pub fn set_threshold(&mut self, threshold: Float) {
        self.spect_threshold = clamp_threshold(threshold);
    }

    fn check_output(&self, output: &ArrayViewMut2<Float>) -> RadarResult<()> {
        if output.nrows() == 0 {
            return Err(RadarError::DimensionMismatch("spectrogram has no rows".into()));
        }
        ensure_shape("spectrogram row", &[self.doppler_bins], &[output.ncols()])
    }

    /// Adds one `chirps x samples` frame: the range bin with the most energy
    /// becomes the newest row, in dB.
    pub fn run(&mut self, input: ArrayView2<Float>, mut output: ArrayViewMut2<Float>) -> RadarResult<()> {
        self.check_output(&output)?;
        let (rdm, map) = match &mut self.source {
            Source::MultiChirp { rdm, map } => (rdm, map),
            Source::SingleChirp { .. } => {
                return Err(RadarError::NotSupported("spectrogram configured for single chirp frames".into()))
            }
        };
        rdm.run_complex(input, map.view_mut())?;
        let mut best = (0, Float::NEG_INFINITY);
        for (r, row) in map.axis_iter(Axis(0)).enumerate() {
            let energy: Float = row.iter().map(|v| v.norm_sqr()).sum();
            if energy > best.1 {
                best = (r, energy);
            }
        }
        self.selected_range_bin = best.0;
        push_row(map.row(best.0), self.spect_threshold, &mut output);
        Ok(())
    }

    /// Adds one slow-time vector for devices that deliver a single chirp per
    /// frame.
    pub fn run_single_chirp(&mut self, input: ArrayView1<Complex>, mut output: ArrayViewMut2<Float>) -> RadarResult<()> {
        self.check_output(&output)?;
        match &mut self.source {
            Source::SingleChirp {
                ppfft,
                spectrum,
                shifted,
            } => {
                ppfft.run_complex(input, spectrum.view_mut())?;
                fft_shift(spectrum.view(), shifted.view_mut())?;
                push_row(shifted.view(), self.spect_threshold, &mut output);
                Ok(())
            }
            Source::MultiChirp { .. } => Err(RadarError::NotSupported(
                "spectrogram configured for multi chirp frames".into(),
            )),
        }
    }
}

fn push_row(spectrum: ArrayView1<Complex>, threshold: Float, output: &mut ArrayViewMut2<Float>) {
    shift_rows_down(output);
    for (out, value) in output.row_mut(0).iter_mut().zip(spectrum.iter()) {
        *out = ScaleType::Db20.convert(value.norm(), threshold);
    }
}
