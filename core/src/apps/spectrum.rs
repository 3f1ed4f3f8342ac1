//! Clutter-free complex range-Doppler spectrum for a set of receive antennas.

use ndarray::{ArrayView3, Axis};

use crate::algo::mti::Mti2dC;
use crate::algo::ppfft::PpfftConfig;
use crate::containers::CubeC;
use crate::device::config::DeviceConfig;
use crate::math::fft::FftType;
use crate::math::window::{WindowConfig, WindowType};
use crate::prelude::{Complex, Float, RadarError, RadarResult};
use crate::radar::rdm::{RangeDopplerMap, RangeDopplerMapConfig};
use crate::radar::ScaleType;

pub(crate) struct RxSpectrum {
    rdm: RangeDopplerMap,
    mti: Vec<Mti2dC>,
    channels: Vec<usize>,
    /// `range x doppler x channels`
    maps: CubeC,
    filtered: CubeC,
    seeded: bool,
}

impl RxSpectrum {
    /// Range FFT of twice the chirp length, Doppler FFT of twice the chirp
    /// count. `channels` index the antenna axis of incoming frames.
    pub(crate) fn new(device: &DeviceConfig, channels: Vec<usize>, alpha_mti: Float) -> RadarResult<Self> {
        if channels.is_empty() {
            return Err(RadarError::ArgumentInvalid("no receive channels".into()));
        }
        let samples = device.num_samples_per_chirp;
        let chirps = device.num_chirps_per_frame;
        let config = RangeDopplerMapConfig {
            spect_threshold: 1e-6,
            output_scale: ScaleType::Linear,
            range_fft: PpfftConfig::new(
                FftType::R2C,
                2 * samples.next_power_of_two(),
                WindowConfig::new(WindowType::BlackmanHarris, samples),
            )
            .with_mean_removal(true)
            .with_normalized_window(true),
            doppler_fft: PpfftConfig::new(
                FftType::C2C,
                2 * chirps.next_power_of_two(),
                WindowConfig::chebyshev(chirps, 100.0),
            )
            .with_normalized_window(true),
        };
        let rdm = RangeDopplerMap::new(&config)?;
        let (range_bins, doppler_bins) = rdm.shape();
        let mti = (0..channels.len())
            .map(|_| Mti2dC::new(alpha_mti, range_bins, doppler_bins))
            .collect::<RadarResult<Vec<_>>>()?;
        let shape = (range_bins, doppler_bins, channels.len());
        Ok(Self {
            rdm,
            mti,
            channels,
            maps: CubeC::zeros(shape),
            filtered: CubeC::zeros(shape),
            seeded: false,
        })
    }

    pub(crate) fn range_fft_size(&self) -> usize {
        2 * self.rdm.shape().0
    }

    pub(crate) fn doppler_fft_size(&self) -> usize {
        self.rdm.shape().1
    }

    /// `range x doppler x channels` spectrum after clutter removal.
    pub(crate) fn filtered(&self) -> ArrayView3<'_, Complex> {
        self.filtered.view()
    }

    /// The first frame only seeds the clutter estimate and yields zeros.
    pub(crate) fn run(&mut self, frame: ArrayView3<Float>) -> RadarResult<()> {
        for (slot, &channel) in self.channels.iter().enumerate() {
            if channel >= frame.dim().0 {
                return Err(RadarError::DimensionMismatch(format!(
                    "frame has {} antennas, channel {} requested",
                    frame.dim().0,
                    channel
                )));
            }
            self.rdm
                .run_complex(frame.index_axis(Axis(0), channel), self.maps.index_axis_mut(Axis(2), slot))?;
            if !self.seeded {
                self.mti[slot].seed(self.maps.index_axis(Axis(2), slot))?;
            }
            self.mti[slot].run(self.maps.index_axis(Axis(2), slot), self.filtered.index_axis_mut(Axis(2), slot))?;
        }
        self.seeded = true;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        for mti in &mut self.mti {
            mti.reset();
        }
        self.seeded = false;
    }
}
