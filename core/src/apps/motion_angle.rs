//! Closest moving target with its position in 3-D.
//!
//! Azimuth comes from the RX0/RX2 phase difference, elevation from RX1/RX2.
//! `dx` grows to the right, `dy` upwards and `dz` away from the sensor
//! plane.

use ndarray::{ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::apps::spectrum::RxSpectrum;
use crate::containers::MatrixR;
use crate::device::config::DeviceConfig;
use crate::math::stats::StatsHelper;
use crate::prelude::{Complex, Float, FrameProcessor, RadarError, RadarResult, LIGHT_SPEED_M_S};
use crate::radar::monopulse::AngleMonopulse;
use crate::radar::spectrum_axis::{distance_per_bin, speed_per_bin};
use crate::telemetry::LogManager;

const ALPHA_MTI: Float = 0.3;
const SMOOTHING: Float = 0.5;
const MIN_THRESHOLD: Float = 1e-6;
const AZIMUTH_PAIR: (usize, usize) = (0, 2);
const ELEVATION_PAIR: (usize, usize) = (1, 2);

/// Preset acquisitions: 430 MHz bandwidth at 50 frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionAngleMode {
    Spc32Cpf8,
    Spc32Cpf16,
    Spc32Cpf32,
    Spc32Cpf64,
    Spc128Cpf8,
}

impl Default for MotionAngleMode {
    fn default() -> Self {
        MotionAngleMode::Spc128Cpf8
    }
}

impl MotionAngleMode {
    pub fn device_config(self) -> DeviceConfig {
        let (samples, chirps) = match self {
            MotionAngleMode::Spc32Cpf8 => (32, 8),
            MotionAngleMode::Spc32Cpf16 => (32, 16),
            MotionAngleMode::Spc32Cpf32 => (32, 32),
            MotionAngleMode::Spc32Cpf64 => (32, 64),
            MotionAngleMode::Spc128Cpf8 => (128, 8),
        };
        DeviceConfig {
            rx_mask: 0b111,
            start_frequency_Hz: 60.785e9,
            end_frequency_Hz: 61.215e9,
            num_samples_per_chirp: samples,
            num_chirps_per_frame: chirps,
            chirp_repetition_time_s: 300e-6,
            frame_repetition_time_s: 0.02,
            ..DeviceConfig::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionAngleConfig {
    pub mode: MotionAngleMode,
    pub sensitivity: Float,
    pub max_range_m: Float,
}

impl Default for MotionAngleConfig {
    fn default() -> Self {
        Self {
            mode: MotionAngleMode::default(),
            sensitivity: 0.5,
            max_range_m: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionAngleResult {
    /// `-1` when nothing moves in range.
    pub distance_m: Float,
    pub dx: Float,
    pub dy: Float,
    pub dz: Float,
    pub azimuth_deg: Float,
    pub elevation_deg: Float,
    pub speed_m_s: Float,
}

impl MotionAngleResult {
    pub const ABSENT: Self = Self {
        distance_m: -1.0,
        dx: 0.0,
        dy: 0.0,
        dz: 0.0,
        azimuth_deg: 0.0,
        elevation_deg: 0.0,
        speed_m_s: 0.0,
    };

    pub fn is_present(&self) -> bool {
        self.distance_m >= 0.0
    }
}

pub struct MotionAngle {
    config: MotionAngleConfig,
    device: DeviceConfig,
    spectrum: RxSpectrum,
    monopulse: AngleMonopulse,
    combined: MatrixR,
    scratch: Vec<Float>,
    distance_per_bin_m: Float,
    speed_per_bin_m_s: Float,
    max_bin: usize,
    last: MotionAngleResult,
    logger: LogManager,
}

fn check_sensitivity(sensitivity: Float) -> RadarResult<()> {
    if (0.0..=1.0).contains(&sensitivity) {
        Ok(())
    } else {
        Err(RadarError::ArgumentOutOfBounds(format!("sensitivity {}", sensitivity)))
    }
}

impl MotionAngle {
    pub fn new(config: MotionAngleConfig) -> RadarResult<Self> {
        Self::with_device(config, &config.mode.device_config())
    }

    /// Runs on a custom acquisition; the first three receivers must be on.
    pub fn with_device(config: MotionAngleConfig, device: &DeviceConfig) -> RadarResult<Self> {
        check_sensitivity(config.sensitivity)?;
        if device.rx_mask & 0b111 != 0b111 {
            return Err(RadarError::NotSupported("motion angle needs RX0, RX1 and RX2".into()));
        }
        let spectrum = RxSpectrum::new(device, vec![0, 1, 2], ALPHA_MTI)?;
        let (range_bins, doppler_bins, _) = spectrum.filtered().dim();
        let center_frequency_hz = device.center_frequency_Hz() as Float;
        let wavelength_m = LIGHT_SPEED_M_S / center_frequency_hz;
        let mut tracker = Self {
            distance_per_bin_m: distance_per_bin(
                spectrum.range_fft_size(),
                device.num_samples_per_chirp,
                device.bandwidth_Hz() as Float,
            )?,
            speed_per_bin_m_s: speed_per_bin(
                spectrum.doppler_fft_size(),
                device.chirp_repetition_time_s,
                center_frequency_hz,
            )?,
            monopulse: AngleMonopulse::new(wavelength_m, wavelength_m / 2.0)?,
            combined: MatrixR::zeros((range_bins, doppler_bins)),
            scratch: vec![0.0; range_bins * doppler_bins],
            spectrum,
            config,
            device: *device,
            max_bin: 0,
            last: MotionAngleResult::ABSENT,
            logger: LogManager::new("motion-angle"),
        };
        tracker.set_max_range_m(config.max_range_m)?;
        Ok(tracker)
    }

    pub fn config(&self) -> &MotionAngleConfig {
        &self.config
    }

    pub fn device_config(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn sensitivity(&self) -> Float {
        self.config.sensitivity
    }

    pub fn set_sensitivity(&mut self, sensitivity: Float) -> RadarResult<()> {
        check_sensitivity(sensitivity)?;
        self.config.sensitivity = sensitivity;
        Ok(())
    }

    pub fn max_range_m(&self) -> Float {
        self.config.max_range_m
    }

    pub fn set_max_range_m(&mut self, max_range_m: Float) -> RadarResult<()> {
        if !(max_range_m > self.distance_per_bin_m) {
            return Err(RadarError::ArgumentOutOfBounds(format!("max range {} m", max_range_m)));
        }
        let range_bins = self.combined.dim().0;
        let bin = (max_range_m / self.distance_per_bin_m).floor() as usize;
        if bin >= range_bins {
            self.logger.degraded(format_args!(
                "max range {} m beyond the last range bin, using {} m",
                max_range_m,
                (range_bins - 1) as Float * self.distance_per_bin_m
            ));
        }
        self.max_bin = bin.min(range_bins - 1);
        self.config.max_range_m = max_range_m;
        Ok(())
    }

    fn threshold(&mut self) -> Float {
        let scale = 4.0 + 8.0 * (1.0 - self.config.sensitivity);
        let median = self
            .combined
            .as_slice()
            .and_then(|values| StatsHelper::median_with(values, &mut self.scratch))
            .unwrap_or(0.0);
        (scale * median).max(MIN_THRESHOLD)
    }

    /// Closest range bin in `0..=max_bin` with a cell above `threshold`,
    /// moved forward to the top of that return.
    fn closest_target(&self, threshold: Float) -> Option<(usize, usize)> {
        let row_peak = |r: usize| {
            let mut best = (0, 0.0);
            for (d, &value) in self.combined.row(r).iter().enumerate() {
                if value > best.1 {
                    best = (d, value);
                }
            }
            best
        };
        let mut range_bin = (0..=self.max_bin).find(|&r| row_peak(r).1 > threshold)?;
        while range_bin < self.max_bin && row_peak(range_bin + 1).1 > row_peak(range_bin).1 {
            range_bin += 1;
        }
        Some((range_bin, row_peak(range_bin).0))
    }

    fn smooth(&self, next: MotionAngleResult) -> MotionAngleResult {
        if !self.last.is_present() {
            return next;
        }
        let mix = |old: Float, new: Float| SMOOTHING * old + (1.0 - SMOOTHING) * new;
        MotionAngleResult {
            distance_m: mix(self.last.distance_m, next.distance_m),
            dx: mix(self.last.dx, next.dx),
            dy: mix(self.last.dy, next.dy),
            dz: mix(self.last.dz, next.dz),
            azimuth_deg: mix(self.last.azimuth_deg, next.azimuth_deg),
            elevation_deg: mix(self.last.elevation_deg, next.elevation_deg),
            speed_m_s: mix(self.last.speed_m_s, next.speed_m_s),
        }
    }
}

impl FrameProcessor for MotionAngle {
    type Output = MotionAngleResult;

    fn process(&mut self, frame: ArrayView3<Float>) -> RadarResult<MotionAngleResult> {
        let (_, chirps, samples) = frame.dim();
        if chirps != self.device.num_chirps_per_frame || samples != self.device.num_samples_per_chirp {
            return Err(RadarError::DimensionMismatch(format!(
                "frame of {}x{}, configured for {}x{}",
                chirps, samples, self.device.num_chirps_per_frame, self.device.num_samples_per_chirp
            )));
        }
        self.spectrum.run(frame)?;
        let spectrum = self.spectrum.filtered();
        for ((r, d), value) in self.combined.indexed_iter_mut() {
            let sum = spectrum.slice(ndarray::s![r, d, ..]).iter().fold(Complex::new(0.0, 0.0), |acc, v| acc + v);
            *value = sum.norm();
        }
        let threshold = self.threshold();

        let (range_bin, doppler_bin) = match self.closest_target(threshold) {
            Some(found) => found,
            None => {
                if self.last.is_present() {
                    self.logger.trace_frame(format_args!("target lost"));
                }
                self.last = MotionAngleResult::ABSENT;
                return Ok(self.last);
            }
        };
        let spectrum = self.spectrum.filtered();
        let cell = spectrum.slice(ndarray::s![range_bin, doppler_bin, ..]);
        let azimuth_deg = self.monopulse.run(cell[AZIMUTH_PAIR.0], cell[AZIMUTH_PAIR.1]);
        let elevation_deg = self.monopulse.run(cell[ELEVATION_PAIR.0], cell[ELEVATION_PAIR.1]);
        let distance_m = range_bin as Float * self.distance_per_bin_m;
        let (sin_az, sin_el) = (azimuth_deg.to_radians().sin(), elevation_deg.to_radians().sin());
        let doppler_center = self.combined.len_of(Axis(1)) / 2;
        let measured = MotionAngleResult {
            distance_m,
            dx: distance_m * sin_az,
            dy: distance_m * sin_el,
            dz: distance_m * (1.0 - sin_az * sin_az - sin_el * sin_el).max(0.0).sqrt(),
            azimuth_deg,
            elevation_deg,
            speed_m_s: (doppler_bin as Float - doppler_center as Float) * self.speed_per_bin_m_s,
        };
        if !self.last.is_present() {
            self.logger.trace_frame(format_args!("target acquired at {:.2} m", distance_m));
        }
        self.last = self.smooth(measured);
        Ok(self.last)
    }

    fn reset(&mut self) {
        self.spectrum.reset();
        self.last = MotionAngleResult::ABSENT;
    }
}
