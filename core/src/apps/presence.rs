//! Presence sensing: a debounced two-state machine over the clutter-removed
//! range profile of one receive antenna.

use ndarray::{ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::algo::mti::Mti;
use crate::algo::ppfft::{Ppfft, PpfftConfig};
use crate::containers::{VectorC, VectorR};
use crate::device::config::{DeviceConfig, SensorType};
use crate::math::fft::FftType;
use crate::math::window::{WindowConfig, WindowType};
use crate::prelude::{ensure_shape, Float, FrameProcessor, RadarError, RadarResult};
use crate::radar::spectrum_axis::distance_per_bin;
use crate::telemetry::LogManager;

/// Consecutive frames needed for either transition.
pub const HYSTERESIS_FRAMES: usize = 3;

/// Frames used to learn the first noise floor; no transitions happen meanwhile.
const WARMUP_FRAMES: usize = 10;
const NOISE_FLOOR_BETA: Float = 0.1;
const THRESHOLD_MARGIN: Float = 1e-6;
/// Clutter adapts this much slower while somebody is present.
const PRESENCE_ALPHA_DIVIDER: Float = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresenceConfig {
    pub min_range_m: Float,
    pub max_range_m: Float,
    /// 0 is the least sensitive, 1 the most.
    pub sensitivity: Float,
}

impl PresenceConfig {
    pub fn defaults_for(sensor: SensorType) -> Self {
        let max_range_m = match sensor {
            SensorType::Bgt60atr24c => 3.0,
            SensorType::Bgt60utr11aip => 1.5,
            _ => 2.4,
        };
        Self {
            min_range_m: 0.3,
            max_range_m,
            sensitivity: 0.5,
        }
    }

    fn validate(&self) -> RadarResult<()> {
        if !(0.0..=1.0).contains(&self.sensitivity) {
            return Err(RadarError::ArgumentOutOfBounds(format!("sensitivity {}", self.sensitivity)));
        }
        if self.min_range_m < 0.0 || !(self.min_range_m < self.max_range_m) {
            return Err(RadarError::ArgumentInvalid(format!(
                "detection range [{}, {}] m",
                self.min_range_m, self.max_range_m
            )));
        }
        Ok(())
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self::defaults_for(SensorType::Bgt60tr13c)
    }
}

/// Acquisition settings the presence detector is tuned for.
pub fn presence_device_config() -> DeviceConfig {
    DeviceConfig {
        rx_mask: 1,
        num_samples_per_chirp: 64,
        num_chirps_per_frame: 32,
        ..DeviceConfig::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceState {
    Absence,
    Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PresenceResult {
    pub state: PresenceState,
    pub target_state: bool,
    /// Range of the strongest moving bin; zero while absent.
    pub target_distance_m: Float,
    pub peak: Float,
    pub threshold: Float,
}

pub struct PresenceSensing {
    config: PresenceConfig,
    num_chirps: usize,
    num_samples: usize,
    ppfft: Ppfft,
    spectrum: VectorC,
    profile: VectorR,
    filtered: VectorR,
    mti: Mti,
    alpha_absence: Float,
    distance_per_bin_m: Float,
    min_bin: usize,
    max_bin: usize,
    frames: usize,
    noise_floor: Float,
    state: PresenceState,
    above: usize,
    below: usize,
    logger: LogManager,
}

impl PresenceSensing {
    pub fn new(config: PresenceConfig, device: &DeviceConfig) -> RadarResult<Self> {
        config.validate()?;
        let num_samples = device.num_samples_per_chirp;
        let num_chirps = device.num_chirps_per_frame;
        if num_chirps == 0 || num_samples < 2 {
            return Err(RadarError::ArgumentInvalid(format!(
                "{} chirps of {} samples",
                num_chirps, num_samples
            )));
        }
        let fft_size = 2 * num_samples.next_power_of_two();
        let window = WindowConfig::new(WindowType::BlackmanHarris, num_samples);
        let ppfft = Ppfft::new(
            PpfftConfig::new(FftType::R2C, fft_size, window)
                .with_mean_removal(true)
                .with_normalized_window(true),
        )?;
        let bins = ppfft.output_len();
        let distance_per_bin_m = distance_per_bin(fft_size, num_samples, device.bandwidth_Hz() as Float)?;
        let min_bin = (config.min_range_m / distance_per_bin_m).ceil() as usize;
        let max_bin = ((config.max_range_m / distance_per_bin_m).floor() as usize).min(bins - 1);
        if min_bin > max_bin {
            return Err(RadarError::ArgumentOutOfBounds(format!(
                "detection range starts at {} m, sensor reaches {} m",
                config.min_range_m,
                bins as Float * distance_per_bin_m
            )));
        }
        let alpha_absence = absence_alpha(config.sensitivity);
        let logger = LogManager::new("presence");
        logger.record(format_args!(
            "range bins {}..={} of {:.3} m, sensitivity {}",
            min_bin, max_bin, distance_per_bin_m, config.sensitivity
        ));
        Ok(Self {
            config,
            num_chirps,
            num_samples,
            spectrum: VectorC::zeros(bins),
            profile: VectorR::zeros(bins),
            filtered: VectorR::zeros(bins),
            mti: Mti::new(alpha_absence, bins)?,
            ppfft,
            alpha_absence,
            distance_per_bin_m,
            min_bin,
            max_bin,
            frames: 0,
            noise_floor: 0.0,
            state: PresenceState::Absence,
            above: 0,
            below: 0,
            logger,
        })
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    pub fn noise_floor(&self) -> Float {
        self.noise_floor
    }

    pub fn distance_per_bin_m(&self) -> Float {
        self.distance_per_bin_m
    }

    pub fn set_sensitivity(&mut self, sensitivity: Float) -> RadarResult<()> {
        PresenceConfig { sensitivity, ..self.config }.validate()?;
        self.config.sensitivity = sensitivity;
        self.alpha_absence = absence_alpha(sensitivity);
        self.mti.set_alpha(self.current_alpha())
    }

    fn current_alpha(&self) -> Float {
        match self.state {
            PresenceState::Absence => self.alpha_absence,
            PresenceState::Presence => self.alpha_absence / PRESENCE_ALPHA_DIVIDER,
        }
    }

    fn threshold(&self) -> Float {
        detection_threshold(self.noise_floor, self.config.sensitivity)
    }

    fn transition(&mut self, next: PresenceState) -> RadarResult<()> {
        self.state = next;
        self.above = 0;
        self.below = 0;
        self.logger.record(format_args!("state changed to {:?} at frame {}", next, self.frames));
        self.mti.set_alpha(self.current_alpha())
    }
}

/// Multiplier applied to the noise floor. It falls from 5 at sensitivity 0 to
/// 1 at sensitivity 1, so the threshold never drops below the floor itself.
pub fn noise_floor_scale(sensitivity: Float) -> Float {
    1.0 + 4.0 * (1.0 - sensitivity)
}

/// Peak level a clutter-removed profile must exceed to count as a hit.
pub fn detection_threshold(noise_floor: Float, sensitivity: Float) -> Float {
    noise_floor_scale(sensitivity) * noise_floor + THRESHOLD_MARGIN
}

fn absence_alpha(sensitivity: Float) -> Float {
    0.1 * (1.0 - 0.5 * sensitivity)
}

impl FrameProcessor for PresenceSensing {
    type Output = PresenceResult;

    fn process(&mut self, frame: ArrayView3<Float>) -> RadarResult<PresenceResult> {
        let (rx, chirps, samples) = frame.dim();
        if rx == 0 {
            return Err(RadarError::DimensionMismatch("frame without antennas".into()));
        }
        ensure_shape("presence frame", &[self.num_chirps, self.num_samples], &[chirps, samples])?;

        self.profile.fill(0.0);
        let scale = 1.0 / chirps as Float;
        for chirp in frame.index_axis(Axis(0), 0).axis_iter(Axis(0)) {
            self.ppfft.run_real(chirp, self.spectrum.view_mut())?;
            self.profile.zip_mut_with(&self.spectrum, |p, s| *p += s.norm() * scale);
        }
        if self.frames == 0 {
            self.mti.seed(self.profile.view())?;
        }
        self.mti.run(self.profile.view(), self.filtered.view_mut())?;
        self.frames += 1;

        // only energy above the clutter estimate counts; a target leaving
        // shows up as a negative residue
        let mut peak = (self.min_bin, 0.0);
        for bin in self.min_bin..=self.max_bin {
            let value = self.filtered[bin].max(0.0);
            if value > peak.1 {
                peak = (bin, value);
            }
        }
        let (peak_bin, peak_value) = peak;

        if self.frames <= WARMUP_FRAMES {
            // the seeded first frame carries no information
            if self.frames > 1 {
                let learned = (self.frames - 1) as Float;
                self.noise_floor += (peak_value - self.noise_floor) / learned;
            }
            return Ok(self.result(peak_bin, peak_value, self.threshold()));
        }

        let threshold = self.threshold();
        if peak_value > threshold {
            self.above += 1;
            self.below = 0;
        } else {
            self.below += 1;
            self.above = 0;
            if self.state == PresenceState::Absence {
                self.noise_floor = (1.0 - NOISE_FLOOR_BETA) * self.noise_floor + NOISE_FLOOR_BETA * peak_value;
            }
        }
        match self.state {
            PresenceState::Absence if self.above >= HYSTERESIS_FRAMES => self.transition(PresenceState::Presence)?,
            PresenceState::Presence if self.below >= HYSTERESIS_FRAMES => self.transition(PresenceState::Absence)?,
            _ => {}
        }
        Ok(self.result(peak_bin, peak_value, threshold))
    }

    fn reset(&mut self) {
        self.mti.reset();
        self.frames = 0;
        self.noise_floor = 0.0;
        self.above = 0;
        self.below = 0;
        self.state = PresenceState::Absence;
        let alpha = self.alpha_absence;
        if self.mti.set_alpha(alpha).is_err() {
            self.logger.degraded(format_args!("mti coefficient rejected on reset"));
        }
    }
}

impl PresenceSensing {
    fn result(&self, peak_bin: usize, peak: Float, threshold: Float) -> PresenceResult {
        let present = self.state == PresenceState::Presence;
        PresenceResult {
            state: self.state,
            target_state: present,
            target_distance_m: if present {
                peak_bin as Float * self.distance_per_bin_m
            } else {
                0.0
            },
            peak,
            threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sensor::Sensor;
    use crate::device::synthetic::{Scene, SyntheticSensor, Target};
    use ndarray::Array3;

    fn setup(seed: u64) -> (SyntheticSensor, PresenceSensing, Array3<Float>) {
        let device = presence_device_config();
        let mut sensor = SyntheticSensor::new(
            SensorType::Bgt60tr13c,
            Scene {
                seed,
                noise_std: 0.01,
                ..Scene::default()
            },
        )
        .unwrap();
        sensor.set_config(&device).unwrap();
        sensor.start_acquisition().unwrap();
        let presence = PresenceSensing::new(
            PresenceConfig {
                min_range_m: 0.5,
                max_range_m: 3.0,
                sensitivity: 0.5,
            },
            &device,
        )
        .unwrap();
        (sensor, presence, Array3::zeros(device.frame_shape()))
    }

    fn step(sensor: &mut SyntheticSensor, presence: &mut PresenceSensing, frame: &mut Array3<Float>) -> PresenceResult {
        sensor.get_next_frame(frame.view_mut(), 100).unwrap();
        presence.process(frame.view()).unwrap()
    }

    #[test]
    fn target_after_quiet_period_is_detected() {
        let (mut sensor, mut presence, mut frame) = setup(3);
        for _ in 0..50 {
            assert!(!step(&mut sensor, &mut presence, &mut frame).target_state);
        }
        sensor.targets_mut().push(Target {
            range_m: 1.5,
            speed_m_s: 0.2,
            ..Target::default()
        });
        let mut detected_at = None;
        let mut last = None;
        for frame_number in 51..=60 {
            let result = step(&mut sensor, &mut presence, &mut frame);
            if result.target_state && detected_at.is_none() {
                detected_at = Some(frame_number);
            }
            last = Some(result);
        }
        assert!(detected_at.unwrap() <= 54);
        let last = last.unwrap();
        assert!(last.target_state);
        assert!((last.target_distance_m - 1.5).abs() <= presence.distance_per_bin_m());
    }

    #[test]
    fn single_spike_does_not_flip_state() {
        let (mut sensor, mut presence, mut frame) = setup(11);
        for _ in 0..30 {
            step(&mut sensor, &mut presence, &mut frame);
        }
        sensor.targets_mut().push(Target {
            range_m: 2.0,
            ..Target::default()
        });
        assert_eq!(step(&mut sensor, &mut presence, &mut frame).state, PresenceState::Absence);
        sensor.targets_mut().clear();
        for _ in 0..5 {
            assert_eq!(step(&mut sensor, &mut presence, &mut frame).state, PresenceState::Absence);
        }

        sensor.targets_mut().push(Target {
            range_m: 2.0,
            ..Target::default()
        });
        let states: Vec<_> = (0..HYSTERESIS_FRAMES)
            .map(|_| step(&mut sensor, &mut presence, &mut frame).state)
            .collect();
        assert_eq!(states[..HYSTERESIS_FRAMES - 1], [PresenceState::Absence; HYSTERESIS_FRAMES - 1]);
        assert_eq!(states[HYSTERESIS_FRAMES - 1], PresenceState::Presence);
    }

    #[test]
    fn threshold_scales_the_learned_noise_floor() {
        assert_eq!(noise_floor_scale(1.0), 1.0);
        assert_eq!(noise_floor_scale(0.5), 3.0);
        assert_eq!(noise_floor_scale(0.0), 5.0);
        assert!((detection_threshold(0.000307, 0.5) - (3.0 * 0.000307 + THRESHOLD_MARGIN)).abs() < 1e-9);
        assert!(detection_threshold(0.01, 0.9) < detection_threshold(0.01, 0.1));

        let (mut sensor, mut presence, mut frame) = setup(3);
        for _ in 0..20 {
            step(&mut sensor, &mut presence, &mut frame);
        }
        let floor = presence.noise_floor();
        assert!(floor > 0.0);
        let result = step(&mut sensor, &mut presence, &mut frame);
        assert_eq!(result.threshold, detection_threshold(floor, 0.5));
        assert!((result.threshold - (3.0 * floor + THRESHOLD_MARGIN)).abs() <= 1e-6 * result.threshold);
        assert!(!result.target_state);
    }

    #[test]
    fn configuration_is_checked() {
        let device = presence_device_config();
        let bad = |config: PresenceConfig| PresenceSensing::new(config, &device).is_err();
        assert!(bad(PresenceConfig { sensitivity: 1.5, ..PresenceConfig::default() }));
        assert!(bad(PresenceConfig { min_range_m: 2.0, max_range_m: 1.0, ..PresenceConfig::default() }));
        assert!(bad(PresenceConfig { min_range_m: 50.0, max_range_m: 60.0, ..PresenceConfig::default() }));

        let mut presence = PresenceSensing::new(PresenceConfig::default(), &device).unwrap();
        let wrong = Array3::<Float>::zeros((1, 16, 64));
        assert!(presence.process(wrong.view()).is_err());
        presence.set_sensitivity(0.9).unwrap();
        assert!(presence.set_sensitivity(-0.1).is_err());
        presence.reset();
        assert_eq!(presence.state(), PresenceState::Absence);
        assert_eq!(PresenceConfig::defaults_for(SensorType::Bgt60atr24c).max_range_m, 3.0);
    }
}
