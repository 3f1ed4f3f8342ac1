//! Deterministic software sensor rendering point targets into raw IF frames.
//!
//! Receivers sit on an L-shaped grid with half-wavelength spacing:
//! RX0 at (0, 1), RX1 at (1, 0) and RX2 at (1, 1). Azimuth moves the phase
//! along x, elevation along y, so the RX0/RX2 pair sees azimuth and the
//! RX1/RX2 pair sees elevation.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

use ndarray::{ArrayViewMut3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::device::config::{mask_to_indices, DeviceConfig, SensorInfo, SensorType};
use crate::device::sensor::Sensor;
use crate::prelude::{ensure_shape, Float, RadarError, RadarResult, LIGHT_SPEED_M_S};
use crate::telemetry::LogManager;

/// Antenna positions in units of half a wavelength.
const RX_POSITIONS: [(f64, f64); 4] = [(0.0, 1.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)];

const DEFAULT_TEMPERATURE_EXPIRATION: Duration = Duration::from_millis(100);

/// Point reflector. Positive speed moves away from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub range_m: Float,
    pub speed_m_s: Float,
    pub azimuth_deg: Float,
    pub elevation_deg: Float,
    pub amplitude: Float,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            range_m: 1.0,
            speed_m_s: 0.0,
            azimuth_deg: 0.0,
            elevation_deg: 0.0,
            amplitude: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub targets: Vec<Target>,
    /// Static reflectors; their speed is ignored.
    pub clutter: Vec<Target>,
    pub noise_std: Float,
    pub seed: u64,
    pub ambient_temperature_celsius: Float,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            clutter: Vec::new(),
            noise_std: 0.01,
            seed: 0,
            ambient_temperature_celsius: 25.0,
        }
    }
}

struct TemperatureCache {
    expiration: Duration,
    value: Float,
    valid_until: Option<Instant>,
}

pub struct SyntheticSensor {
    sensor_type: SensorType,
    info: SensorInfo,
    config: DeviceConfig,
    scene: Scene,
    rng: StdRng,
    noise: Normal<Float>,
    acquiring: bool,
    frame_index: u64,
    temperature: TemperatureCache,
    logger: LogManager,
}

impl SyntheticSensor {
    pub fn new(sensor_type: SensorType, scene: Scene) -> RadarResult<Self> {
        let info = sensor_type.info();
        let available = (1u32 << info.num_rx_antennas) - 1;
        let config = DeviceConfig {
            rx_mask: DeviceConfig::default().rx_mask & available,
            ..DeviceConfig::default()
        };
        let noise = Normal::new(0.0, scene.noise_std)
            .map_err(|err| RadarError::ArgumentInvalid(format!("noise: {}", err)))?;
        Ok(Self {
            sensor_type,
            info,
            config,
            rng: StdRng::seed_from_u64(scene.seed),
            noise,
            scene,
            acquiring: false,
            frame_index: 0,
            temperature: TemperatureCache {
                expiration: DEFAULT_TEMPERATURE_EXPIRATION,
                value: 0.0,
                valid_until: None,
            },
            logger: LogManager::new("synthetic-sensor"),
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Targets can be added or moved between frames.
    pub fn targets_mut(&mut self) -> &mut Vec<Target> {
        &mut self.scene.targets
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn temperature_expiration(&self) -> Duration {
        self.temperature.expiration
    }

    pub fn set_temperature_expiration(&mut self, expiration: Duration) {
        self.temperature.expiration = expiration;
        self.temperature.valid_until = None;
    }

    fn render(&mut self, mut frame: ArrayViewMut3<Float>) {
        let config = self.config;
        let c = LIGHT_SPEED_M_S as f64;
        let wavelength_m = c / config.center_frequency_Hz();
        let bandwidth_hz = config.bandwidth_Hz();
        let samples = config.num_samples_per_chirp as f64;
        let frame_start_s = self.frame_index as f64 * config.frame_repetition_time_s as f64;
        let chirp_time_s = config.chirp_repetition_time_s as f64;

        let noise = self.noise;
        let rng = &mut self.rng;
        frame.map_inplace(|v| *v = noise.sample(&mut *rng));

        let reflectors = self
            .scene
            .targets
            .iter()
            .copied()
            .chain(self.scene.clutter.iter().map(|t| Target { speed_m_s: 0.0, ..*t }));
        for target in reflectors {
            let range_m = target.range_m as f64;
            let cycles_per_sample = 2.0 * bandwidth_hz * range_m / (c * samples);
            let range_phase = 4.0 * PI * range_m / wavelength_m;
            let sin_az = (target.azimuth_deg as f64).to_radians().sin();
            let sin_el = (target.elevation_deg as f64).to_radians().sin();
            let amplitude = target.amplitude as f64;
            for (mut channel, rx) in frame.axis_iter_mut(Axis(0)).zip(mask_to_indices(config.rx_mask)) {
                let (x, y) = RX_POSITIONS[rx % RX_POSITIONS.len()];
                let spatial_phase = -PI * (x * sin_az + y * sin_el);
                for (n, mut chirp) in channel.axis_iter_mut(Axis(0)).enumerate() {
                    let t = frame_start_s + n as f64 * chirp_time_s;
                    let doppler_phase = 4.0 * PI * target.speed_m_s as f64 * t / wavelength_m;
                    let phase = range_phase + doppler_phase + spatial_phase;
                    for (k, sample) in chirp.iter_mut().enumerate() {
                        let value = amplitude * (2.0 * PI * cycles_per_sample * k as f64 + phase).cos();
                        *sample += value as Float;
                    }
                }
            }
        }
    }
}

impl Sensor for SyntheticSensor {
    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn sensor_information(&self) -> &SensorInfo {
        &self.info
    }

    fn set_config(&mut self, config: &DeviceConfig) -> RadarResult<()> {
        if self.acquiring {
            return Err(RadarError::DeviceBusy);
        }
        config.validate(&self.info)?;
        self.config = *config;
        self.logger.record(format_args!(
            "configured {} rx, {} chirps of {} samples",
            config.num_rx_antennas(),
            config.num_chirps_per_frame,
            config.num_samples_per_chirp
        ));
        Ok(())
    }

    fn get_config(&self) -> RadarResult<DeviceConfig> {
        Ok(self.config)
    }

    fn start_acquisition(&mut self) -> RadarResult<()> {
        self.config.validate(&self.info)?;
        self.acquiring = true;
        Ok(())
    }

    fn stop_acquisition(&mut self) -> RadarResult<()> {
        self.acquiring = false;
        Ok(())
    }

    fn get_next_frame(&mut self, mut frame: ArrayViewMut3<Float>, _timeout_ms: u32) -> RadarResult<()> {
        if !self.acquiring {
            return Err(RadarError::NotPossible("acquisition is not running".into()));
        }
        let (rx, chirps, samples) = self.config.frame_shape();
        ensure_shape("sensor frame", &[rx, chirps, samples], frame.shape())?;
        self.render(frame.view_mut());
        self.frame_index += 1;
        Ok(())
    }

    fn get_temperature(&mut self) -> RadarResult<Float> {
        if !self.sensor_type.supports_temperature() {
            return Err(RadarError::NotSupported(format!("temperature on {}", self.sensor_type.name())));
        }
        let now = Instant::now();
        if let Some(valid_until) = self.temperature.valid_until {
            if now < valid_until {
                return Ok(self.temperature.value);
            }
        }
        // the die warms up slowly while frames are produced
        let value = self.scene.ambient_temperature_celsius + 0.01 * self.frame_index.min(1000) as Float;
        self.temperature.value = value;
        self.temperature.valid_until = Some(now + self.temperature.expiration);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::max;
    use crate::device::metrics::metrics_from_config;
    use ndarray::{Array1, Array3};
    use rustfft::FftPlanner;
    use crate::prelude::Complex;

    fn sensor(scene: Scene) -> SyntheticSensor {
        let mut sensor = SyntheticSensor::new(SensorType::Bgt60tr13c, scene).unwrap();
        sensor.start_acquisition().unwrap();
        sensor
    }

    fn frame_for(sensor: &SyntheticSensor) -> Array3<Float> {
        Array3::zeros(sensor.get_config().unwrap().frame_shape())
    }

    #[test]
    fn target_lands_in_expected_range_bin() {
        let config = DeviceConfig::default();
        let resolution = metrics_from_config(&config).unwrap().range_resolution_m;
        let mut sensor = sensor(Scene {
            targets: vec![Target {
                range_m: 10.0 * resolution,
                ..Target::default()
            }],
            noise_std: 0.0,
            ..Scene::default()
        });
        let mut frame = frame_for(&sensor);
        sensor.get_next_frame(frame.view_mut(), 100).unwrap();

        let chirp = frame.slice(ndarray::s![0, 0, ..]);
        let mut buffer: Vec<Complex> = chirp.iter().map(|&v| Complex::new(v, 0.0)).collect();
        FftPlanner::new().plan_fft_forward(buffer.len()).process(&mut buffer);
        let magnitudes = Array1::from_iter(buffer[..32].iter().map(|v| v.norm()));
        let (bin, _) = max(magnitudes.view()).unwrap();
        assert_eq!(bin, 10);
    }

    #[test]
    fn azimuth_shows_up_between_rx0_and_rx2() {
        let mut sensor = sensor(Scene {
            targets: vec![Target {
                range_m: 1.0,
                azimuth_deg: 30.0,
                ..Target::default()
            }],
            noise_std: 0.0,
            ..Scene::default()
        });
        let mut frame = frame_for(&sensor);
        sensor.get_next_frame(frame.view_mut(), 100).unwrap();
        // RX0 leads RX2 by pi * sin(30°)
        let rx0 = frame.slice(ndarray::s![0, 0, ..]).to_owned();
        let rx1 = frame.slice(ndarray::s![1, 0, ..]).to_owned();
        let rx2 = frame.slice(ndarray::s![2, 0, ..]).to_owned();
        assert!(rx0.iter().zip(rx2.iter()).any(|(a, b)| (a - b).abs() > 0.1));
        // zero elevation keeps RX1 and RX2 in phase
        assert!(rx1.iter().zip(rx2.iter()).all(|(a, b)| (a - b).abs() < 1e-4));
    }

    #[test]
    fn frames_are_deterministic_per_seed() {
        let scene = Scene {
            seed: 7,
            noise_std: 0.1,
            ..Scene::default()
        };
        let mut first = sensor(scene.clone());
        let mut second = sensor(scene);
        let mut a = frame_for(&first);
        let mut b = frame_for(&second);
        first.get_next_frame(a.view_mut(), 0).unwrap();
        second.get_next_frame(b.view_mut(), 0).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.frame_index(), 1);
    }

    #[test]
    fn acquisition_state_and_shapes() {
        let mut sensor = SyntheticSensor::new(SensorType::Bgt60tr13c, Scene::default()).unwrap();
        let mut frame = frame_for(&sensor);
        assert!(sensor.get_next_frame(frame.view_mut(), 0).is_err());
        sensor.start_acquisition().unwrap();
        assert_eq!(sensor.set_config(&DeviceConfig::default()), Err(RadarError::DeviceBusy));
        let mut wrong = Array3::zeros((2, 32, 64));
        assert!(matches!(
            sensor.get_next_frame(wrong.view_mut(), 0),
            Err(RadarError::DimensionMismatch(_))
        ));
        sensor.stop_acquisition().unwrap();
        let single_rx = DeviceConfig {
            rx_mask: 0b001,
            ..DeviceConfig::default()
        };
        sensor.set_config(&single_rx).unwrap();
        assert_eq!(sensor.get_config().unwrap().frame_shape(), (1, 32, 64));
    }

    #[test]
    fn temperature_is_cached_until_expiration() {
        let mut sensor = sensor(Scene::default());
        sensor.set_temperature_expiration(Duration::from_secs(3600));
        let first = sensor.get_temperature().unwrap();
        let mut frame = frame_for(&sensor);
        for _ in 0..10 {
            sensor.get_next_frame(frame.view_mut(), 0).unwrap();
        }
        assert_eq!(sensor.get_temperature().unwrap(), first);

        sensor.set_temperature_expiration(Duration::ZERO);
        assert!(sensor.get_temperature().unwrap() > first);

        let mut aip = SyntheticSensor::new(SensorType::Bgt60utr11aip, Scene::default()).unwrap();
        assert!(matches!(aip.get_temperature(), Err(RadarError::NotSupported(_))));
        assert_eq!(aip.get_config().unwrap().num_rx_antennas(), 1);
    }
}
