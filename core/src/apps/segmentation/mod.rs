//! Segmentation and seamless tracking.
//!
//! Two receive antennas are beamformed into a range-angle image, its peaks
//! are clustered into candidates and followed by a bank of Kalman tracks.
//! Confirmed tracks mark one of six 20° segments across ±60°.

pub mod occupancy;
pub mod tracker;

use ndarray::{s, Array2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::algo::dbscan::{Dbscan, DbscanConfig};
use crate::apps::spectrum::RxSpectrum;
use crate::containers::{CubeC, MatrixR};
use crate::device::config::{mask_to_indices, DeviceConfig};
use crate::math::stats::StatsHelper;
use crate::prelude::{ensure_shape, Float, FrameProcessor, RadarError, RadarResult};
use crate::radar::dbf::{Dbf, DbfConfig};
use crate::radar::peak_search::{PeakSearch, PeakSearchConfig};
use crate::radar::spectrum_axis::{distance_per_bin, speed_per_bin};
use crate::radar::CLIPPING_VALUE;
use crate::telemetry::LogManager;

pub use occupancy::{segment_of, SegmentOccupancy, HYSTERESIS_FRAMES, NUM_SEGMENTS};
pub use tracker::{Candidate, TrackBank, TrackRow, TrackState, MAX_CANDIDATES, MAX_TRACKS};

pub const MAX_RANGE_M: Float = 5.0;
const ALPHA_MTI: Float = 0.3;
const NUM_BEAMS: usize = 31;
const MAX_DETECTIONS: usize = MAX_CANDIDATES;
const THRESHOLD_SCALE: Float = 6.0;
/// Fraction of the strongest cell below which nothing is detected.
const DYNAMIC_RANGE: Float = 0.01;
/// Angle units per clustering unit, so that `eps` covers 0.5 m or 15°.
const CLUSTER_ANGLE_SCALE_DEG: Float = 30.0;
const CLUSTER_EPS: Float = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// RX1 and RX3 span the horizontal.
    Landscape,
    /// RX2 and RX3 span the horizontal.
    Portrait,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Landscape
    }
}

impl Orientation {
    /// Physical antenna indices forming the horizontal pair.
    pub fn antennas(self) -> [usize; 2] {
        match self {
            Orientation::Landscape => [0, 2],
            Orientation::Portrait => [1, 2],
        }
    }
}

/// Preset acquisitions at 1 GHz bandwidth and 20 frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    Spc64Cpf32,
    Spc128Cpf32,
    Spc64Cpf64,
}

impl SegmentationMode {
    pub fn config(self, orientation: Orientation) -> SegmentationConfig {
        let (samples, chirps) = match self {
            SegmentationMode::Spc64Cpf32 => (64, 32),
            SegmentationMode::Spc128Cpf32 => (128, 32),
            SegmentationMode::Spc64Cpf64 => (64, 64),
        };
        SegmentationConfig {
            num_samples_per_chirp: samples,
            num_chirps_per_frame: chirps,
            orientation,
            ..SegmentationConfig::default()
        }
    }
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub num_samples_per_chirp: usize,
    pub num_chirps_per_frame: usize,
    pub bandwidth_Hz: f64,
    pub center_frequency_Hz: f64,
    pub orientation: Orientation,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            num_samples_per_chirp: 64,
            num_chirps_per_frame: 32,
            bandwidth_Hz: 1e9,
            center_frequency_Hz: 61e9,
            orientation: Orientation::Landscape,
        }
    }
}

impl SegmentationConfig {
    /// Acquisition with all three receivers on, so both orientations work.
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            rx_mask: 0b111,
            start_frequency_Hz: self.center_frequency_Hz - self.bandwidth_Hz / 2.0,
            end_frequency_Hz: self.center_frequency_Hz + self.bandwidth_Hz / 2.0,
            num_samples_per_chirp: self.num_samples_per_chirp,
            num_chirps_per_frame: self.num_chirps_per_frame,
            chirp_repetition_time_s: 300e-6,
            frame_repetition_time_s: 0.05,
            ..DeviceConfig::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentationResult {
    /// `1.0` for an active segment, ordered from -60° upwards.
    pub segments: [Float; NUM_SEGMENTS],
    pub tracks: [TrackRow; MAX_TRACKS],
}

/// Positions of the orientation's antennas on the frame antenna axis.
fn channel_slots(orientation: Orientation, rx_mask: u32) -> RadarResult<Vec<usize>> {
    orientation
        .antennas()
        .iter()
        .map(|&rx| mask_to_indices(rx_mask).position(|enabled| enabled == rx))
        .collect::<Option<Vec<_>>>()
        .ok_or(RadarError::RxAntennaCombinationNotAllowed)
}

pub struct Segmentation {
    config: SegmentationConfig,
    device: DeviceConfig,
    spectrum: RxSpectrum,
    dbf: Dbf,
    /// `range x doppler x beams`
    beams: CubeC,
    /// `range x beams`, strongest Doppler cell per pixel.
    image: MatrixR,
    image_doppler: Array2<usize>,
    peaks: PeakSearch,
    dbscan: Dbscan,
    points: Vec<[Float; 2]>,
    /// `(range_m, angle_deg, power, doppler_bin)` per image peak.
    detections: Vec<(Float, Float, Float, usize)>,
    labels: Vec<usize>,
    candidates: Vec<Candidate>,
    scratch: Vec<Float>,
    tracks: TrackBank,
    occupancy: SegmentOccupancy,
    distance_per_bin_m: Float,
    speed_per_bin_m_s: Float,
    max_bin: usize,
    logger: LogManager,
}

impl Segmentation {
    pub fn new(config: SegmentationConfig) -> RadarResult<Self> {
        Self::with_device(config, &config.device_config())
    }

    /// Fails with `RxAntennaCombinationNotAllowed` when `device` lacks an
    /// antenna the orientation needs.
    pub fn with_device(config: SegmentationConfig, device: &DeviceConfig) -> RadarResult<Self> {
        let slots = channel_slots(config.orientation, device.rx_mask)?;
        let spectrum = RxSpectrum::new(device, slots, ALPHA_MTI)?;
        let (range_bins, doppler_bins, _) = spectrum.filtered().dim();
        let center_frequency_hz = device.center_frequency_Hz() as Float;
        let dbf = Dbf::new(DbfConfig {
            num_beams: NUM_BEAMS,
            num_antennas: 2,
            min_angle_deg: occupancy::MIN_ANGLE_DEG,
            max_angle_deg: occupancy::MAX_ANGLE_DEG,
            d_by_lambda: 0.5,
        })?;
        let distance_per_bin_m = distance_per_bin(
            spectrum.range_fft_size(),
            device.num_samples_per_chirp,
            device.bandwidth_Hz() as Float,
        )?;
        let peaks = PeakSearch::new(PeakSearchConfig {
            value_per_bin: distance_per_bin_m,
            search_zone_start: 0.0,
            search_zone_end: MAX_RANGE_M,
            threshold_factor: THRESHOLD_SCALE,
            threshold_offset: 0.0,
            max_num_peaks: MAX_DETECTIONS,
        })?;
        let dbscan = Dbscan::new(DbscanConfig {
            min_points: 1,
            eps: CLUSTER_EPS,
            max_points: MAX_DETECTIONS,
        })?;
        Ok(Self {
            speed_per_bin_m_s: speed_per_bin(
                spectrum.doppler_fft_size(),
                device.chirp_repetition_time_s,
                center_frequency_hz,
            )?,
            max_bin: ((MAX_RANGE_M / distance_per_bin_m) as usize).min(range_bins - 1),
            distance_per_bin_m,
            beams: CubeC::zeros((range_bins, doppler_bins, NUM_BEAMS)),
            image: MatrixR::zeros((range_bins, NUM_BEAMS)),
            image_doppler: Array2::zeros((range_bins, NUM_BEAMS)),
            scratch: vec![0.0; range_bins * NUM_BEAMS],
            points: Vec::with_capacity(MAX_DETECTIONS),
            detections: Vec::with_capacity(MAX_DETECTIONS),
            labels: Vec::with_capacity(MAX_DETECTIONS),
            candidates: Vec::with_capacity(MAX_DETECTIONS),
            tracks: TrackBank::new(device.frame_repetition_time_s),
            occupancy: SegmentOccupancy::new(),
            spectrum,
            dbf,
            peaks,
            dbscan,
            config,
            device: *device,
            logger: LogManager::new("segmentation"),
        })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn device_config(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn orientation(&self) -> Orientation {
        self.config.orientation
    }

    /// Switches the antenna pair; clutter estimates and tracks start over.
    pub fn set_orientation(&mut self, orientation: Orientation) -> RadarResult<()> {
        if orientation == self.config.orientation {
            return Ok(());
        }
        let slots = channel_slots(orientation, self.device.rx_mask)?;
        self.spectrum = RxSpectrum::new(&self.device, slots, ALPHA_MTI)?;
        self.config.orientation = orientation;
        self.reset();
        self.logger.record(format_args!("orientation set to {:?}", orientation));
        Ok(())
    }

    fn build_image(&mut self) {
        for ((r, b), pixel) in self.image.indexed_iter_mut() {
            let mut best = (0, 0.0);
            for (d, value) in self.beams.slice(s![r, .., b]).iter().enumerate() {
                let magnitude = value.norm();
                if magnitude > best.1 {
                    best = (d, magnitude);
                }
            }
            self.image_doppler[[r, b]] = best.0;
            *pixel = best.1;
        }
    }

    fn threshold(&mut self) -> Float {
        let median = self
            .image
            .as_slice()
            .and_then(|values| StatsHelper::median_with(values, &mut self.scratch))
            .unwrap_or(0.0);
        let strongest = self.image.iter().fold(0.0, |acc: Float, &v| acc.max(v));
        (THRESHOLD_SCALE * median).max(DYNAMIC_RANGE * strongest).max(CLIPPING_VALUE)
    }

    /// Peaks of the image within range, clustered into `self.candidates`.
    fn detect(&mut self) -> RadarResult<()> {
        let threshold = self.threshold();
        let angles = self.dbf.beam_angles_deg();
        let doppler_center = self.beams.len_of(Axis(1)) / 2;

        self.points.clear();
        self.detections.clear();
        for peak in self.peaks.run_2d(self.image.view(), threshold) {
            if peak.row == 0 || peak.row > self.max_bin {
                continue;
            }
            let range_m = peak.row as Float * self.distance_per_bin_m;
            let angle_deg = angles[peak.col];
            self.points.push([range_m, angle_deg / CLUSTER_ANGLE_SCALE_DEG]);
            self.detections.push((range_m, angle_deg, peak.value, self.image_doppler[[peak.row, peak.col]]));
        }

        self.labels.clear();
        self.labels.resize(self.points.len(), 0);
        let clusters = self.dbscan.run(&self.points, &mut self.labels)?;

        self.candidates.clear();
        for cluster in 1..=clusters {
            let mut weight = 0.0;
            let (mut range_m, mut angle_deg) = (0.0, 0.0);
            let mut strongest: Option<(Float, usize)> = None;
            let members = self.detections.iter().zip(&self.labels).filter(|(_, l)| **l == cluster);
            for (&(r, a, power, doppler), _) in members {
                weight += power;
                range_m += power * r;
                angle_deg += power * a;
                if strongest.map_or(true, |(p, _)| power > p) {
                    strongest = Some((power, doppler));
                }
            }
            if let Some((_, doppler)) = strongest {
                self.candidates.push(Candidate {
                    range_m: range_m / weight,
                    angle_deg: angle_deg / weight,
                    speed_m_s: (doppler as Float - doppler_center as Float) * self.speed_per_bin_m_s,
                    power: weight,
                    moving: doppler != doppler_center,
                });
            }
        }
        Ok(())
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.num_tracks()
    }
}

impl FrameProcessor for Segmentation {
    type Output = SegmentationResult;

    fn process(&mut self, frame: ArrayView3<Float>) -> RadarResult<SegmentationResult> {
        let (rx, chirps, samples) = self.device.frame_shape();
        ensure_shape("segmentation frame", &[rx, chirps, samples], frame.shape())?;
        self.spectrum.run(frame)?;
        self.dbf.run(self.spectrum.filtered(), self.beams.view_mut())?;
        self.build_image();
        self.detect()?;

        let tracks = self.tracks.step(&self.candidates)?;
        let mut occupied = [false; NUM_SEGMENTS];
        for track in tracks.iter().filter(|t| t.is_valid()) {
            occupied[segment_of(track.angle_deg)] = true;
        }
        let segments = self.occupancy.step(occupied);
        self.logger.trace_frame(format_args!(
            "{} candidates, {} tracks",
            self.candidates.len(),
            self.tracks.num_tracks()
        ));
        Ok(SegmentationResult { segments, tracks })
    }

    fn reset(&mut self) {
        self.spectrum.reset();
        self.tracks.reset();
        self.occupancy.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::config::SensorType;
    use crate::device::sensor::Sensor;
    use crate::device::synthetic::{Scene, SyntheticSensor, Target};
    use ndarray::Array3;

    fn run(segmentation: &mut Segmentation, scene: Scene, frames: usize) -> Vec<SegmentationResult> {
        let device = *segmentation.device_config();
        let mut sensor = SyntheticSensor::new(SensorType::Bgt60tr13c, scene).unwrap();
        sensor.set_config(&device).unwrap();
        sensor.start_acquisition().unwrap();
        let mut frame = Array3::zeros(device.frame_shape());
        (0..frames)
            .map(|_| {
                sensor.get_next_frame(frame.view_mut(), 100).unwrap();
                segmentation.process(frame.view()).unwrap()
            })
            .collect()
    }

    #[test]
    fn follows_a_walking_target() {
        let mut segmentation = Segmentation::new(SegmentationConfig::default()).unwrap();
        let scene = Scene {
            targets: vec![Target {
                range_m: 2.0,
                speed_m_s: 0.5,
                azimuth_deg: 0.0,
                elevation_deg: 0.0,
                amplitude: 1.0,
            }],
            seed: 11,
            ..Scene::default()
        };
        let results = run(&mut segmentation, scene, 5);
        let last = results[4];
        assert!(last.segments[2] == 1.0 || last.segments[3] == 1.0, "{:?}", last.segments);
        let track = last.tracks[0];
        assert!(track.is_valid());
        assert!((1.8..=2.2).contains(&track.range_m), "{:?}", track);
        assert!((-10.0..=10.0).contains(&track.angle_deg), "{:?}", track);
        assert!((0.3..=0.7).contains(&track.speed_m_s), "{:?}", track);
    }

    #[test]
    fn empty_room_has_no_segments() {
        let mut segmentation = Segmentation::new(SegmentationConfig::default()).unwrap();
        let scene = Scene {
            clutter: vec![Target {
                range_m: 1.2,
                azimuth_deg: -30.0,
                amplitude: 2.0,
                ..Target::default()
            }],
            ..Scene::default()
        };
        for result in run(&mut segmentation, scene, 10) {
            assert_eq!(result.segments, [0.0; NUM_SEGMENTS]);
            assert!(result.tracks.iter().all(|t| !t.is_valid()));
        }
    }

    #[test]
    fn orientation_needs_its_antennas() {
        let config = SegmentationConfig::default();
        let device = DeviceConfig {
            rx_mask: 0b011,
            ..config.device_config()
        };
        assert!(matches!(
            Segmentation::with_device(config, &device),
            Err(RadarError::RxAntennaCombinationNotAllowed)
        ));

        let device = DeviceConfig {
            rx_mask: 0b101,
            ..config.device_config()
        };
        let mut segmentation = Segmentation::with_device(config, &device).unwrap();
        assert!(segmentation.set_orientation(Orientation::Portrait).is_err());
        assert_eq!(segmentation.orientation(), Orientation::Landscape);

        let mut segmentation = Segmentation::new(config).unwrap();
        segmentation.set_orientation(Orientation::Portrait).unwrap();
        assert_eq!(segmentation.orientation(), Orientation::Portrait);
    }

    #[test]
    fn modes_select_frame_size() {
        let config = SegmentationMode::Spc128Cpf32.config(Orientation::Portrait);
        let device = config.device_config();
        assert_eq!(device.frame_shape(), (3, 32, 128));
        assert!((device.bandwidth_Hz() - 1e9).abs() < 1.0);
        let segmentation = Segmentation::new(config).unwrap();
        assert_eq!(segmentation.orientation(), Orientation::Portrait);
        assert_eq!(segmentation.num_tracks(), 0);
    }
}
