use crate::generator::profile::{build_sensor, GeneratorConfig};
use crate::workflow::config::{App, WorkflowConfig};
use anyhow::Context;
use log::{info, warn};
use ndarray::{Array2, Array3, ArrayView3};
use radarcore::algo::ppfft::PpfftConfig;
use radarcore::apps::{
    MotionAngle, MotionAngleResult, PresenceResult, PresenceSensing, Segmentation, SegmentationResult,
};
use radarcore::containers::max;
use radarcore::device::{DeviceConfig, Sensor};
use radarcore::error::{self, ErrorCode};
use radarcore::math::{FftType, WindowConfig, WindowType};
use radarcore::radar::dbf::DbfConfig;
use radarcore::radar::spectrum_axis::{distance_per_bin, speed_per_bin};
use radarcore::radar::{RangeAngleImage, RangeAngleImageConfig, RangeDopplerMap, RangeDopplerMapConfig, ScaleType};
use radarcore::telemetry::{Metrics, MetricsRecorder};
use radarcore::{Float, FrameProcessor, RadarResult};
use serde::Serialize;

const FRAME_TIMEOUT_MS: u32 = 1000;
const RANGE_ANGLE_BEAMS: usize = 31;

/// Per-frame output of the selected app.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameReport {
    Presence(PresenceResult),
    MotionAngle(MotionAngleResult),
    Segmentation(SegmentationResult),
    Rdm {
        range_m: Float,
        speed_m_s: Float,
        magnitude_db: Float,
    },
    RangeAngle {
        range_m: Float,
        angle_deg: Float,
        magnitude: Float,
    },
}

impl FrameReport {
    fn detections(&self) -> usize {
        match self {
            FrameReport::Presence(result) => usize::from(result.target_state),
            FrameReport::MotionAngle(result) => usize::from(result.is_present()),
            FrameReport::Segmentation(result) => result.tracks.iter().filter(|t| t.is_valid()).count(),
            FrameReport::Rdm { .. } | FrameReport::RangeAngle { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub app: App,
    pub sensor: String,
    pub scenario: Option<String>,
    pub device: DeviceConfig,
    pub metrics: Metrics,
    pub temperature_celsius: Option<Float>,
    /// Last failure recorded in the error register during the run.
    pub last_error: Option<String>,
    pub registers: usize,
    pub frames: Vec<FrameReport>,
}

/// Strongest cell of the range-Doppler map of the first enabled antenna.
struct RdmSummary {
    rdm: RangeDopplerMap,
    map: Array2<Float>,
    distance_per_bin_m: Float,
    speed_per_bin_m_s: Float,
}

impl RdmSummary {
    fn new(device: &DeviceConfig) -> RadarResult<Self> {
        let samples = device.num_samples_per_chirp;
        let chirps = device.num_chirps_per_frame;
        let range_fft_size = 2 * samples.next_power_of_two();
        let doppler_fft_size = 2 * chirps.next_power_of_two();
        let rdm = RangeDopplerMap::new(&RangeDopplerMapConfig {
            spect_threshold: radarcore::radar::CLIPPING_VALUE,
            output_scale: ScaleType::Db20,
            range_fft: PpfftConfig::new(
                FftType::R2C,
                range_fft_size,
                WindowConfig::new(WindowType::BlackmanHarris, samples),
            )
            .with_mean_removal(true),
            doppler_fft: PpfftConfig::new(FftType::C2C, doppler_fft_size, WindowConfig::chebyshev(chirps, 100.0)),
        })?;
        Ok(Self {
            map: Array2::zeros(rdm.shape()),
            rdm,
            distance_per_bin_m: distance_per_bin(range_fft_size, samples, device.bandwidth_Hz() as Float)?,
            speed_per_bin_m_s: speed_per_bin(
                doppler_fft_size,
                device.chirp_repetition_time_s,
                device.center_frequency_Hz() as Float,
            )?,
        })
    }

    fn step(&mut self, frame: ArrayView3<Float>) -> RadarResult<FrameReport> {
        self.rdm.run(frame.index_axis(ndarray::Axis(0), 0), self.map.view_mut())?;
        let cols = self.map.ncols();
        let (index, magnitude_db) = max(self.map.view()).unwrap_or((0, 0.0));
        let (row, col) = (index / cols, index % cols);
        Ok(FrameReport::Rdm {
            range_m: row as Float * self.distance_per_bin_m,
            speed_m_s: (col as Float - (cols / 2) as Float) * self.speed_per_bin_m_s,
            magnitude_db,
        })
    }
}

/// Strongest pixel of the best-SNR range-angle image.
struct RangeAngleSummary {
    rai: RangeAngleImage,
    images: Array3<Float>,
    distance_per_bin_m: Float,
}

impl RangeAngleSummary {
    fn new(device: &DeviceConfig) -> RadarResult<Self> {
        let samples = device.num_samples_per_chirp;
        let chirps = device.num_chirps_per_frame;
        let antennas = device.num_rx_antennas();
        let range_fft_size = 2 * samples.next_power_of_two();
        let rai = RangeAngleImage::new(&RangeAngleImageConfig {
            rdm: RangeDopplerMapConfig {
                spect_threshold: radarcore::radar::CLIPPING_VALUE,
                output_scale: ScaleType::Linear,
                range_fft: PpfftConfig::new(
                    FftType::R2C,
                    range_fft_size,
                    WindowConfig::new(WindowType::BlackmanHarris, samples),
                )
                .with_mean_removal(true),
                doppler_fft: PpfftConfig::new(
                    FftType::C2C,
                    2 * chirps.next_power_of_two(),
                    WindowConfig::chebyshev(chirps, 100.0),
                ),
            },
            alpha_mti: 0.3,
            dbf: DbfConfig {
                num_beams: RANGE_ANGLE_BEAMS,
                num_antennas: antennas,
                min_angle_deg: -60.0,
                max_angle_deg: 60.0,
                d_by_lambda: 0.5,
            },
            num_images: 1,
            num_antennas: antennas,
        })?;
        Ok(Self {
            images: Array3::zeros(rai.output_shape()),
            rai,
            distance_per_bin_m: distance_per_bin(range_fft_size, samples, device.bandwidth_Hz() as Float)?,
        })
    }

    fn step(&mut self, frame: ArrayView3<Float>) -> RadarResult<FrameReport> {
        self.rai.run(frame, self.images.view_mut())?;
        let image = self.images.index_axis(ndarray::Axis(0), 0);
        let beams = image.ncols();
        let (index, magnitude) = max(image).unwrap_or((0, 0.0));
        Ok(FrameReport::RangeAngle {
            range_m: (index / beams) as Float * self.distance_per_bin_m,
            angle_deg: self.rai.beam_angles_deg()[index % beams],
            magnitude,
        })
    }
}

enum Pipeline {
    Presence(PresenceSensing),
    MotionAngle(MotionAngle),
    Segmentation(Segmentation),
    Rdm(RdmSummary),
    RangeAngle(RangeAngleSummary),
}

impl Pipeline {
    fn new(config: &WorkflowConfig, device: &DeviceConfig) -> RadarResult<Self> {
        Ok(match config.app {
            App::Presence => Pipeline::Presence(PresenceSensing::new(config.presence, device)?),
            App::MotionAngle => Pipeline::MotionAngle(MotionAngle::with_device(config.motion_angle, device)?),
            App::Segmentation => Pipeline::Segmentation(Segmentation::with_device(config.segmentation, device)?),
            App::Rdm => Pipeline::Rdm(RdmSummary::new(device)?),
            App::RangeAngle => Pipeline::RangeAngle(RangeAngleSummary::new(device)?),
        })
    }

    fn step(&mut self, frame: ArrayView3<Float>) -> RadarResult<FrameReport> {
        match self {
            Pipeline::Presence(app) => app.process(frame).map(FrameReport::Presence),
            Pipeline::MotionAngle(app) => app.process(frame).map(FrameReport::MotionAngle),
            Pipeline::Segmentation(app) => app.process(frame).map(FrameReport::Segmentation),
            Pipeline::Rdm(summary) => summary.step(frame),
            Pipeline::RangeAngle(summary) => summary.step(frame),
        }
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Feeds `config.frames` synthetic frames of `scenario` through the app.
    pub fn execute(&self, scenario: &GeneratorConfig) -> anyhow::Result<Report> {
        let device = self.config.device_config();
        let mut sensor = build_sensor(scenario)?;
        sensor.set_config(&device).context("configuring synthetic sensor")?;
        let mut pipeline = Pipeline::new(&self.config, &device).context("creating processing pipeline")?;

        let metrics = MetricsRecorder::new();
        let mut frame = Array3::<Float>::zeros(device.frame_shape());
        let mut frames = Vec::with_capacity(self.config.frames);
        error::clear();
        sensor.start_acquisition().context("starting acquisition")?;
        for index in 0..self.config.frames {
            sensor
                .get_next_frame(frame.view_mut(), FRAME_TIMEOUT_MS)
                .with_context(|| format!("fetching frame {}", index))?;
            metrics.record_frame();
            match error::capture(pipeline.step(frame.view())) {
                Some(report) => {
                    metrics.record_detections(report.detections());
                    frames.push(report);
                }
                None => {
                    warn!("frame {} failed: {}", index, error::to_string(error::get()));
                    metrics.record_error();
                }
            }
        }
        let temperature_celsius = sensor.get_temperature().ok();
        sensor.stop_acquisition().context("stopping acquisition")?;

        let last_error = match error::get_and_clear() {
            ErrorCode::Ok => None,
            code => Some(error::to_string(code)),
        };
        let metrics = metrics.snapshot();
        info!(
            "{:?}: {} frames, {} detections, {} errors",
            self.config.app, metrics.frames, metrics.detections, metrics.errors
        );
        Ok(Report {
            app: self.config.app,
            sensor: sensor.sensor_type().name().to_string(),
            scenario: scenario.scenario.clone(),
            device,
            metrics,
            temperature_celsius,
            last_error,
            registers: 0,
            frames,
        })
    }
}
