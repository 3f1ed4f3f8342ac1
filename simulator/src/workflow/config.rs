use anyhow::Context;
use clap::ValueEnum;
use radarcore::apps::presence::presence_device_config;
use radarcore::apps::{MotionAngleConfig, PresenceConfig, SegmentationConfig};
use radarcore::device::{DeviceConfig, JsonConfiguration};
use radarcore::RadarError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::generator::profile::GeneratorConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum App {
    Presence,
    MotionAngle,
    Segmentation,
    Rdm,
    RangeAngle,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub app: App,
    pub frames: usize,
    pub scenario: GeneratorConfig,
    /// Overrides the acquisition the app would pick for itself.
    pub device: Option<DeviceConfig>,
    pub presence: PresenceConfig,
    pub motion_angle: MotionAngleConfig,
    pub segmentation: SegmentationConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            app: App::Presence,
            frames: 20,
            scenario: GeneratorConfig::default(),
            device: None,
            presence: PresenceConfig::default(),
            motion_angle: MotionAngleConfig::default(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(app: App, frames: usize, seed: u64) -> Self {
        Self {
            app,
            frames,
            scenario: GeneratorConfig {
                seed,
                ..GeneratorConfig::default()
            },
            ..Self::default()
        }
    }

    /// Takes over every section present in a device JSON file.
    pub fn apply_json(&mut self, json: &JsonConfiguration) -> anyhow::Result<()> {
        match json.device_config() {
            Ok(device) => self.device = Some(device),
            Err(RadarError::NotConfigured) => {}
            Err(err) => return Err(err).context("deriving device config from json"),
        }
        if let Some(presence) = json.presence {
            self.presence = presence;
        }
        if let Some(orientation) = json.segmentation {
            self.segmentation.orientation = orientation;
        }
        Ok(())
    }

    /// Acquisition used for the run.
    pub fn device_config(&self) -> DeviceConfig {
        if let Some(device) = self.device {
            return device;
        }
        match self.app {
            App::Presence => presence_device_config(),
            App::MotionAngle => self.motion_angle.mode.device_config(),
            App::Segmentation => self.segmentation.device_config(),
            App::Rdm => DeviceConfig::default(),
            // horizontal pair only, so the beamformer sees a uniform array
            App::RangeAngle => DeviceConfig {
                rx_mask: 0b101,
                ..self.segmentation.device_config()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarcore::apps::{MotionAngleMode, Orientation};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_picks_app_device() {
        let cfg = WorkflowConfig::from_args(App::MotionAngle, 8, 3);
        assert_eq!(cfg.scenario.seed, 3);
        assert_eq!(cfg.device_config(), MotionAngleMode::Spc128Cpf8.device_config());
        let cfg = WorkflowConfig::from_args(App::RangeAngle, 8, 3);
        assert_eq!(cfg.device_config().num_rx_antennas(), 2);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"app: segmentation\nframes: 12\nscenario:\n  seed: 7\n  targets:\n    - range_m: 2.0\n      speed_m_s: 0.5\nsegmentation:\n  orientation: portrait\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.app, App::Segmentation);
        assert_eq!(cfg.frames, 12);
        assert_eq!(cfg.scenario.targets.len(), 1);
        assert_eq!(cfg.scenario.targets[0].amplitude, 1.0);
        assert_eq!(cfg.segmentation.orientation, Orientation::Portrait);
        assert_eq!(cfg.segmentation.num_samples_per_chirp, 64);
    }

    #[test]
    fn json_sections_override_the_workflow() {
        let json = JsonConfiguration::parse(
            r#"{
                "device_config": { "fmcw_single_shape": {
                    "rx_antennas": [1],
                    "tx_antennas": [1],
                    "tx_power_level": 31,
                    "if_gain_dB": 33,
                    "lower_frequency_Hz": 60000000000,
                    "upper_frequency_Hz": 61000000000,
                    "num_chirps_per_frame": 16,
                    "num_samples_per_chirp": 64,
                    "chirp_repetition_time_s": 0.0003,
                    "frame_repetition_time_s": 0.1,
                    "sample_rate_Hz": 1000000
                } },
                "segmentation": { "orientation": "portrait" }
            }"#,
        )
        .unwrap();
        let mut cfg = WorkflowConfig::default();
        cfg.apply_json(&json).unwrap();
        assert_eq!(cfg.device_config().num_chirps_per_frame, 16);
        assert_eq!(cfg.segmentation.orientation, Orientation::Portrait);

        let mut untouched = WorkflowConfig::default();
        untouched.apply_json(&JsonConfiguration::parse("{}").unwrap()).unwrap();
        assert!(untouched.device.is_none());
    }
}
