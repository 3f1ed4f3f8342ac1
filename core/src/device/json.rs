//! JSON application configuration.
//!
//! Recognised sections are `device_config.fmcw_single_shape`,
//! `device_config.fmcw_scene`, `presence_sensing` and `segmentation`. Every
//! numeric key is range checked; missing mandatory keys map to
//! `InvalidJsonKey`, wrong types or bounds to `InvalidJsonValue`.

use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::apps::presence::PresenceConfig;
use crate::apps::segmentation::Orientation;
use crate::device::config::{indices_to_mask, mask_to_indices, DeviceConfig, MimoMode};
use crate::device::metrics::{apply_metrics, DeviceMetrics};
use crate::prelude::{Float, RadarError, RadarResult};

const MAX_RF_FREQUENCY_HZ: f64 = 80e9;
const MAX_ANTENNA: u64 = 32;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonConfiguration {
    pub device: Option<DeviceConfig>,
    pub scene: Option<DeviceMetrics>,
    pub presence: Option<PresenceConfig>,
    pub segmentation: Option<Orientation>,
}

struct Section<'a> {
    path: String,
    object: &'a Map<String, Value>,
}

impl<'a> Section<'a> {
    fn open(root: &'a Value, path: &[&str]) -> RadarResult<Option<Self>> {
        let mut current = root;
        for key in path {
            match current.get(*key) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        let name = path.join(".");
        match current.as_object() {
            Some(object) => Ok(Some(Self { path: name, object })),
            None => Err(RadarError::InvalidJsonValue(format!("{} must be an object", name))),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}.{}", self.path, key)
    }

    fn get(&self, key: &str) -> RadarResult<&'a Value> {
        self.object
            .get(key)
            .ok_or_else(|| RadarError::InvalidJsonKey(self.key(key)))
    }

    fn number(&self, key: &str, default: Option<f64>) -> RadarResult<f64> {
        match (self.object.get(key), default) {
            (None, Some(value)) => Ok(value),
            (None, None) => Err(RadarError::InvalidJsonKey(self.key(key))),
            (Some(value), _) => value
                .as_f64()
                .ok_or_else(|| RadarError::InvalidJsonValue(format!("{} must be a number", self.key(key)))),
        }
    }

    fn number_bounds(&self, key: &str, min: f64, max: f64, default: Option<f64>) -> RadarResult<f64> {
        let value = self.number(key, default)?;
        if value < min || value > max {
            return Err(RadarError::InvalidJsonValue(format!(
                "{} must be between {} and {}",
                self.key(key),
                min,
                max
            )));
        }
        Ok(value)
    }

    fn positive(&self, key: &str, default: Option<f64>) -> RadarResult<f64> {
        let value = self.number(key, default)?;
        if value < 0.0 || (default.is_none() && value == 0.0) {
            return Err(RadarError::InvalidJsonValue(format!("{} must be positive", self.key(key))));
        }
        Ok(value)
    }

    fn unsigned(&self, key: &str, min: u64, max: u64, default: Option<u64>) -> RadarResult<u64> {
        let value = match (self.object.get(key), default) {
            (None, Some(value)) => value,
            (None, None) => return Err(RadarError::InvalidJsonKey(self.key(key))),
            (Some(value), _) => value
                .as_u64()
                .ok_or_else(|| RadarError::InvalidJsonValue(format!("{} must be an unsigned integer", self.key(key))))?,
        };
        if value < min || value > max {
            return Err(RadarError::InvalidJsonValue(format!(
                "{} must be between {} and {}",
                self.key(key),
                min,
                max
            )));
        }
        Ok(value)
    }

    fn string(&self, key: &str, default: &'a str) -> RadarResult<&'a str> {
        match self.object.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_str()
                .ok_or_else(|| RadarError::InvalidJsonValue(format!("{} must be a string", self.key(key)))),
        }
    }

    /// One-based antenna numbers to a bit mask.
    fn antenna_mask(&self, key: &str) -> RadarResult<u32> {
        let list = self
            .get(key)?
            .as_array()
            .ok_or_else(|| RadarError::InvalidJsonValue(format!("{} must be an array", self.key(key))))?;
        if list.is_empty() {
            return Err(RadarError::InvalidJsonValue(format!("{} must not be empty", self.key(key))));
        }
        let mut indices = Vec::with_capacity(list.len());
        for entry in list {
            match entry.as_u64() {
                Some(number) if (1..=MAX_ANTENNA).contains(&number) => indices.push(number as usize - 1),
                _ => {
                    return Err(RadarError::InvalidJsonValue(format!(
                        "{} entries must be between 1 and {}",
                        self.key(key),
                        MAX_ANTENNA
                    )))
                }
            }
        }
        indices_to_mask(&indices)
    }
}

fn parse_single_shape(section: &Section) -> RadarResult<DeviceConfig> {
    let (start_key, end_key) = if section.object.contains_key("start_frequency_Hz") {
        ("start_frequency_Hz", "end_frequency_Hz")
    } else {
        ("lower_frequency_Hz", "upper_frequency_Hz")
    };
    let mimo_mode = match section.string("mimo_mode", "off")? {
        "off" => MimoMode::Off,
        "tdm" => MimoMode::Tdm,
        _ => {
            return Err(RadarError::InvalidJsonValue(format!(
                "{} must be \"off\" or \"tdm\"",
                section.key("mimo_mode")
            )))
        }
    };
    Ok(DeviceConfig {
        sample_rate_Hz: section.number_bounds("sample_rate_Hz", 80e3, 4e6, Some(1e6))? as u32,
        rx_mask: section.antenna_mask("rx_antennas")?,
        tx_mask: section.antenna_mask("tx_antennas")?,
        tx_power_level: section.unsigned("tx_power_level", 0, 31, None)? as u32,
        if_gain_dB: section.unsigned("if_gain_dB", 18, 60, None)? as u32,
        start_frequency_Hz: section.number_bounds(start_key, 0.0, MAX_RF_FREQUENCY_HZ, None)?,
        end_frequency_Hz: section.number_bounds(end_key, 0.0, MAX_RF_FREQUENCY_HZ, None)?,
        num_samples_per_chirp: section.unsigned("num_samples_per_chirp", 1, u32::MAX as u64, None)? as usize,
        num_chirps_per_frame: section.unsigned("num_chirps_per_frame", 1, u32::MAX as u64, None)? as usize,
        chirp_repetition_time_s: section.positive("chirp_repetition_time_s", None)? as Float,
        frame_repetition_time_s: section.positive("frame_repetition_time_s", None)? as Float,
        hp_cutoff_Hz: section.unsigned("hp_cutoff_Hz", 0, u32::MAX as u64, Some(80_000))? as u32,
        aaf_cutoff_Hz: section.unsigned("aaf_cutoff_Hz", 0, u32::MAX as u64, Some(500_000))? as u32,
        mimo_mode,
    })
}

fn parse_scene(section: &Section) -> RadarResult<DeviceMetrics> {
    Ok(DeviceMetrics {
        range_resolution_m: section.positive("range_resolution_m", None)? as Float,
        max_range_m: section.positive("max_range_m", None)? as Float,
        max_speed_m_s: section.positive("max_speed_m_s", None)? as Float,
        speed_resolution_m_s: section.positive("speed_resolution_m_s", None)? as Float,
        center_frequency_Hz: section.positive("center_frequency_Hz", Some(0.0))?,
    })
}

fn parse_presence(section: &Section) -> RadarResult<PresenceConfig> {
    let config = PresenceConfig {
        min_range_m: section.positive("min_detection_range_m", None)? as Float,
        max_range_m: section.positive("max_detection_range_m", None)? as Float,
        sensitivity: section.number_bounds("sensitivity_threshold", 0.0, 1.0, None)? as Float,
    };
    if config.min_range_m >= config.max_range_m {
        return Err(RadarError::InvalidJsonValue(format!(
            "{} must be below max_detection_range_m",
            section.key("min_detection_range_m")
        )));
    }
    Ok(config)
}

fn parse_orientation(section: &Section) -> RadarResult<Orientation> {
    match section.string("orientation", "landscape")? {
        "landscape" => Ok(Orientation::Landscape),
        "portrait" => Ok(Orientation::Portrait),
        _ => Err(RadarError::InvalidJsonValue(format!(
            "{} must be \"landscape\" or \"portrait\"",
            section.key("orientation")
        ))),
    }
}

impl JsonConfiguration {
    pub fn parse(text: &str) -> RadarResult<Self> {
        let root: Value = serde_json::from_str(text).map_err(|err| RadarError::InvalidJson(err.to_string()))?;
        if !root.is_object() {
            return Err(RadarError::InvalidJson("top level must be an object".into()));
        }
        let device = Section::open(&root, &["device_config", "fmcw_single_shape"])?;
        let scene = Section::open(&root, &["device_config", "fmcw_scene"])?;
        let presence = Section::open(&root, &["presence_sensing"])?;
        let segmentation = Section::open(&root, &["segmentation"])?;
        Ok(Self {
            device: device.as_ref().map(parse_single_shape).transpose()?,
            scene: scene.as_ref().map(parse_scene).transpose()?,
            presence: presence.as_ref().map(parse_presence).transpose()?,
            segmentation: segmentation.as_ref().map(parse_orientation).transpose()?,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> RadarResult<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).map_err(|err| RadarError::OpeningFile(format!("{}: {}", path.display(), err)))?;
        Self::parse(&text)
    }

    /// Device settings: the single shape if present, otherwise the scene
    /// metrics applied to the defaults.
    pub fn device_config(&self) -> RadarResult<DeviceConfig> {
        match (self.device, self.scene) {
            (Some(device), _) => Ok(device),
            (None, Some(scene)) => {
                let mut config = DeviceConfig::default();
                apply_metrics(&scene, true, &mut config)?;
                Ok(config)
            }
            (None, None) => Err(RadarError::NotConfigured),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        let mut device_config = Map::new();
        if let Some(device) = &self.device {
            let antennas = |mask: u32| mask_to_indices(mask).map(|i| i + 1).collect::<Vec<_>>();
            device_config.insert(
                "fmcw_single_shape".into(),
                json!({
                    "sample_rate_Hz": device.sample_rate_Hz,
                    "rx_antennas": antennas(device.rx_mask),
                    "tx_antennas": antennas(device.tx_mask),
                    "tx_power_level": device.tx_power_level,
                    "if_gain_dB": device.if_gain_dB,
                    "start_frequency_Hz": device.start_frequency_Hz,
                    "end_frequency_Hz": device.end_frequency_Hz,
                    "num_chirps_per_frame": device.num_chirps_per_frame,
                    "num_samples_per_chirp": device.num_samples_per_chirp,
                    "chirp_repetition_time_s": device.chirp_repetition_time_s,
                    "frame_repetition_time_s": device.frame_repetition_time_s,
                    "hp_cutoff_Hz": device.hp_cutoff_Hz,
                    "aaf_cutoff_Hz": device.aaf_cutoff_Hz,
                    "mimo_mode": device.mimo_mode,
                }),
            );
        }
        if let Some(scene) = &self.scene {
            device_config.insert("fmcw_scene".into(), json!(scene));
        }
        if !device_config.is_empty() {
            root.insert("device_config".into(), Value::Object(device_config));
        }
        if let Some(presence) = &self.presence {
            root.insert(
                "presence_sensing".into(),
                json!({
                    "min_detection_range_m": presence.min_range_m,
                    "max_detection_range_m": presence.max_range_m,
                    "sensitivity_threshold": presence.sensitivity,
                }),
            );
        }
        if let Some(orientation) = &self.segmentation {
            root.insert("segmentation".into(), json!({ "orientation": orientation }));
        }
        Value::Object(root)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> RadarResult<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(&self.to_value()).map_err(|err| RadarError::Internal(err.to_string()))?;
        fs::write(path, text).map_err(|err| RadarError::OpeningFile(format!("{}: {}", path.display(), err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SINGLE_SHAPE: &str = r#"{
        "device_config": {
            "fmcw_single_shape": {
                "rx_antennas": [1, 3],
                "tx_antennas": [1],
                "tx_power_level": 31,
                "if_gain_dB": 33,
                "lower_frequency_Hz": 60e9,
                "upper_frequency_Hz": 61.5e9,
                "num_chirps_per_frame": 32,
                "num_samples_per_chirp": 64,
                "chirp_repetition_time_s": 0.0003,
                "frame_repetition_time_s": 0.1,
                "mimo_mode": "off"
            }
        },
        "segmentation": { "orientation": "portrait" }
    }"#;

    #[test]
    fn single_shape_with_defaults_and_legacy_keys() {
        let parsed = JsonConfiguration::parse(SINGLE_SHAPE).unwrap();
        let device = parsed.device.unwrap();
        assert_eq!(device.rx_mask, 0b101);
        assert_eq!(device.sample_rate_Hz, 1_000_000);
        assert_eq!((device.hp_cutoff_Hz, device.aaf_cutoff_Hz), (80_000, 500_000));
        assert_eq!(device.start_frequency_Hz, 60e9);
        assert_eq!(parsed.segmentation, Some(Orientation::Portrait));
        assert!(parsed.presence.is_none());
        assert_eq!(parsed.device_config().unwrap(), device);
    }

    #[test]
    fn bounds_and_missing_keys() {
        let out_of_range = SINGLE_SHAPE.replace("\"if_gain_dB\": 33", "\"if_gain_dB\": 70");
        assert!(matches!(JsonConfiguration::parse(&out_of_range), Err(RadarError::InvalidJsonValue(_))));
        let missing = SINGLE_SHAPE.replace("\"tx_power_level\": 31,", "");
        assert_eq!(
            JsonConfiguration::parse(&missing),
            Err(RadarError::InvalidJsonKey("device_config.fmcw_single_shape.tx_power_level".into()))
        );
        let mimo = SINGLE_SHAPE.replace("\"off\"", "\"fdm\"");
        assert!(matches!(JsonConfiguration::parse(&mimo), Err(RadarError::InvalidJsonValue(_))));
        let antenna = SINGLE_SHAPE.replace("[1, 3]", "[0]");
        assert!(matches!(JsonConfiguration::parse(&antenna), Err(RadarError::InvalidJsonValue(_))));
        assert!(matches!(JsonConfiguration::parse("{ nope"), Err(RadarError::InvalidJson(_))));
    }

    #[test]
    fn scene_and_presence_sections() {
        let text = r#"{
            "device_config": { "fmcw_scene": {
                "range_resolution_m": 0.15, "max_range_m": 4.8,
                "max_speed_m_s": 2.45, "speed_resolution_m_s": 0.2
            } },
            "presence_sensing": {
                "min_detection_range_m": 0.5, "max_detection_range_m": 3.0,
                "sensitivity_threshold": 0.5
            }
        }"#;
        let parsed = JsonConfiguration::parse(text).unwrap();
        assert_eq!(parsed.scene.unwrap().center_frequency_Hz, 0.0);
        let presence = parsed.presence.unwrap();
        assert_eq!((presence.min_range_m, presence.max_range_m, presence.sensitivity), (0.5, 3.0, 0.5));
        let device = parsed.device_config().unwrap();
        assert!(device.num_samples_per_chirp.is_power_of_two());
        assert!(device.num_chirps_per_frame.is_power_of_two());

        let inverted = text.replace("0.5, \"max_detection_range_m\": 3.0", "3.5, \"max_detection_range_m\": 3.0");
        assert!(JsonConfiguration::parse(&inverted).is_err());
        assert_eq!(JsonConfiguration::default().device_config(), Err(RadarError::NotConfigured));
    }

    #[test]
    fn save_and_load_round_trip() {
        let original = JsonConfiguration {
            device: Some(DeviceConfig::default()),
            scene: None,
            presence: Some(PresenceConfig {
                min_range_m: 0.5,
                max_range_m: 3.0,
                sensitivity: 0.5,
            }),
            segmentation: Some(Orientation::Landscape),
        };
        let file = NamedTempFile::new().unwrap();
        original.save(file.path()).unwrap();
        assert_eq!(JsonConfiguration::load(file.path()).unwrap(), original);

        let mut broken = NamedTempFile::new().unwrap();
        broken.write_all(b"[1, 2]").unwrap();
        assert!(matches!(JsonConfiguration::load(broken.path()), Err(RadarError::InvalidJson(_))));
    }
}
