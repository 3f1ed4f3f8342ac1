//! Sensor boundary: acquisition settings, the sensor trait, a synthetic
//! implementation and the configuration file formats.

pub mod config;
pub mod json;
pub mod metrics;
pub mod registers;
pub mod sensor;
pub mod synthetic;

pub use config::{DeviceConfig, MimoMode, SensorInfo, SensorType};
pub use json::JsonConfiguration;
pub use metrics::{apply_metrics, config_from_metrics, metrics_from_config, DeviceMetrics};
pub use registers::{load_registers, save_registers, Register};
pub use sensor::Sensor;
pub use synthetic::{Scene, SyntheticSensor, Target};
