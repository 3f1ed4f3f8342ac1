use ndarray::ArrayViewMut3;

use crate::device::config::{DeviceConfig, SensorInfo, SensorType};
use crate::prelude::{Float, RadarResult};

/// Frame source feeding the processing pipeline.
///
/// Frames are written as `rx x chirps x samples` cubes in acquisition order.
/// `get_next_frame` is the only call that may block, for at most
/// `timeout_ms`.
pub trait Sensor {
    fn sensor_type(&self) -> SensorType;

    fn sensor_information(&self) -> &SensorInfo;

    fn set_config(&mut self, config: &DeviceConfig) -> RadarResult<()>;

    fn get_config(&self) -> RadarResult<DeviceConfig>;

    fn start_acquisition(&mut self) -> RadarResult<()>;

    fn stop_acquisition(&mut self) -> RadarResult<()>;

    fn get_next_frame(&mut self, frame: ArrayViewMut3<Float>, timeout_ms: u32) -> RadarResult<()>;

    /// Chip temperature in degrees Celsius.
    fn get_temperature(&mut self) -> RadarResult<Float>;
}
