//! Signal-processing core for 60 GHz FMCW radar sensors.
//!
//! Raw frames come from a [`device::Sensor`] as `rx x chirps x samples`
//! cubes. The [`algo`] and [`radar`] blocks turn them into spectra, maps and
//! detections, and the [`apps`] interpret scenes: presence, closest moving
//! target and segment occupancy with tracking.

pub mod algo;
pub mod apps;
pub mod containers;
pub mod device;
pub mod error;
pub mod math;
pub mod prelude;
pub mod radar;
pub mod telemetry;

pub use prelude::{Complex, Float, FrameProcessor, RadarError, RadarResult};
