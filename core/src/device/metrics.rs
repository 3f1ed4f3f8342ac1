//! Translation between physical scene requirements and chirp settings.

#![allow(non_snake_case)]

use serde::{Deserialize, Serialize};

use crate::device::config::DeviceConfig;
use crate::prelude::{Float, RadarError, RadarResult, LIGHT_SPEED_M_S};

const C: f64 = LIGHT_SPEED_M_S as f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceMetrics {
    pub range_resolution_m: Float,
    pub max_range_m: Float,
    pub max_speed_m_s: Float,
    pub speed_resolution_m_s: Float,
    /// Zero keeps the center frequency of the configuration being updated.
    pub center_frequency_Hz: f64,
}

impl Default for DeviceMetrics {
    fn default() -> Self {
        Self {
            range_resolution_m: 0.15,
            max_range_m: 4.8,
            max_speed_m_s: 2.45,
            speed_resolution_m_s: 0.08,
            center_frequency_Hz: 0.0,
        }
    }
}

pub fn metrics_from_config(config: &DeviceConfig) -> RadarResult<DeviceMetrics> {
    let bandwidth_Hz = config.bandwidth_Hz();
    if !(bandwidth_Hz > 0.0) {
        return Err(RadarError::ArgumentInvalid("chirp has no bandwidth".into()));
    }
    if !(config.chirp_repetition_time_s > 0.0) || config.num_chirps_per_frame == 0 {
        return Err(RadarError::ArgumentInvalid("chirp repetition is not set".into()));
    }
    let range_resolution_m = C / (2.0 * bandwidth_Hz);
    let center_frequency_Hz = config.center_frequency_Hz();
    let max_speed_m_s = C / (4.0 * center_frequency_Hz * config.chirp_repetition_time_s as f64);
    Ok(DeviceMetrics {
        range_resolution_m: range_resolution_m as Float,
        max_range_m: (config.num_samples_per_chirp as f64 * range_resolution_m / 2.0) as Float,
        max_speed_m_s: max_speed_m_s as Float,
        speed_resolution_m_s: (2.0 * max_speed_m_s / config.num_chirps_per_frame as f64) as Float,
        center_frequency_Hz,
    })
}

/// Rewrites the chirp fields of `config` so that it meets `metrics`.
///
/// Sample rate, antennas and gains are left as they are.
pub fn apply_metrics(metrics: &DeviceMetrics, round_to_power_of_2: bool, config: &mut DeviceConfig) -> RadarResult<()> {
    if !(metrics.range_resolution_m > 0.0) || !(metrics.max_range_m > 0.0) {
        return Err(RadarError::ArgumentOutOfBounds(format!(
            "range resolution {} m, max range {} m",
            metrics.range_resolution_m, metrics.max_range_m
        )));
    }
    if !(metrics.speed_resolution_m_s > 0.0) || metrics.speed_resolution_m_s >= metrics.max_speed_m_s {
        return Err(RadarError::ArgumentInvalid(format!(
            "speed resolution {} m/s with max speed {} m/s",
            metrics.speed_resolution_m_s, metrics.max_speed_m_s
        )));
    }
    let mut num_samples = (2.0 * metrics.max_range_m / metrics.range_resolution_m).ceil() as usize;
    let mut num_chirps = (2.0 * metrics.max_speed_m_s / metrics.speed_resolution_m_s).ceil() as usize;
    if round_to_power_of_2 {
        num_samples = num_samples.next_power_of_two();
        num_chirps = num_chirps.next_power_of_two();
    }
    let center_frequency_Hz = if metrics.center_frequency_Hz > 0.0 {
        metrics.center_frequency_Hz
    } else {
        config.center_frequency_Hz()
    };
    let bandwidth_Hz = C / (2.0 * metrics.range_resolution_m as f64);

    config.num_samples_per_chirp = num_samples;
    config.num_chirps_per_frame = num_chirps;
    config.chirp_repetition_time_s = (C / (4.0 * center_frequency_Hz * metrics.max_speed_m_s as f64)) as Float;
    config.start_frequency_Hz = center_frequency_Hz - bandwidth_Hz / 2.0;
    config.end_frequency_Hz = center_frequency_Hz + bandwidth_Hz / 2.0;
    Ok(())
}

/// Configuration meeting `metrics`, built on top of the default settings.
pub fn config_from_metrics(metrics: &DeviceMetrics, round_to_power_of_2: bool) -> RadarResult<DeviceConfig> {
    let mut config = DeviceConfig::default();
    apply_metrics(metrics, round_to_power_of_2, &mut config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance * b.abs().max(1.0)
    }

    #[test]
    fn default_config_metrics() {
        let metrics = metrics_from_config(&DeviceConfig::default()).unwrap();
        assert!(close(metrics.range_resolution_m as f64, C / 3.0e9, 1e-5));
        assert!(close(metrics.max_range_m as f64, 32.0 * C / 3.0e9, 1e-5));
        let max_speed = C / (4.0 * 60.75e9 * 300e-6);
        assert!(close(metrics.max_speed_m_s as f64, max_speed, 1e-5));
        assert!(close(metrics.speed_resolution_m_s as f64, max_speed / 16.0, 1e-5));
        assert_eq!(metrics.center_frequency_Hz, 60.75e9);
    }

    #[test]
    fn metrics_round_trip_through_config() {
        let metrics = DeviceMetrics {
            range_resolution_m: 0.1,
            max_range_m: 3.0,
            max_speed_m_s: 2.0,
            speed_resolution_m_s: 0.2,
            center_frequency_Hz: 60.5e9,
        };
        let exact = config_from_metrics(&metrics, false).unwrap();
        assert_eq!((exact.num_samples_per_chirp, exact.num_chirps_per_frame), (60, 20));
        let rounded = config_from_metrics(&metrics, true).unwrap();
        assert_eq!((rounded.num_samples_per_chirp, rounded.num_chirps_per_frame), (64, 32));

        let back = metrics_from_config(&exact).unwrap();
        assert!(close(back.range_resolution_m as f64, 0.1, 1e-4));
        assert!(close(back.max_range_m as f64, 3.0, 1e-4));
        assert!(close(back.max_speed_m_s as f64, 2.0, 1e-4));
        assert!(close(back.speed_resolution_m_s as f64, 0.2, 1e-4));
        assert!(close(back.center_frequency_Hz, 60.5e9, 1e-9));
    }

    #[test]
    fn zero_center_keeps_current_band() {
        let mut config = DeviceConfig::default();
        apply_metrics(&DeviceMetrics::default(), true, &mut config).unwrap();
        assert!(close(config.center_frequency_Hz(), 60.75e9, 1e-9));
    }

    #[test]
    fn rejects_impossible_speed_resolution() {
        let metrics = DeviceMetrics {
            speed_resolution_m_s: 3.0,
            ..DeviceMetrics::default()
        };
        assert!(config_from_metrics(&metrics, false).is_err());
        let flat = DeviceConfig {
            end_frequency_Hz: 60.0e9,
            ..DeviceConfig::default()
        };
        assert!(metrics_from_config(&flat).is_err());
    }
}
