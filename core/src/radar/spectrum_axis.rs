//! Bin-to-SI-unit conversions for range and Doppler spectra.

use crate::math::fft::{AxisSpec, FftType};
use crate::prelude::{Float, RadarError, RadarResult, LIGHT_SPEED_M_S};

fn require_positive(what: &str, value: Float) -> RadarResult<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(RadarError::ArgumentOutOfBounds(format!("{} must be positive, got {}", what, value)))
    }
}

fn require_size(fft_size: usize) -> RadarResult<()> {
    if fft_size < 2 {
        return Err(RadarError::ArgumentOutOfBounds(format!("fft size {}", fft_size)));
    }
    Ok(())
}

/// Range covered by one range bin, in meters.
///
/// Zero-padding the `num_samples_per_chirp` samples to `fft_size` shrinks the
/// bin accordingly.
pub fn distance_per_bin(fft_size: usize, num_samples_per_chirp: usize, bandwidth_hz: Float) -> RadarResult<Float> {
    require_size(fft_size)?;
    require_positive("bandwidth", bandwidth_hz)?;
    if num_samples_per_chirp == 0 {
        return Err(RadarError::ArgumentOutOfBounds("no samples per chirp".into()));
    }
    Ok(LIGHT_SPEED_M_S * num_samples_per_chirp as Float / (2.0 * bandwidth_hz * fft_size as Float))
}

/// Radial speed covered by one Doppler bin, in m/s.
pub fn speed_per_bin(fft_size: usize, chirp_repetition_time_s: Float, center_frequency_hz: Float) -> RadarResult<Float> {
    require_size(fft_size)?;
    require_positive("chirp repetition time", chirp_repetition_time_s)?;
    require_positive("center frequency", center_frequency_hz)?;
    let wavelength_m = LIGHT_SPEED_M_S / center_frequency_hz;
    Ok(wavelength_m / (2.0 * chirp_repetition_time_s * fft_size as Float))
}

/// Beat frequency covered by one range bin, in Hz.
pub fn beat_freq_per_bin(
    fft_size: usize,
    num_samples_per_chirp: usize,
    bandwidth_hz: Float,
    chirp_time_s: Float,
) -> RadarResult<Float> {
    require_positive("chirp time", chirp_time_s)?;
    let slope_hz_per_s = bandwidth_hz / chirp_time_s;
    Ok(slope_hz_per_s * 2.0 / LIGHT_SPEED_M_S * distance_per_bin(fft_size, num_samples_per_chirp, bandwidth_hz)?)
}

fn positive_axis(fft_type: FftType, fft_size: usize, step: Float) -> AxisSpec {
    let last_bin = match fft_type {
        FftType::R2C => fft_size / 2 - 1,
        FftType::C2C => fft_size - 1,
    };
    AxisSpec {
        min_value: 0.0,
        max_value: step * last_bin as Float,
        value_bin_per_step: step,
    }
}

fn centered_axis(fft_type: FftType, fft_size: usize, step: Float) -> AxisSpec {
    let half = (fft_size / 2) as Float;
    AxisSpec {
        min_value: match fft_type {
            FftType::R2C => 0.0,
            FftType::C2C => -step * half,
        },
        max_value: step * (half - 1.0),
        value_bin_per_step: step,
    }
}

pub fn range_axis(
    fft_type: FftType,
    fft_size: usize,
    num_samples_per_chirp: usize,
    bandwidth_hz: Float,
) -> RadarResult<AxisSpec> {
    let step = distance_per_bin(fft_size, num_samples_per_chirp, bandwidth_hz)?;
    Ok(positive_axis(fft_type, fft_size, step))
}

/// Speed axis of an FFT-shifted Doppler spectrum.
pub fn speed_axis(
    fft_type: FftType,
    fft_size: usize,
    chirp_repetition_time_s: Float,
    center_frequency_hz: Float,
) -> RadarResult<AxisSpec> {
    let step = speed_per_bin(fft_size, chirp_repetition_time_s, center_frequency_hz)?;
    Ok(centered_axis(fft_type, fft_size, step))
}

pub fn beat_freq_axis(
    fft_type: FftType,
    fft_size: usize,
    num_samples_per_chirp: usize,
    bandwidth_hz: Float,
    chirp_time_s: Float,
) -> RadarResult<AxisSpec> {
    let step = beat_freq_per_bin(fft_size, num_samples_per_chirp, bandwidth_hz, chirp_time_s)?;
    Ok(positive_axis(fft_type, fft_size, step))
}

pub fn sampling_freq_axis(fft_type: FftType, fft_size: usize, sampling_frequency_hz: Float) -> RadarResult<AxisSpec> {
    require_size(fft_size)?;
    require_positive("sampling frequency", sampling_frequency_hz)?;
    Ok(centered_axis(fft_type, fft_size, sampling_frequency_hz / fft_size as Float))
}
