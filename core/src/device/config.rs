//! Acquisition configuration and the static description of a sensor.
//!
//! Field names keep their SI unit as a suffix (`_Hz`, `_s`, `_dB`).

#![allow(non_snake_case)]

use serde::{Deserialize, Serialize};

use crate::prelude::{Float, RadarError, RadarResult};

/// Transmit multiplexing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimoMode {
    Off,
    Tdm,
}

impl Default for MimoMode {
    fn default() -> Self {
        MimoMode::Off
    }
}

/// Supported radar chips. The discriminant is the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorType {
    Bgt60tr13c = 0,
    Bgt60atr24c = 1,
    Bgt60utr13d = 2,
    Bgt60utr11aip = 4,
    Unknown = 0xff,
}

impl SensorType {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => SensorType::Bgt60tr13c,
            1 => SensorType::Bgt60atr24c,
            2 => SensorType::Bgt60utr13d,
            4 => SensorType::Bgt60utr11aip,
            _ => SensorType::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SensorType::Bgt60tr13c => "BGT60TR13C",
            SensorType::Bgt60atr24c => "BGT60ATR24C",
            SensorType::Bgt60utr13d => "BGT60UTR13D",
            SensorType::Bgt60utr11aip => "BGT60UTR11AIP",
            SensorType::Unknown => "unknown",
        }
    }

    /// Temperature cannot be read while sawtooth chirps are running.
    pub fn supports_temperature(self) -> bool {
        !matches!(self, SensorType::Bgt60utr11aip | SensorType::Unknown)
    }

    /// Nominal limits of the chip.
    pub fn info(self) -> SensorInfo {
        let (min_rf, max_rf, tx, rx) = match self {
            SensorType::Bgt60tr13c => (58.0e9, 63.5e9, 1, 3),
            SensorType::Bgt60atr24c => (58.0e9, 63.5e9, 2, 4),
            SensorType::Bgt60utr13d => (57.0e9, 64.0e9, 1, 3),
            SensorType::Bgt60utr11aip => (57.0e9, 64.0e9, 1, 1),
            SensorType::Unknown => (58.0e9, 63.5e9, 1, 1),
        };
        let mut if_gain_list = Vec::new();
        for hp_gain in [18i8, 30] {
            for vga_gain in (0..=30).step_by(5) {
                if_gain_list.push(hp_gain + vga_gain);
            }
        }
        if_gain_list.sort_unstable();
        if_gain_list.dedup();
        SensorInfo {
            description: self.name().to_string(),
            min_rf_frequency_Hz: min_rf,
            max_rf_frequency_Hz: max_rf,
            num_tx_antennas: tx,
            num_rx_antennas: rx,
            max_tx_power: 31,
            device_id: 0,
            max_num_samples_per_chirp: 4095,
            min_adc_sampling_rate: 80e3,
            max_adc_sampling_rate: 4e6,
            adc_resolution_bits: 12,
            hp_cutoff_list: vec![20_000, 45_000, 70_000, 80_000, 160_000],
            lp_cutoff_list: vec![500_000, 1_000_000],
            if_gain_list,
        }
    }
}

/// Static capabilities reported by a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub description: String,
    pub min_rf_frequency_Hz: f64,
    pub max_rf_frequency_Hz: f64,
    pub num_tx_antennas: u8,
    pub num_rx_antennas: u8,
    pub max_tx_power: u32,
    pub device_id: u64,
    pub max_num_samples_per_chirp: usize,
    pub min_adc_sampling_rate: Float,
    pub max_adc_sampling_rate: Float,
    pub adc_resolution_bits: u8,
    pub hp_cutoff_list: Vec<u32>,
    pub lp_cutoff_list: Vec<u32>,
    pub if_gain_list: Vec<i8>,
}

/// Single-shape FMCW acquisition settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub sample_rate_Hz: u32,
    pub rx_mask: u32,
    pub tx_mask: u32,
    pub tx_power_level: u32,
    pub if_gain_dB: u32,
    pub start_frequency_Hz: f64,
    pub end_frequency_Hz: f64,
    pub num_samples_per_chirp: usize,
    pub num_chirps_per_frame: usize,
    pub chirp_repetition_time_s: Float,
    pub frame_repetition_time_s: Float,
    pub hp_cutoff_Hz: u32,
    pub aaf_cutoff_Hz: u32,
    pub mimo_mode: MimoMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate_Hz: 1_000_000,
            rx_mask: 0b111,
            tx_mask: 1,
            tx_power_level: 31,
            if_gain_dB: 33,
            start_frequency_Hz: 60.0e9,
            end_frequency_Hz: 61.5e9,
            num_samples_per_chirp: 64,
            num_chirps_per_frame: 32,
            chirp_repetition_time_s: 300e-6,
            frame_repetition_time_s: 0.1,
            hp_cutoff_Hz: 80_000,
            aaf_cutoff_Hz: 500_000,
            mimo_mode: MimoMode::Off,
        }
    }
}

/// Indices of the set bits of `mask`, lowest first.
pub fn mask_to_indices(mask: u32) -> impl Iterator<Item = usize> {
    (0..32).filter(move |bit| mask & (1 << bit) != 0)
}

/// Mask with one bit per antenna index.
pub fn indices_to_mask(indices: &[usize]) -> RadarResult<u32> {
    indices.iter().try_fold(0u32, |mask, &index| {
        if index >= 32 {
            Err(RadarError::ArgumentOutOfBounds(format!("antenna index {}", index)))
        } else {
            Ok(mask | (1 << index))
        }
    })
}

impl DeviceConfig {
    pub fn bandwidth_Hz(&self) -> f64 {
        (self.end_frequency_Hz - self.start_frequency_Hz).abs()
    }

    pub fn center_frequency_Hz(&self) -> f64 {
        (self.start_frequency_Hz + self.end_frequency_Hz) / 2.0
    }

    pub fn num_rx_antennas(&self) -> usize {
        self.rx_mask.count_ones() as usize
    }

    pub fn num_tx_antennas(&self) -> usize {
        self.tx_mask.count_ones() as usize
    }

    /// Receive channels in a frame; TDM interleaves one per transmitter.
    pub fn num_virtual_antennas(&self) -> usize {
        match self.mimo_mode {
            MimoMode::Off => self.num_rx_antennas(),
            MimoMode::Tdm => self.num_rx_antennas() * self.num_tx_antennas(),
        }
    }

    /// `(rx, chirps, samples)` of the frames this configuration produces.
    pub fn frame_shape(&self) -> (usize, usize, usize) {
        (self.num_rx_antennas(), self.num_chirps_per_frame, self.num_samples_per_chirp)
    }

    /// Checks every field against the limits of `info`.
    pub fn validate(&self, info: &SensorInfo) -> RadarResult<()> {
        if self.num_samples_per_chirp == 0 || self.num_samples_per_chirp > info.max_num_samples_per_chirp {
            return Err(RadarError::NumSamplesOutOfRange);
        }
        if self.num_chirps_per_frame == 0 {
            return Err(RadarError::NumChirpsNotAllowed);
        }
        let rx_limit = 1u32.checked_shl(info.num_rx_antennas as u32).unwrap_or(0);
        if self.rx_mask == 0 || self.rx_mask >= rx_limit {
            return Err(RadarError::RxAntennaCombinationNotAllowed);
        }
        let tx_limit = 1u32.checked_shl(info.num_tx_antennas as u32).unwrap_or(0);
        if self.tx_mask == 0 || self.tx_mask >= tx_limit {
            return Err(RadarError::ArgumentOutOfBounds(format!("tx mask {:#x}", self.tx_mask)));
        }
        if self.mimo_mode == MimoMode::Tdm && self.num_tx_antennas() < 2 {
            return Err(RadarError::ArgumentInvalid("tdm needs two transmitters".into()));
        }
        let rate = self.sample_rate_Hz as Float;
        if rate < info.min_adc_sampling_rate || rate > info.max_adc_sampling_rate {
            return Err(RadarError::SampleRateOutOfRange);
        }
        let rf_range = info.min_rf_frequency_Hz..=info.max_rf_frequency_Hz;
        if !rf_range.contains(&self.start_frequency_Hz)
            || !rf_range.contains(&self.end_frequency_Hz)
            || self.start_frequency_Hz == self.end_frequency_Hz
        {
            return Err(RadarError::RfOutOfRange);
        }
        if self.tx_power_level > info.max_tx_power {
            return Err(RadarError::TxPowerOutOfRange);
        }
        if !info.if_gain_list.iter().any(|&gain| gain as u32 == self.if_gain_dB) {
            return Err(RadarError::IfGainOutOfRange);
        }
        if !info.hp_cutoff_list.contains(&self.hp_cutoff_Hz) {
            return Err(RadarError::ArgumentInvalid(format!("hp cutoff {} Hz", self.hp_cutoff_Hz)));
        }
        if !info.lp_cutoff_list.contains(&self.aaf_cutoff_Hz) {
            return Err(RadarError::ArgumentInvalid(format!("aaf cutoff {} Hz", self.aaf_cutoff_Hz)));
        }
        let sampling_time_s = self.num_samples_per_chirp as Float / rate;
        if !(self.chirp_repetition_time_s > sampling_time_s) {
            return Err(RadarError::ChirpRateOutOfRange);
        }
        let chirps_time_s = self.chirp_repetition_time_s * self.num_chirps_per_frame as Float;
        if !(self.frame_repetition_time_s >= chirps_time_s) {
            return Err(RadarError::FrameRateOutOfRange);
        }
        Ok(())
    }
}
