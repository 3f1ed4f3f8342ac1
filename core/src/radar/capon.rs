//! Minimum-variance (Capon) angle estimation for a single range gate.

use ndarray::{ArrayView3, Axis};
use rustfft::num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::containers::{mat_mul_conj_transpose, mat_vec, MatrixC, VectorC, VectorR};
use crate::math::matrix::{invert_with, LuWorkspace};
use crate::prelude::{Complex, Float, RadarError, RadarResult};
use crate::radar::dbf::DbfConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleCaponConfig {
    /// Width of the Doppler gate around the strongest bin; odd, typically 5.
    pub range_win_size: usize,
    /// Antenna used to pick the Doppler bin.
    pub selected_rx: usize,
    pub chirps_per_frame: usize,
    /// Phase compensation between antennas, expressed as an angle.
    pub phase_offset_degrees: Float,
    pub num_virtual_antennas: usize,
    pub num_beams: usize,
    pub min_angle_degrees: Float,
    pub max_angle_degrees: Float,
    pub d_by_lambda: Float,
}

pub struct AngleCapon {
    config: AngleCaponConfig,
    neighbouring_bins: usize,
    /// Array response per beam, `antennas x beams`.
    steering: MatrixC,
    angles_deg: VectorR,
    phase_offset: VectorC,
    range_pulse: MatrixC,
    covariance: MatrixC,
    inverse: MatrixC,
    lu: LuWorkspace<Complex>,
    projected: VectorC,
}

impl AngleCapon {
    pub fn new(config: AngleCaponConfig) -> RadarResult<Self> {
        let beams = DbfConfig {
            num_beams: config.num_beams,
            num_antennas: config.num_virtual_antennas,
            min_angle_deg: config.min_angle_degrees,
            max_angle_deg: config.max_angle_degrees,
            d_by_lambda: config.d_by_lambda,
        };
        beams.validate()?;
        if config.range_win_size == 0 || config.range_win_size % 2 == 0 {
            return Err(RadarError::ArgumentInvalid(format!(
                "range window size {} must be odd",
                config.range_win_size
            )));
        }
        if config.range_win_size > config.chirps_per_frame {
            return Err(RadarError::ArgumentOutOfBounds(format!(
                "range window {} wider than {} doppler bins",
                config.range_win_size, config.chirps_per_frame
            )));
        }
        if config.selected_rx >= config.num_virtual_antennas {
            return Err(RadarError::ArgumentOutOfBounds(format!("selected rx {}", config.selected_rx)));
        }
        let n = config.num_virtual_antennas;
        let offset_phase = -2.0 * std::f32::consts::PI * config.d_by_lambda * config.phase_offset_degrees.to_radians().sin();
        Ok(Self {
            neighbouring_bins: (config.range_win_size - 1) / 2,
            steering: beams.weights().mapv(|w| w.conj()),
            angles_deg: beams.beam_angles_deg(),
            phase_offset: VectorC::from_shape_fn(n, |ant| Complex::from_polar(1.0, offset_phase * ant as Float)),
            range_pulse: MatrixC::zeros((n, config.range_win_size)),
            covariance: MatrixC::zeros((n, n)),
            inverse: MatrixC::zeros((n, n)),
            lu: LuWorkspace::new(n),
            projected: VectorC::zeros(n),
            config,
        })
    }

    pub fn config(&self) -> &AngleCaponConfig {
        &self.config
    }

    pub fn beam_angles_deg(&self) -> &VectorR {
        &self.angles_deg
    }

    /// Strongest Doppler bin of `range_bin` on the selected antenna, kept far
    /// enough from the edges for a full gate.
    pub fn find_doppler_bin(&self, range_bin: usize, rx_spectrum: ArrayView3<Complex>) -> usize {
        let channel = rx_spectrum.index_axis(Axis(2), self.config.selected_rx);
        let mut best = (0, -1.0);
        for (col, value) in channel.row(range_bin).iter().enumerate() {
            let magnitude = value.norm();
            if magnitude > best.1 {
                best = (col, magnitude);
            }
        }
        let nb = self.neighbouring_bins;
        best.0.clamp(nb, self.config.chirps_per_frame - nb - 1)
    }

    /// Angle in degrees of the dominant return at `range_bin` of a
    /// `range x doppler x antennas` spectrum cube.
    pub fn run(&mut self, range_bin: usize, rx_spectrum: ArrayView3<Complex>) -> RadarResult<Float> {
        let (rows, cols, antennas) = rx_spectrum.dim();
        if antennas != self.config.num_virtual_antennas || cols != self.config.chirps_per_frame {
            return Err(RadarError::DimensionMismatch(format!(
                "capon expects {} doppler bins and {} antennas, got {:?}",
                self.config.chirps_per_frame,
                self.config.num_virtual_antennas,
                rx_spectrum.shape()
            )));
        }
        if range_bin >= rows {
            return Err(RadarError::IndexOutOfBounds(format!("range bin {} of {}", range_bin, rows)));
        }
        let doppler = self.find_doppler_bin(range_bin, rx_spectrum);
        let first = doppler - self.neighbouring_bins;
        for (ant, mut pulse) in self.range_pulse.axis_iter_mut(Axis(0)).enumerate() {
            let scalar = self.phase_offset[ant];
            for (k, slot) in pulse.iter_mut().enumerate() {
                *slot = rx_spectrum[[range_bin, first + k, ant]] * scalar;
            }
        }
        mat_mul_conj_transpose(self.range_pulse.view(), self.range_pulse.view(), self.covariance.view_mut())?;
        invert_with(self.covariance.view(), self.inverse.view_mut(), &mut self.lu)?;

        let mut best = (0, Float::MAX);
        for (b, steering) in self.steering.axis_iter(Axis(1)).enumerate() {
            mat_vec(self.inverse.view(), steering, self.projected.view_mut())?;
            let power = steering
                .iter()
                .zip(self.projected.iter())
                .fold(Complex::zero(), |acc, (a, p)| acc + a.conj() * p)
                .norm();
            if power < best.1 {
                best = (b, power);
            }
        }
        Ok(self.angles_deg[best.0])
    }
}
