//! Digital beamforming over a uniform linear array.
//!
//! Antenna `n` of a plane wave from angle θ carries the phase
//! `-2π·n·(d/λ)·sin θ`; beam `b` steers towards `θ_b` with the conjugate
//! weight `exp(+j·2π·n·(d/λ)·sin θ_b) / √N`.

use ndarray::{ArrayView1, ArrayView3, ArrayViewMut1, ArrayViewMut3, Axis};
use rustfft::num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::containers::{MatrixC, VectorR};
use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbfConfig {
    pub num_beams: usize,
    pub num_antennas: usize,
    pub min_angle_deg: Float,
    pub max_angle_deg: Float,
    /// Antenna spacing over wavelength.
    pub d_by_lambda: Float,
}

impl DbfConfig {
    pub(crate) fn validate(&self) -> RadarResult<()> {
        if self.num_beams < 2 {
            return Err(RadarError::ArgumentOutOfBounds(format!("{} beams", self.num_beams)));
        }
        if self.num_antennas == 0 {
            return Err(RadarError::ArgumentOutOfBounds("no antennas".into()));
        }
        if !(self.min_angle_deg < self.max_angle_deg) {
            return Err(RadarError::ArgumentInvalid(format!(
                "angle range [{}, {}]",
                self.min_angle_deg, self.max_angle_deg
            )));
        }
        if !(self.d_by_lambda > 0.0) {
            return Err(RadarError::ArgumentOutOfBounds(format!("d/lambda {}", self.d_by_lambda)));
        }
        Ok(())
    }

    /// Beam steering angles, linearly spaced from min to max inclusive.
    pub fn beam_angles_deg(&self) -> VectorR {
        let step = (self.max_angle_deg - self.min_angle_deg) / (self.num_beams - 1) as Float;
        VectorR::from_shape_fn(self.num_beams, |b| self.min_angle_deg + step * b as Float)
    }

    /// `num_antennas x num_beams` weight matrix.
    pub fn weights(&self) -> MatrixC {
        let angles = self.beam_angles_deg();
        let scale = 1.0 / (self.num_antennas as Float).sqrt();
        MatrixC::from_shape_fn((self.num_antennas, self.num_beams), |(n, b)| {
            let phase = 2.0 * std::f32::consts::PI * self.d_by_lambda * n as Float * angles[b].to_radians().sin();
            Complex::from_polar(scale, phase)
        })
    }
}

pub struct Dbf {
    config: DbfConfig,
    weights: MatrixC,
    angles_deg: VectorR,
}

impl Dbf {
    pub fn new(config: DbfConfig) -> RadarResult<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.weights(),
            angles_deg: config.beam_angles_deg(),
            config,
        })
    }

    pub fn config(&self) -> &DbfConfig {
        &self.config
    }

    pub fn num_beams(&self) -> usize {
        self.config.num_beams
    }

    pub fn weights(&self) -> &MatrixC {
        &self.weights
    }

    pub fn beam_angles_deg(&self) -> &VectorR {
        &self.angles_deg
    }

    /// Beams a `range x doppler x antennas` cube into `range x doppler x beams`.
    pub fn run(&self, input: ArrayView3<Complex>, mut output: ArrayViewMut3<Complex>) -> RadarResult<()> {
        let (rows, cols, antennas) = input.dim();
        ensure_shape("dbf antennas", &[self.config.num_antennas], &[antennas])?;
        ensure_shape("dbf output", &[rows, cols, self.config.num_beams], output.shape())?;
        for (b, mut beam) in output.axis_iter_mut(Axis(2)).enumerate() {
            beam.fill(Complex::zero());
            for (n, antenna) in input.axis_iter(Axis(2)).enumerate() {
                let weight = self.weights[[n, b]];
                beam.zip_mut_with(&antenna, |acc, &x| *acc += weight * x);
            }
        }
        Ok(())
    }

    /// Beams a single antenna snapshot.
    pub fn run_vector(&self, input: ArrayView1<Complex>, mut output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        ensure_shape("dbf antennas", &[self.config.num_antennas], input.shape())?;
        ensure_shape("dbf output", &[self.config.num_beams], output.shape())?;
        for (out, weights) in output.iter_mut().zip(self.weights.axis_iter(Axis(1))) {
            *out = weights.iter().zip(input.iter()).fold(Complex::zero(), |acc, (&w, &x)| acc + w * x);
        }
        Ok(())
    }
}
