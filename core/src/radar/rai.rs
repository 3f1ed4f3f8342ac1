//! Range-angle images: per-antenna RDM, complex 2-D MTI, beamforming and
//! selection of the Doppler bins with the best SNR.

use ndarray::{ArrayView1, ArrayView3, ArrayViewMut3, Axis};
use serde::{Deserialize, Serialize};

use crate::algo::mti::Mti2dC;
use crate::containers::{max, var, CubeC, MatrixR, VectorR};
use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};
use crate::radar::dbf::{Dbf, DbfConfig};
use crate::radar::rdm::{RangeDopplerMap, RangeDopplerMapConfig};

pub const MAX_NUM_IMAGES: usize = 64;
pub const MAX_NUM_ANTENNAS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeAngleImageConfig {
    pub rdm: RangeDopplerMapConfig,
    pub alpha_mti: Float,
    pub dbf: DbfConfig,
    /// Number of Doppler bins, best SNR first, rendered per frame.
    pub num_images: usize,
    pub num_antennas: usize,
}

pub struct RangeAngleImage {
    rdm: RangeDopplerMap,
    mti: Vec<Mti2dC>,
    dbf: Dbf,
    num_images: usize,
    num_antennas: usize,
    /// `range x doppler x antennas`
    rdm_cube: CubeC,
    rx_spectrum: CubeC,
    /// `range x doppler x beams`
    dbf_cube: CubeC,
    snr: VectorR,
    doppler_order: Vec<usize>,
    magnitude: MatrixR,
}

impl RangeAngleImage {
    pub fn new(config: &RangeAngleImageConfig) -> RadarResult<Self> {
        if config.num_images == 0 || config.num_images > MAX_NUM_IMAGES {
            return Err(RadarError::ArgumentOutOfBounds(format!("{} images", config.num_images)));
        }
        if config.num_antennas == 0 || config.num_antennas > MAX_NUM_ANTENNAS {
            return Err(RadarError::ArgumentOutOfBounds(format!("{} antennas", config.num_antennas)));
        }
        if config.dbf.num_antennas != config.num_antennas {
            return Err(RadarError::ArgumentInvalid(format!(
                "beamformer built for {} antennas, image for {}",
                config.dbf.num_antennas, config.num_antennas
            )));
        }
        let rdm = RangeDopplerMap::new(&config.rdm)?;
        let (range_bins, doppler_bins) = rdm.shape();
        if config.num_images > doppler_bins {
            return Err(RadarError::ArgumentOutOfBounds(format!(
                "{} images from {} doppler bins",
                config.num_images, doppler_bins
            )));
        }
        let mti = (0..config.num_antennas)
            .map(|_| Mti2dC::new(config.alpha_mti, range_bins, doppler_bins))
            .collect::<RadarResult<Vec<_>>>()?;
        let dbf = Dbf::new(config.dbf)?;
        let beams = dbf.num_beams();
        Ok(Self {
            rdm,
            mti,
            dbf,
            num_images: config.num_images,
            num_antennas: config.num_antennas,
            rdm_cube: CubeC::zeros((range_bins, doppler_bins, config.num_antennas)),
            rx_spectrum: CubeC::zeros((range_bins, doppler_bins, config.num_antennas)),
            dbf_cube: CubeC::zeros((range_bins, doppler_bins, beams)),
            snr: VectorR::zeros(doppler_bins),
            doppler_order: (0..doppler_bins).collect(),
            magnitude: MatrixR::zeros((range_bins, beams)),
        })
    }

    /// `(images, range_bins, beams)` of the output cube.
    pub fn output_shape(&self) -> (usize, usize, usize) {
        (self.num_images, self.rdm_cube.dim().0, self.dbf.num_beams())
    }

    pub fn beam_angles_deg(&self) -> &VectorR {
        self.dbf.beam_angles_deg()
    }

    /// Per-Doppler SNR of the last frame, sorted descending.
    pub fn snr(&self) -> ArrayView1<'_, Float> {
        self.snr.view()
    }

    /// Doppler bins of the last frame ordered by descending SNR.
    pub fn doppler_order(&self) -> &[usize] {
        &self.doppler_order
    }

    /// MTI-filtered spectrum, `range x doppler x antennas`.
    pub fn rx_spectrum(&self) -> ArrayView3<'_, Complex> {
        self.rx_spectrum.view()
    }

    /// Unfiltered range-Doppler maps, `range x doppler x antennas`.
    pub fn range_doppler(&self) -> ArrayView3<'_, Complex> {
        self.rdm_cube.view()
    }

    pub fn reset(&mut self) {
        for mti in &mut self.mti {
            mti.reset();
        }
    }

    /// Turns a raw `rx x chirps x samples` frame into `num_images` magnitude
    /// images of `range x beams`.
    pub fn run(&mut self, frame: ArrayView3<Float>, mut output: ArrayViewMut3<Float>) -> RadarResult<()> {
        if frame.dim().0 < self.num_antennas {
            return Err(RadarError::DimensionMismatch(format!(
                "frame has {} antennas, {} needed",
                frame.dim().0,
                self.num_antennas
            )));
        }
        let (images, range_bins, beams) = self.output_shape();
        ensure_shape("range angle image", &[images, range_bins, beams], output.shape())?;

        for rx in 0..self.num_antennas {
            let rdm = self.rdm_cube.index_axis_mut(Axis(2), rx);
            self.rdm.run_complex(frame.index_axis(Axis(0), rx), rdm)?;
            self.mti[rx].run(
                self.rdm_cube.index_axis(Axis(2), rx),
                self.rx_spectrum.index_axis_mut(Axis(2), rx),
            )?;
        }
        self.dbf.run(self.rx_spectrum.view(), self.dbf_cube.view_mut())?;

        for (d, slot) in self.snr.iter_mut().enumerate() {
            let beams = self.dbf_cube.index_axis(Axis(1), d);
            self.magnitude.zip_mut_with(&beams, |m, v| *m = v.norm());
            let peak = max(self.magnitude.view()).map_or(0.0, |(_, v)| v);
            let variance = var(self.magnitude.view());
            *slot = if variance > 0.0 {
                peak * peak / variance
            } else {
                0.0
            };
        }
        let snr = &self.snr;
        for (i, slot) in self.doppler_order.iter_mut().enumerate() {
            *slot = i;
        }
        self.doppler_order
            .sort_unstable_by(|&a, &b| snr[b].total_cmp(&snr[a]).then(a.cmp(&b)));

        for (image, mut out) in output.axis_iter_mut(Axis(0)).enumerate() {
            let doppler = self.doppler_order[image];
            out.zip_mut_with(&self.dbf_cube.index_axis(Axis(1), doppler), |o, v| *o = v.norm());
        }
        if let Some(values) = self.snr.as_slice_mut() {
            values.sort_unstable_by(|a, b| b.total_cmp(a));
        }
        Ok(())
    }
}
