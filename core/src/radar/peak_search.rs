//! Local-maximum search over spectra with an adaptive mean-based threshold.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::prelude::{Float, RadarError, RadarResult};

/// Spectra shorter than this never contain a peak.
pub const MIN_PEAK_SEARCH_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakSearchConfig {
    /// Physical value represented by one bin, e.g. meters per range bin.
    pub value_per_bin: Float,
    pub search_zone_start: Float,
    pub search_zone_end: Float,
    /// Threshold is `threshold_factor * mean(input) + threshold_offset`.
    pub threshold_factor: Float,
    pub threshold_offset: Float,
    pub max_num_peaks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak2d {
    pub row: usize,
    pub col: usize,
    pub value: Float,
}

pub struct PeakSearch {
    config: PeakSearchConfig,
    indices: Vec<usize>,
    values: Vec<Float>,
    peaks_2d: Vec<Peak2d>,
}

impl PeakSearch {
    pub fn new(config: PeakSearchConfig) -> RadarResult<Self> {
        if !(config.value_per_bin > 0.0) {
            return Err(RadarError::ArgumentInvalid("value per bin must be positive".into()));
        }
        if config.search_zone_start < 0.0 || config.search_zone_end < config.search_zone_start {
            return Err(RadarError::ArgumentInvalid(format!(
                "search zone [{}, {}]",
                config.search_zone_start, config.search_zone_end
            )));
        }
        if config.max_num_peaks == 0 {
            return Err(RadarError::ArgumentInvalid("max_num_peaks is zero".into()));
        }
        Ok(Self {
            indices: Vec::with_capacity(config.max_num_peaks),
            values: Vec::with_capacity(config.max_num_peaks),
            peaks_2d: Vec::with_capacity(config.max_num_peaks),
            config,
        })
    }

    pub fn config(&self) -> &PeakSearchConfig {
        &self.config
    }

    pub fn threshold(&self, input: ArrayView1<Float>) -> Float {
        if input.is_empty() {
            return self.config.threshold_offset;
        }
        self.config.threshold_factor * input.sum() / input.len() as Float + self.config.threshold_offset
    }

    /// Returns the indices of up to `max_num_peaks` peaks in ascending order.
    ///
    /// A peak beats its two left neighbours strictly and is not below its
    /// two right neighbours, so on a plateau the lower index wins.
    pub fn run(&mut self, input: ArrayView1<Float>) -> &[usize] {
        self.indices.clear();
        self.values.clear();
        if input.len() < MIN_PEAK_SEARCH_LEN {
            return &self.indices;
        }
        let threshold = self.threshold(input);
        for n in 2..input.len() - 2 {
            let value = input[n];
            if value < threshold
                || value <= input[n - 1]
                || value <= input[n - 2]
                || value < input[n + 1]
                || value < input[n + 2]
            {
                continue;
            }
            let position = n as Float * self.config.value_per_bin;
            if position < self.config.search_zone_start || position > self.config.search_zone_end {
                continue;
            }
            self.indices.push(n);
            self.values.push(value);
            if self.indices.len() == self.config.max_num_peaks {
                break;
            }
        }
        &self.indices
    }

    /// Values of the peaks found by the last [`run`](Self::run).
    pub fn values(&self) -> &[Float] {
        &self.values
    }

    /// 3x3 local maxima of a matrix at or above `threshold`, in raster order.
    ///
    /// Neighbours earlier in raster order must be strictly lower, later ones
    /// not higher; cells outside the matrix are ignored.
    pub fn run_2d(&mut self, input: ArrayView2<Float>, threshold: Float) -> &[Peak2d] {
        self.peaks_2d.clear();
        let (rows, cols) = input.dim();
        'scan: for r in 0..rows {
            for c in 0..cols {
                let value = input[[r, c]];
                if value < threshold || !is_local_max(&input, r, c) {
                    continue;
                }
                self.peaks_2d.push(Peak2d { row: r, col: c, value });
                if self.peaks_2d.len() == self.config.max_num_peaks {
                    break 'scan;
                }
            }
        }
        &self.peaks_2d
    }
}

fn is_local_max(input: &ArrayView2<Float>, r: usize, c: usize) -> bool {
    let (rows, cols) = input.dim();
    let value = input[[r, c]];
    for nr in r.saturating_sub(1)..(r + 2).min(rows) {
        for nc in c.saturating_sub(1)..(c + 2).min(cols) {
            if (nr, nc) == (r, c) {
                continue;
            }
            let neighbour = input[[nr, nc]];
            let earlier = (nr, nc) < (r, c);
            if (earlier && neighbour >= value) || (!earlier && neighbour > value) {
                return false;
            }
        }
    }
    true
}
