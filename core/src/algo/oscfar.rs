//! Two-dimensional ordered-statistic CFAR detector.

use ndarray::{ArrayView2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::prelude::{ensure_shape, Float, RadarError, RadarResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OsCfarConfig {
    /// Half-width of the square reference window.
    pub window_rank: usize,
    /// Half-width of the guard square around the cell under test.
    pub guard_band: usize,
    /// Fraction in (0, 1] selecting the order statistic.
    pub sample: Float,
    pub pfa: Float,
    /// Cells below `coarse_scalar * max(input)` are rejected without ranking.
    pub coarse_scalar: Float,
}

impl Default for OsCfarConfig {
    fn default() -> Self {
        Self {
            window_rank: 4,
            guard_band: 1,
            sample: 0.75,
            pfa: 1e-3,
            coarse_scalar: 0.0,
        }
    }
}

/// OS-CFAR over a square-law (power) matrix.
///
/// Only cells whose full reference window fits inside the matrix are tested;
/// the border of width `window_rank` is always reported as zero.
#[derive(Debug, Clone)]
pub struct OsCfar {
    config: OsCfarConfig,
    cells: usize,
    order_index: usize,
    threshold_factor: Float,
    reference: Vec<Float>,
}

impl OsCfar {
    pub fn new(config: OsCfarConfig) -> RadarResult<Self> {
        if config.window_rank == 0 || config.guard_band >= config.window_rank {
            return Err(RadarError::ArgumentInvalid(format!(
                "guard band {} must be smaller than window rank {}",
                config.guard_band, config.window_rank
            )));
        }
        if !(config.sample > 0.0 && config.sample <= 1.0) {
            return Err(RadarError::ArgumentOutOfBounds(format!("os sample {}", config.sample)));
        }
        if !(config.pfa > 0.0 && config.pfa < 1.0) {
            return Err(RadarError::ArgumentOutOfBounds(format!("pfa {}", config.pfa)));
        }
        if config.coarse_scalar < 0.0 {
            return Err(RadarError::ArgumentOutOfBounds(format!(
                "coarse scalar {}",
                config.coarse_scalar
            )));
        }
        let side = 2 * config.window_rank + 1;
        let guard = 2 * config.guard_band + 1;
        let cells = side * side - guard * guard;
        let order_index = ((cells as Float * config.sample + 0.5).floor() as usize).clamp(1, cells) - 1;
        let threshold_factor = threshold_factor(cells, order_index + 1, config.pfa as f64) as Float;
        Ok(Self {
            config,
            cells,
            order_index,
            threshold_factor,
            reference: Vec::with_capacity(cells),
        })
    }

    pub fn config(&self) -> &OsCfarConfig {
        &self.config
    }

    /// Number of cells in the reference window.
    pub fn reference_cells(&self) -> usize {
        self.cells
    }

    /// Zero-based index of the order statistic used as noise estimate.
    pub fn order_index(&self) -> usize {
        self.order_index
    }

    pub fn threshold_factor(&self) -> Float {
        self.threshold_factor
    }

    /// Writes detected cells (their input value) into `output`; every other
    /// cell becomes zero. Returns the number of detections.
    pub fn run(&mut self, input: ArrayView2<Float>, mut output: ArrayViewMut2<Float>) -> RadarResult<usize> {
        ensure_shape("cfar output", input.shape(), output.shape())?;
        let (rows, cols) = input.dim();
        let rank = self.config.window_rank;
        let guard = self.config.guard_band as isize;
        output.fill(0.0);
        if rows < 2 * rank + 1 || cols < 2 * rank + 1 {
            return Ok(0);
        }

        let coarse = if self.config.coarse_scalar > 0.0 {
            self.config.coarse_scalar * input.iter().copied().fold(Float::NEG_INFINITY, Float::max)
        } else {
            Float::NEG_INFINITY
        };

        let mut detections = 0;
        for r in rank..rows - rank {
            for c in rank..cols - rank {
                let cell = input[[r, c]];
                if cell < coarse {
                    continue;
                }
                self.reference.clear();
                for rr in (r - rank)..=(r + rank) {
                    let dr = rr as isize - r as isize;
                    for cc in (c - rank)..=(c + rank) {
                        let dc = cc as isize - c as isize;
                        if dr.abs() <= guard && dc.abs() <= guard {
                            continue;
                        }
                        self.reference.push(input[[rr, cc]]);
                    }
                }
                let (_, noise, _) = self
                    .reference
                    .select_nth_unstable_by(self.order_index, |a, b| a.total_cmp(b));
                if cell > *noise * self.threshold_factor {
                    output[[r, c]] = cell;
                    detections += 1;
                }
            }
        }
        Ok(detections)
    }
}

/// False-alarm probability of OS-CFAR with `n` exponential reference cells,
/// order statistic `k` (one-based) and threshold factor `t`.
fn os_false_alarm(n: usize, k: usize, t: f64) -> f64 {
    (0..k).fold(1.0, |p, i| {
        let remaining = (n - i) as f64;
        p * remaining / (remaining + t)
    })
}

/// Solves `os_false_alarm(n, k, t) = pfa` for `t` by bisection.
fn threshold_factor(n: usize, k: usize, pfa: f64) -> f64 {
    let mut low = 0.0;
    let mut high = 1.0;
    while os_false_alarm(n, k, high) > pfa && high < 1e12 {
        high *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (low + high);
        if os_false_alarm(n, k, mid) > pfa {
            low = mid;
        } else {
            high = mid;
        }
    }
    0.5 * (low + high)
}
