//! Bank of constant-velocity Kalman tracks over range, radial speed and angle.

use serde::Serialize;

use crate::prelude::{Float, RadarError, RadarResult};

pub const MAX_TRACKS: usize = 5;
/// Most candidates offered in one frame.
pub const MAX_CANDIDATES: usize = 32;
/// Updates needed before a track is reported.
pub const CONFIRM_HITS: usize = 2;
/// Missed frames after which a track is closed.
pub const MAX_MISSES: usize = 5;
pub const GATE_RANGE_M: Float = 0.6;
pub const GATE_ANGLE_DEG: Float = 25.0;

// state and measurement order
const RANGE: usize = 0;
const SPEED: usize = 1;
const ANGLE: usize = 2;

const MEASUREMENT_VARIANCE: [Float; 3] = [0.01, 0.02, 25.0];
const PROCESS_VARIANCE: [Float; 3] = [0.005, 0.05, 4.0];

type Vector3 = [Float; 3];
type Matrix3 = [[Float; 3]; 3];

fn identity() -> Matrix3 {
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

fn diagonal(values: &[Float; 3]) -> Matrix3 {
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = values[i];
    }
    m
}

fn mul(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    m
}

fn transpose(a: &Matrix3) -> Matrix3 {
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = a[j][i];
        }
    }
    m
}

fn mul_vec(a: &Matrix3, v: &Vector3) -> Vector3 {
    let mut out = [0.0; 3];
    for (i, cell) in out.iter_mut().enumerate() {
        *cell = (0..3).map(|k| a[i][k] * v[k]).sum();
    }
    out
}

/// Adjugate inverse; the innovation covariance is at least `R` on the
/// diagonal, so only a corrupted state ends up singular.
fn invert(a: &Matrix3) -> RadarResult<Matrix3> {
    let cofactor = |r: usize, c: usize| {
        let (r1, r2) = ((r + 1) % 3, (r + 2) % 3);
        let (c1, c2) = ((c + 1) % 3, (c + 2) % 3);
        a[r1][c1] * a[r2][c2] - a[r1][c2] * a[r2][c1]
    };
    let det: Float = (0..3).map(|c| a[0][c] * cofactor(0, c)).sum();
    if !det.is_normal() {
        return Err(RadarError::MatrixSingular);
    }
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = cofactor(j, i) / det;
        }
    }
    Ok(m)
}

/// One reported row; `track_id <= 0` marks an unused row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrackRow {
    pub track_id: i32,
    pub range_m: Float,
    pub angle_deg: Float,
    pub speed_m_s: Float,
}

impl TrackRow {
    pub const INVALID: Self = Self {
        track_id: 0,
        range_m: 0.0,
        angle_deg: 0.0,
        speed_m_s: 0.0,
    };

    pub fn is_valid(&self) -> bool {
        self.track_id > 0
    }
}

/// Clustered detection offered to the tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub range_m: Float,
    pub angle_deg: Float,
    pub speed_m_s: Float,
    pub power: Float,
    /// Doppler bin away from zero speed.
    pub moving: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Born, not yet reported.
    Tentative,
    Confirmed,
    /// Confirmed but missed at least the last frame.
    Coasting,
}

#[derive(Debug, Clone)]
struct KalmanFilter {
    state: Vector3,
    covariance: Matrix3,
}

impl KalmanFilter {
    fn new(candidate: &Candidate) -> Self {
        let mut state = [0.0; 3];
        state[RANGE] = candidate.range_m;
        state[SPEED] = candidate.speed_m_s;
        state[ANGLE] = candidate.angle_deg;
        Self {
            state,
            covariance: diagonal(&MEASUREMENT_VARIANCE),
        }
    }

    fn predict(&mut self, dt_s: Float) {
        let mut transition = identity();
        transition[RANGE][SPEED] = dt_s;
        self.state = mul_vec(&transition, &self.state);
        let mut covariance = mul(&mul(&transition, &self.covariance), &transpose(&transition));
        for (i, row) in covariance.iter_mut().enumerate() {
            row[i] += PROCESS_VARIANCE[i];
        }
        self.covariance = covariance;
    }

    /// Measurement is the full state, so `H = I`.
    fn update(&mut self, candidate: &Candidate) -> RadarResult<()> {
        let measurement = [candidate.range_m, candidate.speed_m_s, candidate.angle_deg];
        let mut innovation_cov = self.covariance;
        for (i, row) in innovation_cov.iter_mut().enumerate() {
            row[i] += MEASUREMENT_VARIANCE[i];
        }
        let gain = mul(&self.covariance, &invert(&innovation_cov)?);
        let residual: Vector3 = std::array::from_fn(|i| measurement[i] - self.state[i]);
        let correction = mul_vec(&gain, &residual);
        for (x, dx) in self.state.iter_mut().zip(correction) {
            *x += dx;
        }
        let mut complement = identity();
        for (row, gain_row) in complement.iter_mut().zip(&gain) {
            for (cell, k) in row.iter_mut().zip(gain_row) {
                *cell -= k;
            }
        }
        self.covariance = mul(&complement, &self.covariance);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Track {
    id: i32,
    state: TrackState,
    filter: KalmanFilter,
    hits: usize,
    misses: usize,
}

impl Track {
    fn row(&self) -> TrackRow {
        match self.state {
            TrackState::Tentative => TrackRow::INVALID,
            TrackState::Confirmed | TrackState::Coasting => TrackRow {
                track_id: self.id,
                range_m: self.filter.state[RANGE],
                angle_deg: self.filter.state[ANGLE],
                speed_m_s: self.filter.state[SPEED],
            },
        }
    }

    /// Normalized distance to `candidate`, `None` outside the gate.
    fn gate(&self, candidate: &Candidate) -> Option<Float> {
        let dr = (candidate.range_m - self.filter.state[RANGE]) / GATE_RANGE_M;
        let da = (candidate.angle_deg - self.filter.state[ANGLE]) / GATE_ANGLE_DEG;
        (dr.abs() <= 1.0 && da.abs() <= 1.0).then(|| dr * dr + da * da)
    }
}

/// Fixed number of track slots; reported rows keep their slot index.
#[derive(Debug, Clone)]
pub struct TrackBank {
    slots: [Option<Track>; MAX_TRACKS],
    next_id: i32,
    dt_s: Float,
    taken: Vec<bool>,
    pairs: Vec<(Float, usize, usize)>,
}

impl TrackBank {
    pub fn new(frame_time_s: Float) -> Self {
        Self {
            slots: Default::default(),
            next_id: 1,
            dt_s: frame_time_s,
            taken: Vec::with_capacity(MAX_CANDIDATES),
            pairs: Vec::with_capacity(MAX_TRACKS * MAX_CANDIDATES),
        }
    }

    pub fn num_tracks(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn state_of(&self, slot: usize) -> Option<TrackState> {
        self.slots.get(slot)?.as_ref().map(|t| t.state)
    }

    /// Predicts every track, assigns `candidates` greedily by gated
    /// distance, closes stale tracks and opens new ones for unclaimed
    /// moving candidates.
    pub fn step(&mut self, candidates: &[Candidate]) -> RadarResult<[TrackRow; MAX_TRACKS]> {
        for track in self.slots.iter_mut().flatten() {
            track.filter.predict(self.dt_s);
        }

        self.pairs.clear();
        for (slot, track) in self.slots.iter().enumerate() {
            if let Some(track) = track {
                for (index, candidate) in candidates.iter().enumerate() {
                    if let Some(distance) = track.gate(candidate) {
                        self.pairs.push((distance, slot, index));
                    }
                }
            }
        }
        self.pairs
            .sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        self.taken.clear();
        self.taken.resize(candidates.len(), false);
        let mut updated = [false; MAX_TRACKS];
        for &(_, slot, index) in &self.pairs {
            if updated[slot] || self.taken[index] {
                continue;
            }
            if let Some(track) = self.slots[slot].as_mut() {
                track.filter.update(&candidates[index])?;
                track.hits += 1;
                track.misses = 0;
                if track.hits >= CONFIRM_HITS {
                    track.state = TrackState::Confirmed;
                }
                updated[slot] = true;
                self.taken[index] = true;
            }
        }

        for (slot, updated) in self.slots.iter_mut().zip(updated) {
            if updated {
                continue;
            }
            let close = match slot.as_mut() {
                Some(track) => {
                    track.misses += 1;
                    if track.state == TrackState::Confirmed {
                        track.state = TrackState::Coasting;
                    }
                    track.state == TrackState::Tentative || track.misses >= MAX_MISSES
                }
                None => false,
            };
            if close {
                *slot = None;
            }
        }

        for (index, candidate) in candidates.iter().enumerate() {
            if self.taken[index] || !candidate.moving {
                continue;
            }
            let Some(free) = self.slots.iter_mut().find(|s| s.is_none()) else {
                break;
            };
            *free = Some(Track {
                id: self.next_id,
                state: TrackState::Tentative,
                filter: KalmanFilter::new(candidate),
                hits: 1,
                misses: 0,
            });
            self.next_id = self.next_id % i32::MAX + 1;
            self.taken[index] = true;
        }

        let mut rows = [TrackRow::INVALID; MAX_TRACKS];
        for (row, slot) in rows.iter_mut().zip(&self.slots) {
            if let Some(track) = slot {
                *row = track.row();
            }
        }
        Ok(rows)
    }

    pub fn reset(&mut self) {
        self.slots = Default::default();
    }
}
