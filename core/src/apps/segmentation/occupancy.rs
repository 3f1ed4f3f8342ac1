//! Debounced occupancy of the fixed angular segments.

use crate::prelude::Float;

pub const NUM_SEGMENTS: usize = 6;
pub const SEGMENT_WIDTH_DEG: Float = 20.0;
pub const MIN_ANGLE_DEG: Float = -60.0;
pub const MAX_ANGLE_DEG: Float = MIN_ANGLE_DEG + NUM_SEGMENTS as Float * SEGMENT_WIDTH_DEG;

/// Consecutive frames needed to switch a segment on or off.
pub const HYSTERESIS_FRAMES: usize = 3;

/// Segment containing `angle_deg`; angles outside the field of view fall
/// into the outermost segments.
pub fn segment_of(angle_deg: Float) -> usize {
    let index = ((angle_deg - MIN_ANGLE_DEG) / SEGMENT_WIDTH_DEG).floor();
    index.clamp(0.0, (NUM_SEGMENTS - 1) as Float) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct SegmentState {
    active: bool,
    occupied_frames: usize,
    empty_frames: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentOccupancy {
    segments: [SegmentState; NUM_SEGMENTS],
}

impl SegmentOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, segment: usize) -> bool {
        self.segments.get(segment).map_or(false, |s| s.active)
    }

    /// Feeds the raw occupancy of one frame and returns the debounced
    /// segments as `0.0` / `1.0`.
    pub fn step(&mut self, occupied: [bool; NUM_SEGMENTS]) -> [Float; NUM_SEGMENTS] {
        let mut out = [0.0; NUM_SEGMENTS];
        for ((state, occupied), out) in self.segments.iter_mut().zip(occupied).zip(out.iter_mut()) {
            if occupied {
                state.occupied_frames += 1;
                state.empty_frames = 0;
            } else {
                state.empty_frames += 1;
                state.occupied_frames = 0;
            }
            if !state.active && state.occupied_frames >= HYSTERESIS_FRAMES {
                state.active = true;
            } else if state.active && state.empty_frames >= HYSTERESIS_FRAMES {
                state.active = false;
            }
            *out = if state.active { 1.0 } else { 0.0 };
        }
        out
    }

    pub fn reset(&mut self) {
        self.segments = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(segment: usize) -> [bool; NUM_SEGMENTS] {
        let mut occupied = [false; NUM_SEGMENTS];
        occupied[segment] = true;
        occupied
    }

    #[test]
    fn angles_map_to_segments() {
        assert_eq!(segment_of(-60.0), 0);
        assert_eq!(segment_of(-40.1), 0);
        assert_eq!(segment_of(-0.5), 2);
        assert_eq!(segment_of(0.0), 3);
        assert_eq!(segment_of(59.9), 5);
        assert_eq!(segment_of(75.0), 5);
        assert_eq!(segment_of(-90.0), 0);
        assert_eq!(MAX_ANGLE_DEG, 60.0);
    }

    #[test]
    fn single_frame_does_not_activate() {
        let mut occupancy = SegmentOccupancy::new();
        let empty = [false; NUM_SEGMENTS];
        for _ in 0..5 {
            occupancy.step(empty);
        }
        assert_eq!(occupancy.step(only(1)), [0.0; NUM_SEGMENTS]);
        for _ in 0..5 {
            assert_eq!(occupancy.step(empty), [0.0; NUM_SEGMENTS]);
        }
        occupancy.step(only(1));
        occupancy.step(only(1));
        assert!(!occupancy.is_active(1));
        let segments = occupancy.step(only(1));
        assert_eq!(segments[1], 1.0);
        assert!(occupancy.is_active(1));
    }

    #[test]
    fn deactivation_needs_consecutive_empty_frames() {
        let mut occupancy = SegmentOccupancy::new();
        for _ in 0..HYSTERESIS_FRAMES {
            occupancy.step(only(4));
        }
        let empty = [false; NUM_SEGMENTS];
        assert_eq!(occupancy.step(empty)[4], 1.0);
        assert_eq!(occupancy.step(only(4))[4], 1.0);
        assert_eq!(occupancy.step(empty)[4], 1.0);
        assert_eq!(occupancy.step(empty)[4], 1.0);
        assert_eq!(occupancy.step(empty)[4], 0.0);
        occupancy.reset();
        assert!(!occupancy.is_active(4));
    }
}
