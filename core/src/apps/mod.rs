//! Scene interpretation on top of the radar blocks.

pub mod motion_angle;
pub mod presence;
pub mod segmentation;
pub(crate) mod spectrum;

pub use motion_angle::{MotionAngle, MotionAngleConfig, MotionAngleMode, MotionAngleResult};
pub use presence::{PresenceConfig, PresenceResult, PresenceSensing, PresenceState};
pub use segmentation::{
    Orientation, Segmentation, SegmentationConfig, SegmentationMode, SegmentationResult, TrackRow,
};
