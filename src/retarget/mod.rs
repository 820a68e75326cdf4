pub mod engine;
pub mod mapper;
pub mod quat;
pub mod smooth;

pub use engine::{Retargeter, SegmentRule, ARM_SEGMENTS, LEG_SEGMENTS};
pub use mapper::CoordinateMapper;
pub use quat::bone_direction;
pub use smooth::{SmoothKey, SmoothedFrame, SmoothedPose, Smoother};
