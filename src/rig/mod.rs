pub mod bone;
pub mod sink;
pub mod update;

pub use bone::BoneId;
pub use sink::{BoneNode, JsonLinesSink, RigSink, Skeleton};
pub use update::{BoneTransform, PoseUpdate};
