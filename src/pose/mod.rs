pub mod landmark;
pub mod landmarker;
pub mod replay;

pub use landmark::{CoordinateSpace, Landmark, LandmarkIndex, LandmarkerResult, Pose};
pub use landmarker::{LandmarkBackend, Landmarker};
pub use replay::ReplayBackend;
