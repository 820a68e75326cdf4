pub mod config;
pub mod pipeline;
pub mod pose;
pub mod retarget;
pub mod rig;
