use std::time::Duration;
use tracing::debug;

use crate::config::RetargetConfig;
use crate::pose::{CoordinateSpace, LandmarkBackend, Landmarker};
use crate::retarget::{Retargeter, Smoother};
use crate::rig::{BoneId, PoseUpdate, RigSink};

/// 1フレームごとに 検出 → 平滑化 → リターゲット → リグ適用 を行う
pub struct FrameDriver<B: LandmarkBackend, S: RigSink> {
    landmarker: Landmarker<B>,
    smoother: Smoother,
    retargeter: Retargeter,
    sink: S,
    space: CoordinateSpace,
    min_visibility: f32,
    anchor_to_rig: bool,
    frames: u64,
    tracked_frames: u64,
}

impl<B: LandmarkBackend, S: RigSink> FrameDriver<B, S> {
    pub fn new(config: &RetargetConfig, landmarker: Landmarker<B>, sink: S) -> Self {
        Self {
            landmarker,
            smoother: Smoother::from_config(config),
            retargeter: Retargeter::from_config(config),
            sink,
            space: config.coordinate_space,
            min_visibility: config.min_visibility,
            anchor_to_rig: config.anchor_to_rig,
            frames: 0,
            tracked_frames: 0,
        }
    }

    pub fn tick(&mut self, timestamp: Duration) -> PoseUpdate {
        self.frames += 1;
        let result = self.landmarker.detect(timestamp).unwrap_or_default();
        let smoothed = self
            .smoother
            .smooth_frame(result.poses(self.space), self.min_visibility);

        let anchor = if self.anchor_to_rig {
            self.sink.rest_position(BoneId::Hips)
        } else {
            None
        };
        let update = self.retargeter.retarget(&smoothed, anchor);
        if update.is_empty() {
            debug!(frame = self.frames, "no pose, rig holds last pose");
        } else {
            self.tracked_frames += 1;
        }
        self.sink.apply(&update);
        update
    }

    pub fn is_finished(&self) -> bool {
        self.landmarker.is_exhausted()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// 1本以上のボーンを出力したフレーム数
    pub fn tracked_frames(&self) -> u64 {
        self.tracked_frames
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn close(&mut self) {
        self.landmarker.close();
    }
}
