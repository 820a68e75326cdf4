use std::collections::HashMap;
use tracing::trace;

use crate::config::RetargetConfig;
use crate::pose::{Landmark, LandmarkIndex, Pose};

/// 平滑化状態のキー: 何人目のポーズのどのランドマークか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmoothKey {
    pub pose: usize,
    pub landmark: LandmarkIndex,
}

impl SmoothKey {
    pub fn new(pose: usize, landmark: LandmarkIndex) -> Self {
        Self { pose, landmark }
    }
}

/// 平滑化済みの1人分のランドマーク。欠損は None
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedPose {
    index: usize,
    landmarks: [Option<Landmark>; LandmarkIndex::COUNT],
}

impl SmoothedPose {
    /// 検出結果内での順番
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, landmark: LandmarkIndex) -> Option<&Landmark> {
        self.landmarks[landmark as usize].as_ref()
    }
}

/// 平滑化済みフレーム。`Smoother` からのみ生成される
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothedFrame {
    poses: Vec<SmoothedPose>,
}

impl SmoothedFrame {
    pub fn poses(&self) -> &[SmoothedPose] {
        &self.poses
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// ランドマークごとのEMA
///
/// smoothed = alpha * new + (1 - alpha) * prev
/// 初回は入力をそのまま返す。状態はキー数 (33 × 人数) で上限があるためクリアしない。
#[derive(Debug, Clone)]
pub struct Smoother {
    alpha: f32,
    state: HashMap<SmoothKey, [f32; 3]>,
}

impl Smoother {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            state: HashMap::new(),
        }
    }

    pub fn from_config(config: &RetargetConfig) -> Self {
        Self::new(config.smoothing_alpha)
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// 追跡中のキー数
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn smooth(&mut self, key: SmoothKey, value: [f32; 3]) -> [f32; 3] {
        let a = self.alpha;
        let smoothed = match self.state.get(&key) {
            Some(prev) => [
                a * value[0] + (1.0 - a) * prev[0],
                a * value[1] + (1.0 - a) * prev[1],
                a * value[2] + (1.0 - a) * prev[2],
            ],
            None => {
                trace!(pose = key.pose, landmark = ?key.landmark, "first observation");
                value
            }
        };
        self.state.insert(key, smoothed);
        smoothed
    }

    /// 1フレーム分のポーズを平滑化
    ///
    /// 空のポーズは捨てる。利用できないランドマークは状態を更新せず欠損として残す。
    pub fn smooth_frame(&mut self, poses: &[Pose], min_visibility: f32) -> SmoothedFrame {
        let mut smoothed_poses = Vec::with_capacity(poses.len());
        for (pose_index, pose) in poses.iter().enumerate() {
            if pose.is_empty() {
                trace!(pose = pose_index, "empty pose skipped");
                continue;
            }
            let mut landmarks = [None; LandmarkIndex::COUNT];
            for index in LandmarkIndex::ALL {
                let Some(raw) = pose.get(index, min_visibility) else {
                    continue;
                };
                let [x, y, z] = self.smooth(SmoothKey::new(pose_index, index), raw.position());
                landmarks[index as usize] = Some(Landmark::new(x, y, z, raw.visibility));
            }
            smoothed_poses.push(SmoothedPose {
                index: pose_index,
                landmarks,
            });
        }
        SmoothedFrame {
            poses: smoothed_poses,
        }
    }
}

impl Default for Smoother {
    fn default() -> Self {
        Self::from_config(&RetargetConfig::default())
    }
}
