use serde::{Deserialize, Serialize};

/// MediaPipe Pose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftInnerEye = 1,
    LeftEye = 2,
    LeftOuterEye = 3,
    RightInnerEye = 4,
    RightEye = 5,
    RightOuterEye = 6,
    LeftEar = 7,
    RightEar = 8,
    LeftMouth = 9,
    RightMouth = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;

    pub const ALL: [LandmarkIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftInnerEye,
        Self::LeftEye,
        Self::LeftOuterEye,
        Self::RightInnerEye,
        Self::RightEye,
        Self::RightOuterEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftMouth,
        Self::RightMouth,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

fn full_visibility() -> f32 {
    1.0
}

/// 単一ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// 可視度 (0.0〜1.0)。検出器が出力しない場合は 1.0
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// 座標が有限かつ可視度が閾値以上か
    pub fn is_usable(&self, min_visibility: f32) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && self.visibility >= min_visibility
    }

    /// 2点の中点。可視度は self のものを代表値として引き継ぐ
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark {
            x: self.x * 0.5 + other.x * 0.5,
            y: self.y * 0.5 + other.y * 0.5,
            z: self.z * 0.5 + other.z * 0.5,
            visibility: self.visibility,
        }
    }
}

/// 1人分のランドマーク列 (最大33点、インデックス順)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    pub landmarks: Vec<Landmark>,
}

impl Pose {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// 利用可能なランドマークを取得。範囲外・非有限・低可視度は None
    pub fn get(&self, index: LandmarkIndex, min_visibility: f32) -> Option<&Landmark> {
        self.landmarks
            .get(index as usize)
            .filter(|lm| lm.is_usable(min_visibility))
    }
}

/// どちらの座標系のランドマークを使うか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSpace {
    /// カメラ基準のメートル座標 (腰中心)
    #[default]
    World,
    /// 画像正規化座標 (0.0〜1.0, Y下向き)
    Normalized,
}

/// 1フレーム分の検出結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkerResult {
    #[serde(default)]
    pub landmarks: Vec<Pose>,
    #[serde(default)]
    pub world_landmarks: Vec<Pose>,
}

impl LandmarkerResult {
    pub fn poses(&self, space: CoordinateSpace) -> &[Pose] {
        match space {
            CoordinateSpace::World => &self.world_landmarks,
            CoordinateSpace::Normalized => &self.landmarks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty() && self.world_landmarks.is_empty()
    }

    /// 検出人数を制限
    pub fn truncate(&mut self, num_poses: usize) {
        self.landmarks.truncate(num_poses);
        self.world_landmarks.truncate(num_poses);
    }
}
