use tracing::trace;

use super::mapper::CoordinateMapper;
use super::quat::{bone_direction, DEFAULT_BONE_AXIS};
use super::smooth::{SmoothedFrame, SmoothedPose};
use crate::config::RetargetConfig;
use crate::pose::{Landmark, LandmarkIndex};
use crate::rig::{BoneId, BoneTransform, PoseUpdate};

/// 2ランドマーク間の方向からボーン回転を求めるルール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRule {
    pub bone: BoneId,
    /// 近位関節
    pub from: LandmarkIndex,
    /// 遠位関節
    pub to: LandmarkIndex,
}

pub const ARM_SEGMENTS: [SegmentRule; 2] = [
    SegmentRule {
        bone: BoneId::LeftUpperArm,
        from: LandmarkIndex::LeftShoulder,
        to: LandmarkIndex::LeftElbow,
    },
    SegmentRule {
        bone: BoneId::RightUpperArm,
        from: LandmarkIndex::RightShoulder,
        to: LandmarkIndex::RightElbow,
    },
];

pub const LEG_SEGMENTS: [SegmentRule; 2] = [
    SegmentRule {
        bone: BoneId::LeftUpperLeg,
        from: LandmarkIndex::LeftHip,
        to: LandmarkIndex::LeftKnee,
    },
    SegmentRule {
        bone: BoneId::RightUpperLeg,
        from: LandmarkIndex::RightHip,
        to: LandmarkIndex::RightKnee,
    },
];

pub const DEFAULT_HEAD_OFFSET: f32 = 0.1;

/// 平滑化済みランドマーク → ボーン変換
///
/// - Hips: 左右腰の中点の位置
/// - Spine: 腰中点 → 肩中点の方向の回転
/// - Neck: 鼻の位置
/// - Head: 首から鉛直方向に head_offset だけ外挿した位置 (顔の向きは推定しない)
/// - 上腕 / 上腿: 近位 → 遠位関節の方向の回転
///
/// 前腕・下腿・手・足は書き込まない。
pub struct Retargeter {
    mapper: CoordinateMapper,
    head_offset: f32,
    bone_axis: [f32; 3],
    segments: Vec<SegmentRule>,
}

impl Retargeter {
    pub fn new(mapper: CoordinateMapper) -> Self {
        Self {
            mapper,
            head_offset: DEFAULT_HEAD_OFFSET,
            bone_axis: DEFAULT_BONE_AXIS,
            segments: ARM_SEGMENTS.to_vec(),
        }
    }

    pub fn from_config(config: &RetargetConfig) -> Self {
        Self::new(CoordinateMapper::from_config(config))
            .with_head_offset(config.head_offset)
            .with_bone_axis(config.bone_axis)
            .with_legs(config.enable_legs)
    }

    pub fn with_head_offset(mut self, head_offset: f32) -> Self {
        self.head_offset = head_offset;
        self
    }

    pub fn with_bone_axis(mut self, bone_axis: [f32; 3]) -> Self {
        self.bone_axis = bone_axis;
        self
    }

    pub fn with_legs(mut self, enabled: bool) -> Self {
        self.segments.retain(|rule| !LEG_SEGMENTS.contains(rule));
        if enabled {
            self.segments.extend_from_slice(&LEG_SEGMENTS);
        }
        self
    }

    pub fn segments(&self) -> &[SegmentRule] {
        &self.segments
    }

    /// `anchor`: リグの腰の基準位置。位置出力はこれに対する相対になる
    ///
    /// 複数人いる場合は先頭のポーズだけを使う。人をまたいでボーンを合成しない。
    pub fn retarget(&self, frame: &SmoothedFrame, anchor: Option<[f32; 3]>) -> PoseUpdate {
        let mut update = PoseUpdate::new();
        let Some(pose) = frame.poses().first() else {
            return update;
        };
        if frame.poses().len() > 1 {
            trace!(poses = frame.poses().len(), "using first pose only");
        }
        self.retarget_pose(pose, anchor.unwrap_or([0.0; 3]), &mut update);
        update
    }

    /// 非有限になる位置は None
    fn place(&self, landmark: &Landmark, anchor: [f32; 3]) -> Option<[f32; 3]> {
        let [x, y, z] = self.mapper.map(landmark.position());
        finite([x + anchor[0], y + anchor[1], z + anchor[2]])
    }

    fn retarget_pose(&self, pose: &SmoothedPose, anchor: [f32; 3], update: &mut PoseUpdate) {
        use LandmarkIndex::*;

        let hips = midpoint(pose, LeftHip, RightHip);
        match hips.as_ref().and_then(|hips| self.place(hips, anchor)) {
            Some(position) => update.set(BoneId::Hips, BoneTransform::position(position)),
            None => trace!(pose = pose.index(), "hips not visible"),
        }

        // 回転はスケール・オフセットに依存しないので生の差分で計算
        let shoulders = midpoint(pose, LeftShoulder, RightShoulder);
        if let (Some(hips), Some(shoulders)) = (&hips, &shoulders) {
            let rotation = bone_direction(hips.position(), shoulders.position(), self.bone_axis);
            update.set(BoneId::Spine, BoneTransform::rotation(rotation));
        }

        match pose.get(Nose).and_then(|nose| self.place(nose, anchor)) {
            Some(neck) => {
                update.set(BoneId::Neck, BoneTransform::position(neck));
                if let Some(head) = finite([neck[0], neck[1] + self.head_offset, neck[2]]) {
                    update.set(BoneId::Head, BoneTransform::position(head));
                }
            }
            None => trace!(pose = pose.index(), "nose not visible, neck and head skipped"),
        }

        for rule in &self.segments {
            let (Some(from), Some(to)) = (pose.get(rule.from), pose.get(rule.to)) else {
                trace!(pose = pose.index(), bone = %rule.bone, "segment not visible");
                continue;
            };
            let rotation = bone_direction(from.position(), to.position(), self.bone_axis);
            update.set(rule.bone, BoneTransform::rotation(rotation));
        }
    }
}

fn finite(position: [f32; 3]) -> Option<[f32; 3]> {
    position.iter().all(|v| v.is_finite()).then_some(position)
}

fn midpoint(pose: &SmoothedPose, left: LandmarkIndex, right: LandmarkIndex) -> Option<Landmark> {
    Some(pose.get(left)?.midpoint(pose.get(right)?))
}

impl Default for Retargeter {
    fn default() -> Self {
        Self::from_config(&RetargetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Pose;
    use crate::retarget::quat::IDENTITY;
    use crate::retarget::Smoother;

    fn make_pose(points: &[(LandmarkIndex, [f32; 3])]) -> Pose {
        let mut landmarks = vec![Landmark::new(0.0, 0.0, 0.0, 0.0); LandmarkIndex::COUNT];
        for (index, [x, y, z]) in points {
            landmarks[*index as usize] = Landmark::new(*x, *y, *z, 1.0);
        }
        Pose::new(landmarks)
    }

    fn upper_body() -> Vec<(LandmarkIndex, [f32; 3])> {
        use LandmarkIndex::*;
        vec![
            (Nose, [0.0, -0.6, 0.0]),
            (LeftShoulder, [-1.0, -0.4, 0.0]),
            (RightShoulder, [1.0, -0.4, 0.0]),
            (LeftElbow, [-2.0, -0.4, 0.0]),
            (RightElbow, [1.0, 0.0, 0.0]),
            (LeftHip, [-1.0, 0.0, 0.0]),
            (RightHip, [1.0, 0.0, 0.0]),
            (LeftKnee, [-1.0, 0.5, 0.0]),
            (RightKnee, [1.0, 0.5, 0.0]),
            (LeftWrist, [-3.0, -0.4, 0.0]),
        ]
    }

    fn frame(poses: &[Pose]) -> SmoothedFrame {
        Smoother::new(1.0).smooth_frame(poses, 0.5)
    }

    fn unit_mapper() -> Retargeter {
        Retargeter::new(CoordinateMapper::new(1.0, [0.0; 3]))
    }

    fn approx_eq(a: &[f32], b: &[f32]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn test_empty_frame_empty_update() {
        let update = unit_mapper().retarget(&frame(&[]), None);
        assert!(update.is_empty());
        let update = unit_mapper().retarget(&frame(&[Pose::default()]), None);
        assert!(update.is_empty());
    }

    #[test]
    fn test_hips_midpoint() {
        let pose = make_pose(&[
            (LandmarkIndex::LeftHip, [-1.0, 0.0, 0.0]),
            (LandmarkIndex::RightHip, [1.0, 0.0, 0.0]),
        ]);
        let update = unit_mapper().retarget(&frame(&[pose]), None);
        assert_eq!(update.get(BoneId::Hips).unwrap().position, Some([0.0, 0.0, 0.0]));
        assert_eq!(update.get(BoneId::Hips).unwrap().rotation, None);
        assert!(!update.contains(BoneId::Spine));
    }

    #[test]
    fn test_missing_nose_skips_neck_and_head_only() {
        let points: Vec<_> = upper_body()
            .into_iter()
            .filter(|(i, _)| *i != LandmarkIndex::Nose)
            .collect();
        let update = unit_mapper().retarget(&frame(&[make_pose(&points)]), None);
        assert!(!update.contains(BoneId::Neck));
        assert!(!update.contains(BoneId::Head));
        assert!(update.contains(BoneId::Hips));
        assert!(update.contains(BoneId::Spine));
        assert!(update.contains(BoneId::LeftUpperArm));
    }

    #[test]
    fn test_spine_rotation_follows_shoulders() {
        let update = unit_mapper().retarget(&frame(&[make_pose(&upper_body())]), None);
        // 腰中点 (0,0,0) → 肩中点 (0,-0.4,0): 生座標のY下向き → 半回転
        let rotation = update.get(BoneId::Spine).unwrap().rotation.unwrap();
        assert!(rotation[3].abs() < 1e-6);

        let upright = Retargeter::new(CoordinateMapper::new(1.0, [0.0; 3]))
            .with_bone_axis([0.0, -1.0, 0.0])
            .retarget(&frame(&[make_pose(&upper_body())]), None);
        let rotation = upright.get(BoneId::Spine).unwrap().rotation.unwrap();
        assert!(approx_eq(&rotation, &IDENTITY));
    }

    #[test]
    fn test_spine_needs_both_shoulders() {
        let points: Vec<_> = upper_body()
            .into_iter()
            .filter(|(i, _)| *i != LandmarkIndex::RightShoulder)
            .collect();
        let update = unit_mapper().retarget(&frame(&[make_pose(&points)]), None);
        assert!(update.contains(BoneId::Hips));
        assert!(!update.contains(BoneId::Spine));
        assert!(!update.contains(BoneId::RightUpperArm));
        assert!(update.contains(BoneId::LeftUpperArm));
    }

    #[test]
    fn test_neck_and_head_positions() {
        let retargeter = Retargeter::new(CoordinateMapper::new(2.0, [0.0; 3])).with_head_offset(0.1);
        let update = retargeter.retarget(&frame(&[make_pose(&upper_body())]), None);
        let neck = update.get(BoneId::Neck).unwrap().position.unwrap();
        let head = update.get(BoneId::Head).unwrap().position.unwrap();
        assert!(approx_eq(&neck, &[0.0, 1.2, 0.0]));
        assert!(approx_eq(&head, &[0.0, 1.3, 0.0]));
    }

    #[test]
    fn test_upper_arm_rotation() {
        let update = unit_mapper().retarget(&frame(&[make_pose(&upper_body())]), None);
        // 右肩 (1,-0.4,0) → 右肘 (1,0,0): +Y方向 → 無回転
        let right = update.get(BoneId::RightUpperArm).unwrap().rotation.unwrap();
        assert!(approx_eq(&right, &IDENTITY));
        // 左肩 → 左肘: -X方向 → Z軸まわり+90度
        let left = update.get(BoneId::LeftUpperArm).unwrap().rotation.unwrap();
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!(approx_eq(&left, &[0.0, 0.0, h, h]), "{:?}", left);
    }

    #[test]
    fn test_anchor_offsets_positions() {
        let update = unit_mapper().retarget(&frame(&[make_pose(&upper_body())]), Some([0.0, 1.0, 0.5]));
        assert!(approx_eq(&update.get(BoneId::Hips).unwrap().position.unwrap(), &[0.0, 1.0, 0.5]));
        assert!(approx_eq(&update.get(BoneId::Neck).unwrap().position.unwrap(), &[0.0, 1.6, 0.5]));
        // 回転はアンカーの影響を受けない
        let plain = unit_mapper().retarget(&frame(&[make_pose(&upper_body())]), None);
        assert_eq!(update.get(BoneId::Spine), plain.get(BoneId::Spine));
    }

    #[test]
    fn test_legs_disabled_by_default() {
        let update = unit_mapper().retarget(&frame(&[make_pose(&upper_body())]), None);
        assert!(!update.contains(BoneId::LeftUpperLeg));
        assert!(!update.contains(BoneId::RightUpperLeg));

        let with_legs = unit_mapper().with_legs(true);
        let update = with_legs.retarget(&frame(&[make_pose(&upper_body())]), None);
        // 腰 → 膝は +Y方向
        let left_leg = update.get(BoneId::LeftUpperLeg).unwrap().rotation.unwrap();
        assert!(approx_eq(&left_leg, &IDENTITY));
        assert!(update.contains(BoneId::RightUpperLeg));

        assert_eq!(with_legs.with_legs(false).segments(), &ARM_SEGMENTS);
    }

    #[test]
    fn test_only_supported_bones_written() {
        let retargeter = unit_mapper().with_legs(true);
        let update = retargeter.retarget(&frame(&[make_pose(&upper_body())]), None);
        assert!(!update.contains(BoneId::LeftLowerArm));
        assert!(!update.contains(BoneId::LeftHand));
        for (bone, _) in update.iter() {
            assert!(bone.is_supported(), "{} is not supported", bone);
        }
        assert_eq!(update.len(), BoneId::SUPPORTED.len());
    }

    #[test]
    fn test_only_first_pose_used() {
        use LandmarkIndex::*;
        let first = make_pose(&[(LeftHip, [-1.0, 0.0, 0.0]), (RightHip, [1.0, 0.0, 0.0])]);
        let second = make_pose(&[
            (LeftHip, [2.0, 0.0, 0.0]),
            (RightHip, [4.0, 0.0, 0.0]),
            (Nose, [10.0, -1.0, 0.0]),
            (LeftShoulder, [2.0, -0.5, 0.0]),
            (LeftElbow, [1.0, -0.5, 0.0]),
        ]);
        let update = unit_mapper().retarget(&frame(&[first, second]), None);
        assert_eq!(update.get(BoneId::Hips).unwrap().position, Some([0.0, 0.0, 0.0]));
        // 1人目にないボーンは2人目から補わない
        assert!(!update.contains(BoneId::Neck));
        assert!(!update.contains(BoneId::Head));
        assert!(!update.contains(BoneId::LeftUpperArm));
        assert_eq!(update.len(), 1);
    }

    #[test]
    fn test_large_hips_stay_finite() {
        let pose = make_pose(&[
            (LandmarkIndex::LeftHip, [3.0e38, 0.0, 0.0]),
            (LandmarkIndex::RightHip, [3.0e38, 0.0, 0.0]),
        ]);
        let update = unit_mapper().retarget(&frame(&[pose.clone()]), None);
        let hips = update.get(BoneId::Hips).unwrap().position.unwrap();
        assert!(hips.iter().all(|v| v.is_finite()), "{:?}", hips);

        // スケール後に溢れる位置は出力しない
        let doubled = Retargeter::new(CoordinateMapper::new(2.0, [0.0; 3]));
        let update = doubled.retarget(&frame(&[pose]), None);
        assert!(!update.contains(BoneId::Hips));
    }

    #[test]
    fn test_overflowing_neck_skipped() {
        let pose = make_pose(&[(LandmarkIndex::Nose, [0.0, -3.0e38, 0.0])]);
        let retargeter = Retargeter::new(CoordinateMapper::new(2.0, [0.0; 3]));
        let update = retargeter.retarget(&frame(&[pose]), None);
        assert!(!update.contains(BoneId::Neck));
        assert!(!update.contains(BoneId::Head));
    }

    #[test]
    fn test_mirror_x_moves_positions_only() {
        let pose = make_pose(&upper_body());
        let plain = unit_mapper().retarget(&frame(&[pose.clone()]), None);
        let mirrored = Retargeter::new(CoordinateMapper::new(1.0, [0.0; 3]).with_mirror_x(true))
            .retarget(&frame(&[pose]), None);

        let neck = plain.get(BoneId::Neck).unwrap().position.unwrap();
        let mirrored_neck = mirrored.get(BoneId::Neck).unwrap().position.unwrap();
        assert!(approx_eq(&mirrored_neck, &[-neck[0], neck[1], neck[2]]));
        // 回転と左右のボーン割り当てはそのまま
        for bone in [BoneId::Spine, BoneId::LeftUpperArm, BoneId::RightUpperArm] {
            assert_eq!(plain.get(bone), mirrored.get(bone), "{}", bone);
        }
    }

    #[test]
    fn test_segment_bones_follow_hierarchy() {
        for rule in ARM_SEGMENTS.iter().chain(LEG_SEGMENTS.iter()) {
            assert!(rule.bone.is_supported());
            assert!(rule.bone.parent().is_some());
        }
    }
}
