use serde::Serialize;
use std::collections::BTreeMap;

use super::bone::BoneId;

/// 単一ボーンの変換。None の成分は変更しない
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoneTransform {
    /// 回転 (クォータニオン: x, y, z, w)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    /// 位置 (x, y, z)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
}

impl BoneTransform {
    pub fn rotation(rotation: [f32; 4]) -> Self {
        Self { rotation: Some(rotation), position: None }
    }

    pub fn position(position: [f32; 3]) -> Self {
        Self { rotation: None, position: Some(position) }
    }
}

/// 1フレーム分のボーン変換。含まれないボーンはそのまま
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PoseUpdate {
    bones: BTreeMap<BoneId, BoneTransform>,
}

impl PoseUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn get(&self, bone: BoneId) -> Option<&BoneTransform> {
        self.bones.get(&bone)
    }

    pub fn contains(&self, bone: BoneId) -> bool {
        self.bones.contains_key(&bone)
    }

    pub fn set(&mut self, bone: BoneId, transform: BoneTransform) {
        self.bones.insert(bone, transform);
    }

    pub fn iter(&self) -> impl Iterator<Item = (BoneId, &BoneTransform)> {
        self.bones.iter().map(|(bone, t)| (*bone, t))
    }
}
