use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, warn};

use super::bone::BoneId;
use super::update::PoseUpdate;

/// ポーズ更新の適用先 (アバターのスケルトン)
pub trait RigSink {
    /// 含まれるボーンだけを更新する。空の更新は何もしない
    fn apply(&mut self, update: &PoseUpdate);

    /// ボーンの初期位置 (リターゲットの基準点)
    fn rest_position(&self, _bone: BoneId) -> Option<[f32; 3]> {
        None
    }
}

/// ボーンノードの現在のローカル変換
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneNode {
    pub rest_position: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl BoneNode {
    fn at_rest(rest_position: [f32; 3]) -> Self {
        Self {
            rest_position,
            position: rest_position,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// メモリ上のヒューマノイドスケルトン
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: BTreeMap<BoneId, BoneNode>,
}

impl Skeleton {
    /// 全ボーンを原点・無回転で作成
    pub fn humanoid() -> Self {
        let bones = BoneId::ALL
            .iter()
            .map(|bone| (*bone, BoneNode::at_rest([0.0; 3])))
            .collect();
        Self { bones }
    }

    pub fn with_rest_position(mut self, bone: BoneId, position: [f32; 3]) -> Self {
        self.bones.insert(bone, BoneNode::at_rest(position));
        self
    }

    pub fn bone(&self, bone: BoneId) -> Option<&BoneNode> {
        self.bones.get(&bone)
    }

    /// 自身からルートまでのうち、このスケルトンに存在するボーン
    pub fn chain(&self, bone: BoneId) -> Vec<BoneId> {
        bone.chain().filter(|b| self.bones.contains_key(b)).collect()
    }
}

impl RigSink for Skeleton {
    fn apply(&mut self, update: &PoseUpdate) {
        for (bone, transform) in update.iter() {
            let Some(node) = self.bones.get_mut(&bone) else {
                debug!("Skeleton has no {} bone, skipping", bone);
                continue;
            };
            if let Some(rotation) = transform.rotation {
                node.rotation = rotation;
            }
            if let Some(position) = transform.position {
                node.position = position;
            }
        }
    }

    fn rest_position(&self, bone: BoneId) -> Option<[f32; 3]> {
        self.bones.get(&bone).map(|node| node.rest_position)
    }
}

/// 1フレーム1行の JSON (VRM pose 形式) を書き出す
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
    failures: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            failures: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, update: &PoseUpdate) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, update)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> RigSink for JsonLinesSink<W> {
    fn apply(&mut self, update: &PoseUpdate) {
        match self.write_line(update) {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.failures += 1;
                warn!("Failed to write pose update: {:#}", e);
            }
        }
    }
}
