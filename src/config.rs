use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::pose::CoordinateSpace;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("smoothing_alpha must be in (0, 1], got {0}")]
    SmoothingAlpha(f32),
    #[error("scale must be a positive finite number, got {0}")]
    Scale(f32),
    #[error("{name} must be finite")]
    NotFinite { name: &'static str },
    #[error("bone_axis must not be zero-length")]
    ZeroBoneAxis,
    #[error("{name} must be in [0, 1], got {value}")]
    Confidence { name: &'static str, value: f32 },
    #[error("num_poses must be at least 1")]
    NumPoses,
    #[error("target_fps must be at least 1")]
    TargetFps,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub retarget: RetargetConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetargetConfig {
    /// EMA係数 (0 < alpha <= 1)。小さいほど滑らかだが遅れる
    #[serde(default = "default_smoothing_alpha")]
    pub smoothing_alpha: f32,
    /// ランドマーク座標 → シーン座標の一様スケール
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// スケルトン全体の平行移動
    #[serde(default)]
    pub root_offset: [f32; 3],
    /// X軸反転（セルフィー表示のカメラ用）。位置のみに効き、回転と左右のボーン割り当ては変えない
    #[serde(default)]
    pub mirror_x: bool,
    /// 首から頭への鉛直方向の外挿量（シーン単位）
    #[serde(default = "default_head_offset")]
    pub head_offset: f32,
    /// これ未満のvisibilityのランドマークは欠損扱い
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f32,
    #[serde(default)]
    pub coordinate_space: CoordinateSpace,
    /// 上腿の回転も出力する
    #[serde(default)]
    pub enable_legs: bool,
    /// リグの腰の初期位置を基準に相対配置する
    #[serde(default = "default_anchor_to_rig")]
    pub anchor_to_rig: bool,
    /// 回転前のボーンの向き
    #[serde(default = "default_bone_axis")]
    pub bone_axis: [f32; 3],
}

fn default_smoothing_alpha() -> f32 { 0.1 }
fn default_scale() -> f32 { 2.0 }
fn default_head_offset() -> f32 { 0.1 }
fn default_min_visibility() -> f32 { 0.5 }
fn default_anchor_to_rig() -> bool { true }
fn default_bone_axis() -> [f32; 3] { [0.0, 1.0, 0.0] }

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: default_smoothing_alpha(),
            scale: default_scale(),
            root_offset: [0.0; 3],
            mirror_x: false,
            head_offset: default_head_offset(),
            min_visibility: default_min_visibility(),
            coordinate_space: CoordinateSpace::default(),
            enable_legs: false,
            anchor_to_rig: default_anchor_to_rig(),
            bone_axis: default_bone_axis(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// 検出モデルのアセットパス
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// 記録済みランドマーク (JSON Lines)
    #[serde(default)]
    pub replay_path: Option<PathBuf>,
    #[serde(default = "default_num_poses")]
    pub num_poses: usize,
    /// 以下3つはML推論バックエンドにそのまま渡す閾値。記録再生では使わない
    #[serde(default = "default_confidence")]
    pub min_pose_detection_confidence: f32,
    #[serde(default = "default_confidence")]
    pub min_pose_presence_confidence: f32,
    #[serde(default = "default_confidence")]
    pub min_tracking_confidence: f32,
}

fn default_model_path() -> PathBuf { PathBuf::from("models/pose_landmarker_full.task") }
fn default_num_poses() -> usize { 1 }
fn default_confidence() -> f32 { 0.9 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            replay_path: None,
            num_poses: default_num_poses(),
            min_pose_detection_confidence: default_confidence(),
            min_pose_presence_confidence: default_confidence(),
            min_tracking_confidence: default_confidence(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
}

fn default_target_fps() -> u32 { 30 }

impl Default for AppConfig {
    fn default() -> Self {
        Self { target_fps: default_target_fps() }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 読み込めなければデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retarget.validate()?;
        self.detector.validate()?;
        if self.app.target_fps == 0 {
            return Err(ConfigError::TargetFps);
        }
        Ok(())
    }
}

impl RetargetConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let alpha = self.smoothing_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::SmoothingAlpha(alpha));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::Scale(self.scale));
        }
        if !self.root_offset.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::NotFinite { name: "root_offset" });
        }
        if !self.head_offset.is_finite() {
            return Err(ConfigError::NotFinite { name: "head_offset" });
        }
        if !self.bone_axis.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::NotFinite { name: "bone_axis" });
        }
        if self.bone_axis.iter().all(|v| *v == 0.0) {
            return Err(ConfigError::ZeroBoneAxis);
        }
        check_unit("min_visibility", self.min_visibility)
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_poses == 0 {
            return Err(ConfigError::NumPoses);
        }
        check_unit("min_pose_detection_confidence", self.min_pose_detection_confidence)?;
        check_unit("min_pose_presence_confidence", self.min_pose_presence_confidence)?;
        check_unit("min_tracking_confidence", self.min_tracking_confidence)
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Confidence { name, value })
    }
}
