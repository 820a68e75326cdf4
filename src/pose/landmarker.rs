use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::landmark::LandmarkerResult;
use crate::config::DetectorConfig;

/// ランドマーク検出器の実体 (ML推論、記録再生など)
pub trait LandmarkBackend: Sized {
    /// 検出器を初期化
    fn open(config: &DetectorConfig) -> Result<Self>;

    /// 1フレーム分を検出
    fn detect(&mut self, timestamp: Duration) -> Result<LandmarkerResult>;

    fn close(&mut self) {}

    /// これ以上フレームを生成しない
    fn is_exhausted(&self) -> bool {
        false
    }
}

enum State<B> {
    Pending,
    Ready(B),
    Closed,
}

/// 検出器のライフサイクル管理
///
/// 初期化前・終了後・検出失敗はいずれも「検出なし」として扱い、
/// 呼び出し側は空フレームとして処理を続ける。
pub struct Landmarker<B: LandmarkBackend> {
    config: DetectorConfig,
    state: State<B>,
    init_attempts: u32,
}

impl<B: LandmarkBackend> Landmarker<B> {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: State::Pending,
            init_attempts: 0,
        }
    }

    /// 初期化済みのバックエンドから作成
    pub fn with_backend(config: DetectorConfig, backend: B) -> Self {
        Self {
            config,
            state: State::Ready(backend),
            init_attempts: 0,
        }
    }

    pub fn initialize(&mut self) -> bool {
        match self.state {
            State::Ready(_) => {
                debug!("Landmarker already initialized");
                return true;
            }
            State::Closed => {
                warn!("Landmarker is closed, not reinitializing");
                return false;
            }
            State::Pending => {}
        }

        self.init_attempts += 1;
        match B::open(&self.config) {
            Ok(backend) => {
                info!(
                    num_poses = self.config.num_poses,
                    model = %self.config.model_path.display(),
                    detection = self.config.min_pose_detection_confidence,
                    presence = self.config.min_pose_presence_confidence,
                    tracking = self.config.min_tracking_confidence,
                    "Landmarker initialized"
                );
                self.state = State::Ready(backend);
                self.init_attempts = 0;
                true
            }
            Err(e) => {
                warn!("Landmarker initialization failed (attempt {}): {:#}", self.init_attempts, e);
                false
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn is_exhausted(&self) -> bool {
        match &self.state {
            State::Ready(backend) => backend.is_exhausted(),
            State::Closed => true,
            State::Pending => false,
        }
    }

    pub fn init_attempts(&self) -> u32 {
        self.init_attempts
    }

    /// 検出できない場合は None (リトライなし)
    pub fn detect(&mut self, timestamp: Duration) -> Option<LandmarkerResult> {
        let State::Ready(backend) = &mut self.state else {
            return None;
        };
        match backend.detect(timestamp) {
            Ok(mut result) => {
                result.truncate(self.config.num_poses);
                Some(result)
            }
            Err(e) => {
                warn!("Landmark detection failed: {:#}", e);
                None
            }
        }
    }

    pub fn close(&mut self) {
        if let State::Ready(mut backend) = std::mem::replace(&mut self.state, State::Closed) {
            backend.close();
            info!("Landmarker closed");
        }
    }
}

impl<B: LandmarkBackend> Drop for Landmarker<B> {
    fn drop(&mut self) {
        self.close();
    }
}
