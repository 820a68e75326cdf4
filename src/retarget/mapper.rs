use crate::config::RetargetConfig;

/// ランドマーク座標 → シーン座標
///
/// ランドマークはY下向き、シーンはY上向きなのでYを反転する。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale: f32,
    root_offset: [f32; 3],
    mirror_x: bool,
}

impl CoordinateMapper {
    pub fn new(scale: f32, root_offset: [f32; 3]) -> Self {
        Self {
            scale,
            root_offset,
            mirror_x: false,
        }
    }

    pub fn from_config(config: &RetargetConfig) -> Self {
        Self::new(config.scale, config.root_offset).with_mirror_x(config.mirror_x)
    }

    pub fn with_mirror_x(mut self, mirror_x: bool) -> Self {
        self.mirror_x = mirror_x;
        self
    }

    pub fn map(&self, [x, y, z]: [f32; 3]) -> [f32; 3] {
        let s = self.scale;
        let x = if self.mirror_x { -x * s } else { x * s };
        [
            x + self.root_offset[0],
            -y * s + self.root_offset[1],
            z * s + self.root_offset[2],
        ]
    }
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::from_config(&RetargetConfig::default())
    }
}
