use nalgebra::{Unit, UnitQuaternion, Vector3};
use std::f32::consts::PI;

/// 無回転 (x, y, z, w)
pub const IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// 回転前のボーンの向き (鉛直方向)
pub const DEFAULT_BONE_AXIS: [f32; 3] = [0.0, 1.0, 0.0];

const MIN_LENGTH: f32 = 1e-6;

fn to_vector([x, y, z]: [f32; 3]) -> Vector3<f32> {
    Vector3::new(x, y, z)
}

/// `axis` を `to - from` の向きに合わせる最小回転 (x, y, z, w)
///
/// 長さゼロ・非有限の方向は回転が定まらないため無回転を返す。
pub fn bone_direction(from: [f32; 3], to: [f32; 3], axis: [f32; 3]) -> [f32; 4] {
    let direction = to_vector(to) - to_vector(from);
    let axis = to_vector(axis);
    if !direction.iter().chain(axis.iter()).all(|v| v.is_finite()) {
        return IDENTITY;
    }
    let (Some(direction), Some(axis)) = (
        Unit::try_new(direction, MIN_LENGTH),
        Unit::try_new(axis, MIN_LENGTH),
    ) else {
        return IDENTITY;
    };

    // 真逆の場合は回転軸が一意に決まらないので、垂直な軸で半回転
    let rotation = UnitQuaternion::rotation_between_axis(&axis, &direction)
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&perpendicular(&axis), PI));

    let q = rotation.quaternion();
    let result = [q.i, q.j, q.k, q.w];
    if result.iter().all(|v| v.is_finite()) {
        result
    } else {
        IDENTITY
    }
}

fn perpendicular(axis: &Unit<Vector3<f32>>) -> Unit<Vector3<f32>> {
    let candidate = if axis.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::z()
    };
    Unit::new_normalize(axis.cross(&candidate))
}
