// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 三维位姿几何
//! Rigid poses, quaternion rotation and plane tests used by the tracker

use nalgebra::{Isometry3, Point3, Translation3};

pub type Vec3 = nalgebra::Vector3<f32>;
pub type Quaternion = nalgebra::UnitQuaternion<f32>;

// ========== 位姿 ==========

/// 刚体位姿 (平移 + 旋转), x: 左右, y: 上下, z: 前后
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    isometry: Isometry3<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            isometry: Isometry3::identity(),
        }
    }
}

impl Pose {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            isometry: Isometry3::from_parts(Translation3::from(translation), rotation),
        }
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            isometry: Isometry3::translation(x, y, z),
        }
    }

    pub fn translation(&self) -> Vec3 {
        self.isometry.translation.vector
    }

    pub fn rotation(&self) -> &Quaternion {
        &self.isometry.rotation
    }

    pub fn tx(&self) -> f32 {
        self.isometry.translation.x
    }

    pub fn tz(&self) -> f32 {
        self.isometry.translation.z
    }

    /// 局部坐标轴在世界坐标中的方向 (0=x, 1=y, 2=z)
    pub fn transformed_axis(&self, axis: usize, scale: f32) -> Vec3 {
        let local = match axis {
            0 => Vec3::x(),
            1 => Vec3::y(),
            _ => Vec3::z(),
        };
        self.isometry.transform_vector(&(local * scale))
    }

    /// 世界坐标 → 本位姿的局部坐标
    pub fn inverse_transform_point(&self, point: &Vec3) -> Vec3 {
        self.isometry
            .inverse_transform_point(&Point3::from(*point))
            .coords
    }

    /// 欧氏距离 (仅平移)
    pub fn distance(&self, other: &Pose) -> f32 {
        (self.translation() - other.translation()).norm()
    }
}

/// 相机到平面的有向距离 (沿平面法线, 即平面位姿的 y 轴)
///
/// 大于 0 表示相机位于平面正面
pub fn distance_to_plane(plane_pose: &Pose, camera_pose: &Pose) -> f32 {
    let normal = plane_pose.transformed_axis(1, 1.0);
    (camera_pose.translation() - plane_pose.translation()).dot(&normal)
}

/// 射线法判断点是否在多边形内 (平面局部 x-z 坐标)
pub fn point_in_polygon(point: (f32, f32), polygon: &[(f32, f32)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let (px, pz) = point;
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, zi) = polygon[i];
        let (xj, zj) = polygon[j];
        if (zi > pz) != (zj > pz) && px < (xj - xi) * (pz - zi) / (zj - zi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
