// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// AR 会话接口 (AR Provider)
///
/// 外部协作者: 相机位姿 / 命中测试 / 锚点生命周期 / 平面列表
/// - 真实实现由平台层提供
/// - 测试中使用 `mock::MockArProvider`
#[cfg(test)]
pub mod mock;

use thiserror::Error;

pub use crate::tracking::geometry::{Pose, Quaternion, Vec3};
use crate::tracking::geometry::point_in_polygon;

/// AR 会话错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArError {
    #[error("AR session lost")]
    SessionLost,

    #[error("anchor limit reached")]
    AnchorLimit,
}

/// 相机跟踪状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Tracking,
    Paused,
    Stopped,
}

/// 相机位姿 + 跟踪状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub pose: Pose,
    pub state: TrackingState,
}

impl CameraPose {
    pub fn tracking(pose: Pose) -> Self {
        Self {
            pose,
            state: TrackingState::Tracking,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackingState::Tracking
    }
}

/// 锚点句柄 (由 AR 提供方分配)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnchorHandle(pub u64);

/// 检测到的平面
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub id: u64,
    /// 平面中心位姿 (y 轴为法线)
    pub center_pose: Pose,
    /// 边界多边形 (平面局部 x-z 坐标)
    pub polygon: Vec<(f32, f32)>,
}

impl Plane {
    /// 位姿是否落在平面多边形内
    pub fn contains(&self, pose: &Pose) -> bool {
        let local = self.center_pose.inverse_transform_point(&pose.translation());
        point_in_polygon((local.x, local.z), &self.polygon)
    }
}

/// 命中测试的可跟踪对象
#[derive(Debug, Clone, PartialEq)]
pub enum Trackable {
    Plane(Plane),
    Point,
    Other,
}

/// 命中测试结果
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub hit_pose: Pose,
    pub trackable: Trackable,
}

/// AR 提供方接口
pub trait ArProvider {
    /// 当前相机位姿
    fn current_pose(&mut self) -> Result<CameraPose, ArError>;

    /// 屏幕坐标命中测试, 按距离由近到远
    fn hit_test(&mut self, x: f32, y: f32) -> Vec<HitResult>;

    /// 在位姿处创建锚点
    fn create_anchor(&mut self, pose: &Pose) -> Result<AnchorHandle, ArError>;

    /// 释放锚点
    fn detach(&mut self, handle: AnchorHandle);

    /// 锚点当前位姿 (随 AR 会话修正而变化), 已释放返回 None
    fn anchor_pose(&self, handle: AnchorHandle) -> Option<Pose>;

    fn all_planes(&self) -> Vec<Plane>;
}
