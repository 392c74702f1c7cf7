// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 目标跟踪 (Target Tracking)
///
/// - geometry: 位姿 / 四元数 / 平面测试
/// - source:   每帧的屏幕候选点 (色块 或 姿态)
/// - tracker:  锚点队列 + 方位角/距离 + 方向条
pub mod geometry;
pub mod source;
pub mod tracker;

pub use geometry::{distance_to_plane, point_in_polygon, Pose, Quaternion, Vec3};
pub use source::{
    standing_point, BlobTargetSource, PoseScreenMapping, PoseTargetSource, TargetCandidate,
    TargetSource,
};
pub use tracker::{quaternion_to_angle_y, ColoredAnchor, Tracker, TrackerConfig, TrackerState};
