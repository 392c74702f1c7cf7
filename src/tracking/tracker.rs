// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 目标跟踪状态机
//! Anchor queue, approach geometry and the direction meter
//!
//! 锚点队列 (FIFO) 是唯一跨帧状态, 仅由 Tracker 修改

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometry::{distance_to_plane, Pose, Quaternion};
use super::source::TargetCandidate;
use crate::ar::{AnchorHandle, ArProvider, CameraPose, HitResult, Trackable};

// ========== 方向条字符 ==========

const METER_BLANK: char = '-';
const METER_TARGET: char = ':';

/// 跟踪器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 到达距离 (米), 小于该值时队首锚点出队
    pub closeness_threshold: f32,
    pub anchor_capacity: usize,
    /// 与队尾锚点的最小间隔 (米)
    pub min_anchor_separation: f32,
    pub meter_length: usize,
    /// 方向条覆盖的视角 (度)
    pub meter_fov: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            closeness_threshold: 0.2,
            anchor_capacity: 20,
            min_anchor_separation: 0.005,
            meter_length: 104,
            meter_fov: 40,
        }
    }
}

/// 跟踪器状态 (由队列长度推导)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    NoAnchors,
    Tracking,
    QueueFull,
}

/// 带颜色与评分的锚点
#[derive(Debug, Clone, PartialEq)]
pub struct ColoredAnchor {
    pub handle: AnchorHandle,
    /// 每帧从 AR 提供方刷新
    pub pose: Pose,
    /// RGBA (0-255)
    pub color: [f32; 4],
    pub score: f32,
}

impl ColoredAnchor {
    pub fn new(handle: AnchorHandle, pose: Pose, score: f32) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            handle,
            pose,
            color: [
                rng.gen::<f32>() * 255.0,
                rng.gen::<f32>() * 255.0,
                rng.gen::<f32>() * 255.0,
                255.0,
            ],
            score,
        }
    }
}

/// 目标跟踪器
pub struct Tracker {
    config: TrackerConfig,
    anchors: VecDeque<ColoredAnchor>,
    camera: Option<CameraPose>,
    moving: bool,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            anchors: VecDeque::new(),
            camera: None,
            moving: false,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // ========== 每帧更新 ==========

    /// 缓存相机位姿, 刷新锚点位姿, 到达时队首出队
    pub fn update_pose(&mut self, ar: &mut dyn ArProvider, camera: &CameraPose) {
        self.camera = Some(*camera);

        for anchor in self.anchors.iter_mut() {
            if let Some(pose) = ar.anchor_pose(anchor.handle) {
                anchor.pose = pose;
            }
        }

        let close = self
            .anchors
            .front()
            .map(|head| head.pose.distance(&camera.pose) < self.config.closeness_threshold)
            .unwrap_or(false);
        if close {
            if let Some(head) = self.anchors.pop_front() {
                ar.detach(head.handle);
                tracing::info!("到达锚点 {:?}, 剩余{}个", head.handle, self.anchors.len());
            }
        }
    }

    /// 丢失位姿 (AR 会话异常时调用)
    pub fn clear_pose(&mut self) {
        self.camera = None;
    }

    pub fn is_tracking(&self) -> bool {
        self.camera.map(|c| c.is_tracking()).unwrap_or(false)
    }

    fn tracking_pose(&self) -> Option<&Pose> {
        self.camera.as_ref().filter(|c| c.is_tracking()).map(|c| &c.pose)
    }

    pub fn is_full(&self) -> bool {
        self.anchors.len() >= self.config.anchor_capacity
    }

    pub fn can_place(&self) -> bool {
        !self.is_full() && self.is_tracking()
    }

    pub fn state(&self) -> TrackerState {
        if self.anchors.is_empty() {
            TrackerState::NoAnchors
        } else if self.is_full() {
            TrackerState::QueueFull
        } else {
            TrackerState::Tracking
        }
    }

    // ========== 锚点放置 ==========

    /// 依次命中测试候选点, 每个候选取第一个有效平面命中; 返回放置数量
    pub fn place_candidates(
        &mut self,
        ar: &mut dyn ArProvider,
        candidates: &[TargetCandidate],
    ) -> usize {
        if !self.can_place() {
            return 0;
        }

        let mut placed = 0;
        for candidate in candidates {
            let hits = ar.hit_test(candidate.x, candidate.y);
            let Some(hit) = hits.iter().find(|h| self.check_hit(h)) else {
                tracing::debug!("候选点 ({:.0}, {:.0}) 未命中平面", candidate.x, candidate.y);
                continue;
            };
            if !self.accepts(&hit.hit_pose) {
                continue;
            }
            match ar.create_anchor(&hit.hit_pose) {
                Ok(handle) => {
                    if self.add_anchor(handle, hit.hit_pose, candidate.score) {
                        placed += 1;
                    }
                }
                Err(e) => tracing::warn!("创建锚点失败: {}", e),
            }
        }
        placed
    }

    /// 命中需为平面, 位于平面多边形内, 且相机在平面正面
    pub fn check_hit(&self, hit: &HitResult) -> bool {
        let Some(camera) = self.tracking_pose() else {
            return false;
        };
        match &hit.trackable {
            Trackable::Plane(plane) => {
                plane.contains(&hit.hit_pose) && distance_to_plane(&hit.hit_pose, camera) > 0.0
            }
            _ => false,
        }
    }

    // 容量与去重
    fn accepts(&self, pose: &Pose) -> bool {
        if self.is_full() {
            return false;
        }
        match self.anchors.back() {
            Some(last) => last.pose.distance(pose) >= self.config.min_anchor_separation,
            None => true,
        }
    }

    /// 入队 (满或与队尾过近时拒绝)
    pub fn add_anchor(&mut self, handle: AnchorHandle, pose: Pose, score: f32) -> bool {
        if !self.accepts(&pose) {
            return false;
        }
        self.anchors.push_back(ColoredAnchor::new(handle, pose, score));
        tracing::info!("新增锚点 {:?}, 队列{}个", handle, self.anchors.len());
        true
    }

    /// 入队, 被拒绝的锚点随即释放
    pub fn try_add_anchor(
        &mut self,
        ar: &mut dyn ArProvider,
        handle: AnchorHandle,
        pose: Pose,
        score: f32,
    ) -> bool {
        let added = self.add_anchor(handle, pose, score);
        if !added {
            ar.detach(handle);
        }
        added
    }

    // ========== 查询 ==========

    pub fn anchors(&self) -> &VecDeque<ColoredAnchor> {
        &self.anchors
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// 队首锚点的方位角 (度, 顺时针为正, 范围 [-180, 180]); 未跟踪时为 0
    pub fn angle_to_next_anchor(&self) -> f64 {
        let (Some(anchor), Some(c)) = (self.anchors.front(), self.tracking_pose()) else {
            return 0.0;
        };
        let a = &anchor.pose;

        // x: 左右, y: 上下, z: 前后
        let relative = ((c.tz() - a.tz()) as f64)
            .atan2((c.tx() - a.tx()) as f64)
            .to_degrees();
        let adjustment = quaternion_to_angle_y(c.rotation());

        let mut angle = relative - adjustment - 90.0;
        if angle > 180.0 {
            angle -= 360.0;
        }
        if angle < -180.0 {
            angle += 360.0;
        }
        angle
    }

    pub fn distance_to_next_anchor(&self) -> f32 {
        match (self.anchors.front(), self.tracking_pose()) {
            (Some(anchor), Some(camera)) => anchor.pose.distance(camera),
            _ => 0.0,
        }
    }

    pub fn next_score(&self) -> f32 {
        self.anchors.front().map(|a| a.score).unwrap_or(0.0)
    }

    /// 文本方向条, 目标方向用 ':' 标出; 无锚点或未跟踪时为空
    pub fn direction_meter(&self) -> String {
        if self.anchors.is_empty() || !self.is_tracking() {
            return String::new();
        }
        let len = self.config.meter_length as i64;
        let fov = self.config.meter_fov.max(1) as i64;

        // 不区分前后, 统一翻到前方
        let mut absolute = (self.angle_to_next_anchor() + 90.0).abs();
        if absolute > 180.0 {
            absolute = 360.0 - absolute;
        }

        let lower = (90 - fov / 2) as f64;
        let upper = (90 + fov / 2) as f64;
        let in_fov = absolute.clamp(lower, upper) - lower;

        let index = (in_fov.round() as i64 * len / fov).clamp(0, len);
        (0..len)
            .map(|i| {
                if (i - index).abs() <= 1 {
                    METER_TARGET
                } else {
                    METER_BLANK
                }
            })
            .collect()
    }

    // ========== 操作控制 ==========

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// 启动/停止 (双击)
    pub fn toggle_moving(&mut self) -> bool {
        self.moving = !self.moving;
        tracing::info!("{}", if self.moving { "▶ 开始移动" } else { "⏸ 停止移动" });
        self.moving
    }

    /// 跳过队首锚点 (仅移动中有效)
    pub fn skip_next_anchor(&mut self, ar: &mut dyn ArProvider) -> bool {
        if !self.moving {
            return false;
        }
        match self.anchors.pop_front() {
            Some(head) => {
                ar.detach(head.handle);
                true
            }
            None => false,
        }
    }

    /// 清空队列 (仅停止时有效)
    pub fn clear_anchors(&mut self, ar: &mut dyn ArProvider) -> bool {
        if self.moving {
            return false;
        }
        for anchor in self.anchors.drain(..) {
            ar.detach(anchor.handle);
        }
        true
    }
}

/// 相机绕 y 轴的偏航角 (度), qy <= -0.70 时镜像以覆盖 asin 的值域
pub fn quaternion_to_angle_y(q: &Quaternion) -> f64 {
    let (qx, qy, qz, qw) = (q.i as f64, q.j as f64, q.k as f64, q.w as f64);
    let t = (2.0 * (qw * qy - qz * qx)).clamp(-1.0, 1.0);
    let mut angle = t.asin().to_degrees();
    if qy <= -0.70 {
        angle = if angle < 0.0 { -180.0 - angle } else { 180.0 - angle };
    }
    -angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ar::mock::{floor_plane, MockArProvider};
    use crate::ar::{ArError, Plane, TrackingState};
    use crate::tracking::geometry::Vec3;
    use approx::assert_abs_diff_eq;

    fn origin() -> Pose {
        Pose::from_translation(0.0, 0.0, 0.0)
    }

    fn tracker_with_anchor(ar: &mut MockArProvider, x: f32, z: f32) -> Tracker {
        let mut tracker = Tracker::default();
        let pose = Pose::from_translation(x, 0.0, z);
        let handle = ar.create_anchor(&pose).unwrap();
        assert!(tracker.add_anchor(handle, pose, 0.5));
        let camera = ar.current_pose().unwrap();
        tracker.update_pose(ar, &camera);
        tracker
    }

    #[test]
    fn test_retirement_threshold() {
        let mut ar = MockArProvider::new(origin());
        let tracker = tracker_with_anchor(&mut ar, 0.19, 0.0);
        assert_eq!(tracker.anchor_count(), 0);
        assert_eq!(ar.detached.len(), 1);

        let mut ar = MockArProvider::new(origin());
        let tracker = tracker_with_anchor(&mut ar, 0.21, 0.0);
        assert_eq!(tracker.anchor_count(), 1);
        assert!(ar.detached.is_empty());
    }

    #[test]
    fn test_anchor_pose_refresh_triggers_retirement() {
        let mut ar = MockArProvider::new(origin());
        let mut tracker = tracker_with_anchor(&mut ar, 0.0, -2.0);
        let handle = tracker.anchors()[0].handle;
        ar.move_anchor(handle, Pose::from_translation(0.0, 0.0, -0.1));
        let camera = ar.current_pose().unwrap();
        tracker.update_pose(&mut ar, &camera);
        assert_eq!(tracker.state(), TrackerState::NoAnchors);
    }

    #[test]
    fn test_angle_directions_and_wraparound() {
        let cases = [
            ((0.0, -1.0), 0.0),     // 正前方
            ((1.0, 0.0), 90.0),     // 右
            ((-1.0, 0.0), -90.0),   // 左
            ((-1.0, 1.0), -135.0),  // 左后
            ((1.0, 1.0), 135.0),    // 右后 (-225 回绕)
            ((0.0, 1.0), -180.0),   // 正后方, 落在边界上
        ];
        for ((x, z), expected) in cases {
            let mut ar = MockArProvider::new(origin());
            let tracker = tracker_with_anchor(&mut ar, x, z);
            let angle = tracker.angle_to_next_anchor();
            assert_abs_diff_eq!(angle, expected, epsilon = 1e-4);
            assert!((-180.0..=180.0).contains(&angle));
        }
    }

    #[test]
    fn test_angle_wraps_past_half_turn() {
        // 右后方偏一点: -90 - 0 - 90 - 小量 < -180, 需回绕到正值
        let mut ar = MockArProvider::new(origin());
        let tracker = tracker_with_anchor(&mut ar, 0.1, 1.0);
        let angle = tracker.angle_to_next_anchor();
        let expected = 180.0 - (0.1f64).atan2(1.0).to_degrees();
        assert_abs_diff_eq!(angle, expected, epsilon = 1e-3);

        let mut ar = MockArProvider::new(origin());
        let tracker = tracker_with_anchor(&mut ar, -0.1, 1.0);
        assert_abs_diff_eq!(tracker.angle_to_next_anchor(), -expected, epsilon = 1e-3);
    }

    #[test]
    fn test_queries_neutral_while_not_tracking() {
        let mut ar = MockArProvider::new(origin());
        let mut tracker = tracker_with_anchor(&mut ar, 1.0, 0.0);
        assert_abs_diff_eq!(tracker.angle_to_next_anchor(), 90.0, epsilon = 1e-4);

        // 跟踪暂停: 锚点保留, 查询返回中性值
        let paused = CameraPose { pose: origin(), state: TrackingState::Paused };
        tracker.update_pose(&mut ar, &paused);
        assert_eq!(tracker.anchor_count(), 1);
        assert_eq!(tracker.angle_to_next_anchor(), 0.0);
        assert_eq!(tracker.distance_to_next_anchor(), 0.0);
        assert_eq!(tracker.direction_meter(), "");

        // 位姿丢失同理
        tracker.clear_pose();
        assert_eq!(tracker.angle_to_next_anchor(), 0.0);
        assert_eq!(tracker.distance_to_next_anchor(), 0.0);

        // 恢复跟踪
        let camera = ar.current_pose().unwrap();
        tracker.update_pose(&mut ar, &camera);
        assert_abs_diff_eq!(tracker.distance_to_next_anchor(), 1.0, epsilon = 1e-6);
        assert_eq!(tracker.direction_meter().len(), 104);
    }

    #[test]
    fn test_retirement_ignores_tracking_state() {
        let mut ar = MockArProvider::new(origin());
        let mut tracker = tracker_with_anchor(&mut ar, 0.0, -1.0);
        let paused = CameraPose { pose: Pose::from_translation(0.0, 0.0, -0.9), state: TrackingState::Paused };
        tracker.update_pose(&mut ar, &paused);
        assert_eq!(tracker.anchor_count(), 0);
        assert_eq!(ar.detached.len(), 1);
    }

    #[test]
    fn test_angle_accounts_for_camera_yaw() {
        let yaw = Quaternion::from_axis_angle(&Vec3::y_axis(), 30f32.to_radians());
        let mut ar = MockArProvider::new(Pose::new(Vec3::zeros(), yaw));
        let tracker = tracker_with_anchor(&mut ar, 0.0, -1.0);
        assert_abs_diff_eq!(tracker.angle_to_next_anchor(), 30.0, epsilon = 1e-3);
    }

    #[test]
    fn test_quaternion_to_angle_y() {
        assert_abs_diff_eq!(quaternion_to_angle_y(&Quaternion::identity()), 0.0);
        let q = Quaternion::from_axis_angle(&Vec3::y_axis(), 30f32.to_radians());
        assert_abs_diff_eq!(quaternion_to_angle_y(&q), -30.0, epsilon = 1e-3);
        // qy <= -0.70 触发镜像
        let q = Quaternion::from_axis_angle(&Vec3::y_axis(), (-160f32).to_radians());
        assert!(q.j <= -0.70);
        assert_abs_diff_eq!(quaternion_to_angle_y(&q), 160.0, epsilon = 1e-3);
    }

    #[test]
    fn test_no_anchor_defaults() {
        let tracker = Tracker::default();
        assert_eq!(tracker.angle_to_next_anchor(), 0.0);
        assert_eq!(tracker.distance_to_next_anchor(), 0.0);
        assert_eq!(tracker.next_score(), 0.0);
        assert_eq!(tracker.direction_meter(), "");
        assert_eq!(tracker.state(), TrackerState::NoAnchors);
    }

    #[test]
    fn test_direction_meter() {
        let mut ar = MockArProvider::new(origin());
        let ahead = tracker_with_anchor(&mut ar, 0.0, -1.0).direction_meter();
        assert_eq!(ahead.len(), 104);
        let marks: Vec<usize> = ahead.match_indices(':').map(|(i, _)| i).collect();
        assert_eq!(marks, vec![51, 52, 53]);

        let mut ar = MockArProvider::new(origin());
        let right = tracker_with_anchor(&mut ar, 1.0, 0.0).direction_meter();
        let marks: Vec<usize> = right.match_indices(':').map(|(i, _)| i).collect();
        assert_eq!(marks, vec![103]);

        let mut ar = MockArProvider::new(origin());
        let left = tracker_with_anchor(&mut ar, -1.0, 0.0).direction_meter();
        assert!(left.starts_with("::-"));
    }

    #[test]
    fn test_capacity_and_dedup() {
        let mut ar = MockArProvider::new(origin());
        let mut tracker = Tracker::default();
        for i in 0..20 {
            let pose = Pose::from_translation(1.0 + i as f32, 0.0, 0.0);
            let handle = ar.create_anchor(&pose).unwrap();
            assert!(tracker.try_add_anchor(&mut ar, handle, pose, 0.0));
        }
        assert_eq!(tracker.state(), TrackerState::QueueFull);

        let pose = Pose::from_translation(50.0, 0.0, 0.0);
        let handle = ar.create_anchor(&pose).unwrap();
        assert!(!tracker.try_add_anchor(&mut ar, handle, pose, 0.0));
        assert_eq!(tracker.anchor_count(), 20);
        assert_eq!(ar.detached, vec![handle]);

        // 与队尾过近
        let mut tracker = Tracker::default();
        let a = Pose::from_translation(1.0, 0.0, 0.0);
        let b = Pose::from_translation(1.004, 0.0, 0.0);
        let c = Pose::from_translation(1.006, 0.0, 0.0);
        assert!(tracker.add_anchor(AnchorHandle(100), a, 0.0));
        assert!(!tracker.add_anchor(AnchorHandle(101), b, 0.0));
        assert!(tracker.add_anchor(AnchorHandle(102), c, 0.0));
    }

    #[test]
    fn test_place_candidates_on_floor() {
        let mut ar = MockArProvider::with_floor(origin());
        ar.hit_floor_at(0.0, -2.0);
        let mut tracker = Tracker::default();
        let camera = ar.current_pose().unwrap();
        tracker.update_pose(&mut ar, &camera);

        let candidates = [TargetCandidate { x: 540.0, y: 900.0, score: 0.7 }];
        assert_eq!(tracker.place_candidates(&mut ar, &candidates), 1);
        assert_eq!(ar.hit_queries, vec![(540.0, 900.0)]);
        assert_abs_diff_eq!(tracker.next_score(), 0.7);
        assert_abs_diff_eq!(tracker.distance_to_next_anchor(), 5.0f32.sqrt(), epsilon = 1e-5);

        // 同一位置: 去重, 不创建新锚点
        assert_eq!(tracker.place_candidates(&mut ar, &candidates), 0);
        assert_eq!(ar.anchors.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_hits() {
        let mut ar = MockArProvider::new(origin());
        let mut tracker = Tracker::default();
        let camera = ar.current_pose().unwrap();
        tracker.update_pose(&mut ar, &camera);
        let candidate = [TargetCandidate { x: 1.0, y: 1.0, score: 0.0 }];

        // 非平面
        ar.hits = vec![HitResult { hit_pose: Pose::from_translation(0.0, -1.0, -1.0), trackable: Trackable::Point }];
        assert_eq!(tracker.place_candidates(&mut ar, &candidate), 0);

        // 多边形外
        let small = Plane { polygon: vec![(-0.1, -0.1), (0.1, -0.1), (0.1, 0.1), (-0.1, 0.1)], ..floor_plane() };
        ar.hits = vec![HitResult { hit_pose: Pose::from_translation(0.0, -1.0, -1.0), trackable: Trackable::Plane(small) }];
        assert_eq!(tracker.place_candidates(&mut ar, &candidate), 0);

        // 相机在平面背面
        ar.set_camera(Pose::from_translation(0.0, -3.0, 0.0));
        ar.hit_floor_at(0.0, -1.0);
        let camera = ar.current_pose().unwrap();
        tracker.update_pose(&mut ar, &camera);
        assert_eq!(tracker.place_candidates(&mut ar, &candidate), 0);
        assert!(ar.anchors.is_empty());
    }

    #[test]
    fn test_no_placement_without_tracking() {
        let mut ar = MockArProvider::with_floor(origin());
        ar.hit_floor_at(0.0, -2.0);
        let mut tracker = Tracker::default();
        let camera = CameraPose { pose: origin(), state: TrackingState::Paused };
        tracker.update_pose(&mut ar, &camera);
        assert!(!tracker.can_place());
        let candidate = [TargetCandidate { x: 1.0, y: 1.0, score: 0.0 }];
        assert_eq!(tracker.place_candidates(&mut ar, &candidate), 0);
        assert!(ar.hit_queries.is_empty());
    }

    #[test]
    fn test_anchor_limit_skips_candidate() {
        let mut ar = MockArProvider::with_floor(origin());
        ar.hit_floor_at(0.0, -2.0);
        ar.anchor_limit = Some(0);
        let mut tracker = Tracker::default();
        let camera = ar.current_pose().unwrap();
        tracker.update_pose(&mut ar, &camera);

        let candidates = [TargetCandidate { x: 540.0, y: 900.0, score: 0.7 }];
        assert_eq!(tracker.place_candidates(&mut ar, &candidates), 0);
        assert_eq!(tracker.anchor_count(), 0);
        assert!(ar.anchors.is_empty());

        // 上限放开后同一候选可放置
        ar.anchor_limit = Some(1);
        assert_eq!(tracker.place_candidates(&mut ar, &candidates), 1);
        assert_eq!(
            ar.create_anchor(&Pose::from_translation(3.0, -1.0, 0.0)),
            Err(ArError::AnchorLimit)
        );
    }

    #[test]
    fn test_operator_controls() {
        let mut ar = MockArProvider::new(origin());
        let mut tracker = Tracker::default();
        for i in 0..3 {
            let pose = Pose::from_translation(0.0, 0.0, -1.0 - i as f32);
            let handle = ar.create_anchor(&pose).unwrap();
            tracker.add_anchor(handle, pose, 0.0);
        }

        // 停止时不能跳过
        assert!(!tracker.skip_next_anchor(&mut ar));
        assert!(tracker.toggle_moving());
        assert!(tracker.skip_next_anchor(&mut ar));
        assert_eq!(tracker.anchor_count(), 2);

        // 移动时不能清空
        assert!(!tracker.clear_anchors(&mut ar));
        assert!(!tracker.toggle_moving());
        assert!(tracker.clear_anchors(&mut ar));
        assert_eq!(tracker.anchor_count(), 0);
        assert_eq!(ar.detached.len(), 3);
        assert!(ar.anchors.is_empty());
    }
}
