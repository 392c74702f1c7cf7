// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 测试用 AR 提供方 (脚本化位姿与命中结果)

use std::collections::BTreeMap;

use super::{AnchorHandle, ArError, ArProvider, CameraPose, HitResult, Plane, Pose, Trackable};

pub struct MockArProvider {
    pub pose: Result<CameraPose, ArError>,
    pub hits: Vec<HitResult>,
    pub planes: Vec<Plane>,
    pub anchors: BTreeMap<AnchorHandle, Pose>,
    pub detached: Vec<AnchorHandle>,
    pub hit_queries: Vec<(f32, f32)>,
    /// 会话内存活锚点上限
    pub anchor_limit: Option<usize>,
    next_id: u64,
}

impl MockArProvider {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose: Ok(CameraPose::tracking(pose)),
            hits: Vec::new(),
            planes: Vec::new(),
            anchors: BTreeMap::new(),
            detached: Vec::new(),
            hit_queries: Vec::new(),
            anchor_limit: None,
            next_id: 1,
        }
    }

    /// 相机正下方 1m 的地面 (足够大)
    pub fn with_floor(pose: Pose) -> Self {
        let mut mock = Self::new(pose);
        mock.planes.push(floor_plane());
        mock
    }

    /// 所有命中测试都返回地面上的该位置
    pub fn hit_floor_at(&mut self, x: f32, z: f32) {
        self.hits = vec![HitResult {
            hit_pose: Pose::from_translation(x, -1.0, z),
            trackable: Trackable::Plane(floor_plane()),
        }];
    }

    pub fn set_camera(&mut self, pose: Pose) {
        self.pose = Ok(CameraPose::tracking(pose));
    }

    /// 模拟 AR 会话对锚点位置的修正
    pub fn move_anchor(&mut self, handle: AnchorHandle, pose: Pose) {
        self.anchors.insert(handle, pose);
    }
}

pub fn floor_plane() -> Plane {
    Plane {
        id: 7,
        center_pose: Pose::from_translation(0.0, -1.0, 0.0),
        polygon: vec![(-50.0, -50.0), (50.0, -50.0), (50.0, 50.0), (-50.0, 50.0)],
    }
}

impl ArProvider for MockArProvider {
    fn current_pose(&mut self) -> Result<CameraPose, ArError> {
        self.pose.clone()
    }

    fn hit_test(&mut self, x: f32, y: f32) -> Vec<HitResult> {
        self.hit_queries.push((x, y));
        self.hits.clone()
    }

    fn create_anchor(&mut self, pose: &Pose) -> Result<AnchorHandle, ArError> {
        if self.anchor_limit.is_some_and(|limit| self.anchors.len() >= limit) {
            return Err(ArError::AnchorLimit);
        }
        let handle = AnchorHandle(self.next_id);
        self.next_id += 1;
        self.anchors.insert(handle, *pose);
        Ok(handle)
    }

    fn detach(&mut self, handle: AnchorHandle) {
        self.anchors.remove(&handle);
        self.detached.push(handle);
    }

    fn anchor_pose(&self, handle: AnchorHandle) -> Option<Pose> {
        self.anchors.get(&handle).copied()
    }

    fn all_planes(&self) -> Vec<Plane> {
        self.planes.clone()
    }
}
