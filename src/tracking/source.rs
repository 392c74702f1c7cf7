// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 目标候选来源
//!
//! 每个来源把一帧图像转换为屏幕坐标候选点, 由 Tracker 命中测试并放置锚点
//! - BlobTargetSource: 色块检测 (旧模式), 取评分最高的色块中心
//! - PoseTargetSource: 后台姿态检测, 由脚踝/膝盖估计站立点

use serde::{Deserialize, Serialize};

use crate::error::VisionError;
use crate::input::Frame;
use crate::models::{BodyPart, Human, PartSlot};
use crate::pipeline::detector::PoseWorker;
use crate::vision::{best_blob, BlobDetectorConfig, BlobFinder};

/// 屏幕坐标候选点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetCandidate {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// 候选来源接口
pub trait TargetSource {
    fn name(&self) -> &'static str;

    fn candidates(&mut self, frame: &Frame) -> Result<Vec<TargetCandidate>, VisionError>;

    /// 丢弃在途结果 (锚点队列清空后调用)
    fn reset(&mut self) {}
}

// ========== 色块来源 ==========

pub struct BlobTargetSource {
    config: BlobDetectorConfig,
}

impl BlobTargetSource {
    pub fn new(config: BlobDetectorConfig) -> Self {
        Self { config }
    }
}

impl Default for BlobTargetSource {
    fn default() -> Self {
        Self::new(BlobDetectorConfig::default())
    }
}

impl TargetSource for BlobTargetSource {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn candidates(&mut self, frame: &Frame) -> Result<Vec<TargetCandidate>, VisionError> {
        let finder = BlobFinder::from_frame_with(frame, &self.config)?;
        let blobs = finder.find(&self.config.predicate);
        let Some(best) = best_blob(&blobs) else {
            return Ok(Vec::new());
        };

        let (row, col) = best.center();
        let (x, y) = self
            .config
            .screen
            .to_screen(row, col, frame.width, frame.height);
        Ok(vec![TargetCandidate {
            x,
            y,
            score: best.score(),
        }])
    }
}

// ========== 姿态来源 ==========

/// 热力图坐标 → 屏幕坐标
///
/// 叠加层尺寸大于屏幕宽度, 左右各超出 `horizontal_offset()` 像素
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseScreenMapping {
    pub input_size: f32,
    pub map_size: f32,
    pub overlay_size: f32,
    pub screen_width: f32,
}

impl Default for PoseScreenMapping {
    fn default() -> Self {
        Self {
            input_size: 368.0,
            map_size: 46.0,
            overlay_size: 1439.0,
            screen_width: 1080.0,
        }
    }
}

impl PoseScreenMapping {
    pub fn horizontal_offset(&self) -> f32 {
        ((self.overlay_size - self.screen_width) / 2.0).round()
    }

    /// 热力图单元 → 叠加层像素 (未扣除水平偏移)
    fn to_overlay(&self, cell: usize) -> f32 {
        cell as f32 * (self.input_size / self.map_size) * self.overlay_size / self.input_size
    }

    /// (row, col) → 屏幕 (x, y)
    pub fn cell_to_screen(&self, row: usize, col: usize) -> (f32, f32) {
        (
            self.to_overlay(col) - self.horizontal_offset(),
            self.to_overlay(row),
        )
    }
}

// 小腿比例: 脚踝到地面约为膝-踝长度的 0.15
const FOOT_DROP_RATIO: f32 = 0.15;

/// 站立点估计: 取较低的脚踝, 向下补偿一段小腿长度
///
/// 至少一条腿的膝盖与脚踝都已分配才返回结果
pub fn standing_point(human: &Human, mapping: &PoseScreenMapping) -> Option<TargetCandidate> {
    let to_screen = |slot: PartSlot| mapping.cell_to_screen(slot.row, slot.col);
    let leg = |knee: BodyPart, ankle: BodyPart| {
        Some((to_screen(human.part(knee)?), to_screen(human.part(ankle)?)))
    };

    let legs: Vec<((f32, f32), (f32, f32))> = [
        leg(BodyPart::RKnee, BodyPart::RAnkle),
        leg(BodyPart::LKnee, BodyPart::LAnkle),
    ]
    .into_iter()
    .flatten()
    .collect();
    if legs.is_empty() {
        return None;
    }

    let x = legs.iter().map(|(_, ankle)| ankle.0).sum::<f32>() / legs.len() as f32;

    // 右腿优先, 左踝更低时取左腿
    let mut lower = legs[0];
    for &candidate in &legs[1..] {
        if candidate.1 .1 > lower.1 .1 {
            lower = candidate;
        }
    }
    let (knee, ankle) = lower;
    let shin = ((knee.0 - ankle.0).powi(2) + (knee.1 - ankle.1).powi(2)).sqrt();
    let y = ankle.1 + shin * FOOT_DROP_RATIO;

    Some(TargetCandidate { x, y, score: 0.0 })
}

/// 姿态来源 (包装后台工作线程)
pub struct PoseTargetSource {
    worker: PoseWorker,
    mapping: PoseScreenMapping,
    last_humans: Vec<Human>,
}

impl PoseTargetSource {
    pub fn new(worker: PoseWorker, mapping: PoseScreenMapping) -> Self {
        Self {
            worker,
            mapping,
            last_humans: Vec::new(),
        }
    }

    /// 最近一次解码的骨架 (用于叠加绘制)
    pub fn last_humans(&self) -> &[Human] {
        &self.last_humans
    }

    pub fn worker_mut(&mut self) -> &mut PoseWorker {
        &mut self.worker
    }
}

impl TargetSource for PoseTargetSource {
    fn name(&self) -> &'static str {
        "pose"
    }

    fn candidates(&mut self, frame: &Frame) -> Result<Vec<TargetCandidate>, VisionError> {
        frame.ensure_yuv420()?;
        if !self.worker.is_busy() && !self.worker.submit(frame.clone()) {
            tracing::debug!("姿态线程忙碌, 丢弃帧{}", frame.frame_id);
        }

        let Some(result) = self.worker.try_recv() else {
            return Ok(Vec::new());
        };
        self.last_humans = result.humans;

        let candidates: Vec<TargetCandidate> = self
            .last_humans
            .iter()
            .filter_map(|h| standing_point(h, &self.mapping))
            .collect();
        tracing::debug!(
            "帧{}: {}人, 站立点{}个",
            result.frame_id,
            self.last_humans.len(),
            candidates.len()
        );
        Ok(candidates)
    }

    fn reset(&mut self) {
        self.worker.invalidate();
        self.last_humans.clear();
    }
}
