// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 单次 tick 编排 (Session)
//!
//! 相机位姿 → 锚点刷新/出队 → 取帧 → 候选点 → 放置锚点 → 电机指令 → 发送
//!
//! tick 从不返回错误: 失败记录日志, 本次发送停车指令并标记 degraded

use crate::ar::ArProvider;
use crate::guidance::{GuidanceConfig, GuidanceEncoder, GuidanceInput, MotorCommand};
use crate::input::FrameSource;
use crate::tracking::{TargetSource, Tracker, TrackerConfig};
use crate::transport::Transport;

/// 单次 tick 的结果摘要
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// 本次处理的帧 (未取帧时为 None)
    pub frame_id: Option<u64>,
    pub candidates: usize,
    pub placed: usize,
    pub command: MotorCommand,
    pub degraded: bool,
    pub anchor_count: usize,
    pub angle: f64,
    pub distance: f32,
    pub meter: String,
}

pub struct Session<A: ArProvider, F: FrameSource> {
    ar: A,
    frames: F,
    source: Box<dyn TargetSource>,
    tracker: Tracker,
    encoder: GuidanceEncoder,
    transport: Box<dyn Transport>,
    ticks: u64,
}

impl<A: ArProvider, F: FrameSource> Session<A, F> {
    pub fn new(
        ar: A,
        frames: F,
        source: Box<dyn TargetSource>,
        tracker_config: TrackerConfig,
        guidance_config: GuidanceConfig,
        transport: Box<dyn Transport>,
    ) -> Self {
        tracing::info!("✅ 会话启动, 候选来源: {}", source.name());
        Self {
            ar,
            frames,
            source,
            tracker: Tracker::new(tracker_config),
            encoder: GuidanceEncoder::new(guidance_config),
            transport,
            ticks: 0,
        }
    }

    pub fn ar(&self) -> &A {
        &self.ar
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn source(&self) -> &dyn TargetSource {
        self.source.as_ref()
    }

    // ========== 每帧 ==========

    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;

        let camera = match self.ar.current_pose() {
            Ok(camera) => camera,
            Err(e) => {
                tracing::warn!("⚠️  tick {}: 相机位姿不可用: {}", self.ticks, e);
                self.tracker.clear_pose();
                return self.finish(None, 0, 0, true);
            }
        };
        self.tracker.update_pose(&mut self.ar, &camera);

        let mut frame_id = None;
        let mut candidates = 0;
        let mut placed = 0;
        let mut degraded = false;

        if self.tracker.can_place() {
            match self.frames.acquire_frame() {
                Ok(frame) => {
                    frame_id = Some(frame.frame_id);
                    match self.source.candidates(&frame) {
                        Ok(list) => {
                            candidates = list.len();
                            placed = self.tracker.place_candidates(&mut self.ar, &list);
                        }
                        Err(e) if e.is_skip() => tracing::debug!("帧{} 跳过: {}", frame.frame_id, e),
                        Err(e) => {
                            tracing::warn!("⚠️  帧{} 检测失败: {}", frame.frame_id, e);
                            degraded = true;
                        }
                    }
                }
                Err(e) if e.is_skip() => tracing::debug!("tick {}: {}", self.ticks, e),
                Err(e) => {
                    tracing::warn!("⚠️  tick {}: 取帧失败: {}", self.ticks, e);
                    degraded = true;
                }
            }
        }

        self.finish(frame_id, candidates, placed, degraded)
    }

    fn finish(
        &mut self,
        frame_id: Option<u64>,
        candidates: usize,
        placed: usize,
        degraded: bool,
    ) -> TickReport {
        let input = GuidanceInput {
            anchor_count: self.tracker.anchor_count(),
            distance: self.tracker.distance_to_next_anchor(),
            angle: self.tracker.angle_to_next_anchor(),
        };

        let command = if !degraded && self.tracker.is_moving() && self.tracker.is_tracking() {
            self.encoder.command(&input)
        } else {
            MotorCommand::stop()
        };
        self.transport.send(&command);
        if !self.transport.is_connected() {
            tracing::debug!("tick {}: 通道未连接, 指令{}未送达", self.ticks, command);
        }

        TickReport {
            tick: self.ticks,
            frame_id,
            candidates,
            placed,
            command,
            degraded,
            anchor_count: input.anchor_count,
            angle: input.angle,
            distance: input.distance,
            meter: self.tracker.direction_meter(),
        }
    }

    // ========== 操作控制 ==========

    pub fn toggle_moving(&mut self) -> bool {
        self.tracker.toggle_moving()
    }

    pub fn skip_next_anchor(&mut self) -> bool {
        self.tracker.skip_next_anchor(&mut self.ar)
    }

    /// 清空队列并丢弃在途检测结果
    pub fn clear_anchors(&mut self) -> bool {
        let cleared = self.tracker.clear_anchors(&mut self.ar);
        if cleared {
            self.source.reset();
        }
        cleared
    }
}
