// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 处理流水线 (Processing Pipeline)
///
/// 两线程架构:
/// - Detector: 姿态推理 + 解码 (独立线程, 忙碌丢帧)
/// - Session:  tick线程, 锚点/指令/发送 (调用方驱动)
pub mod detector;
pub mod session;

pub use detector::{PoseResult, PoseWorker};
pub use session::{Session, TickReport};
