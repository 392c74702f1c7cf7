// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod ar; // AR 会话接口
pub mod config; // 运行配置
pub mod error; // 错误类型
pub mod guidance; // 电机指令编码
pub mod input; // 相机帧输入
pub mod models; // 推理接口与 OpenPose 后处理
pub mod overlay; // 调试叠加层
pub mod pipeline; // 姿态线程 + tick 编排
pub mod tracking; // 锚点跟踪
pub mod transport; // 指令发送通道
pub mod vision; // 色块检测

pub use crate::config::CarrotConfig;
pub use crate::error::VisionError;
pub use crate::guidance::{Direction, GuidanceEncoder, MotorCommand};
pub use crate::models::{InferenceEngine, OpenPoseConfig, OpenPosePostprocessor};
pub use crate::pipeline::{PoseWorker, Session, TickReport};
pub use crate::tracking::{Tracker, TrackerConfig};
