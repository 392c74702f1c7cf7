// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 视觉管线错误类型
//! Error types shared by the vision, decoding and guidance layers

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    /// 输入图像格式不符 (例如不是 YUV420 平面格式)
    #[error("invalid input format: expected {expected}, got {found}")]
    InvalidInputFormat { expected: String, found: String },

    /// 当前帧尚不可用, 跳过本次tick
    #[error("frame not yet available")]
    NotYetAvailable,

    /// 取帧超时, 跳过本次tick
    #[error("frame acquisition deadline exceeded")]
    DeadlineExceeded,

    /// 网络输出张量形状不符
    #[error("tensor shape mismatch: expected {expected:?}, got {found:?}")]
    TensorShape {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// 非法的电机指令字符串
    #[error("invalid motor command: {0:?}")]
    InvalidCommand(String),

    /// 图像转换/缩放失败
    #[error("image processing failed: {0}")]
    Image(String),
}

impl VisionError {
    /// 是否属于"跳过本帧"类的错误 (帧未就绪/超时), 不应视为故障
    pub fn is_skip(&self) -> bool {
        matches!(self, VisionError::NotYetAvailable | VisionError::DeadlineExceeded)
    }
}
