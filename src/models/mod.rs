// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 姿态模型接口与解码
///
/// # 架构说明
///
/// ## 推理引擎 (InferenceEngine)
/// 推理后端保持为 trait, 由调用方提供 (ONNX / TFLite / 测试桩)
///
/// ## 后处理器模式 (Postprocessor Pattern)
/// - **OpenPose**: 热力图 + PAF → 人体骨架
///   - 文件: `openpose.rs`
///
/// ## 预处理
/// - YUV420 帧 → 裁剪正方形 → 缩放 → 顺时针旋转90° → BGR 浮点张量
///   - 文件: `preprocess.rs`
///
/// ## 核心流程
/// ```text
/// 相机帧 → prepare_pose_input → [368, 368, 3]
///          ↓
///     InferenceEngine::infer
///          ↓
///     [46, 46, 57] → OpenPosePostprocessor::decode → Vec<Human>
/// ```
use anyhow::Result;
use ndarray::Array3;

/// 推理引擎接口 (外部协作者)
///
/// 在后台工作线程中调用, 因此要求 `Send`
pub trait InferenceEngine: Send {
    /// 前向推理
    ///
    /// # Arguments
    /// * `input` - HWC 格式输入张量
    ///
    /// # Returns
    /// * HWC 格式输出张量 (热力图通道在前, PAF 通道在后)
    fn infer(&mut self, input: &Array3<f32>) -> Result<Array3<f32>>;
}

pub mod openpose;
pub mod preprocess;

// Re-exports
pub use openpose::{
    BodyPart, Human, LimbCandidate, OpenPoseConfig, OpenPosePostprocessor, PartSlot, COCO_PAIRS,
    COCO_PAIRS_NETWORK, SKELETON_CONNECTIONS,
};
pub use preprocess::prepare_pose_input;
