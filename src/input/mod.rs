// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 相机帧输入 (Camera Frame Input)
///
/// 外部帧源接口与帧数据结构
/// - FrameSource:      每个tick提供一帧 (帧未就绪时返回 NotYetAvailable)
/// - Frame:            平面图像 (Y/U/V), 带显式行跨度/像素跨度
/// - ImageFrameSource: 从静态图片生成 YUV420 帧 (离线调试)
pub mod image_file;

pub use image_file::ImageFrameSource;

use image::RgbImage;

use crate::error::VisionError;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 三平面 YUV 4:2:0 (Y, U, V), 对应 Android YUV_420_888
    Yuv420,
    /// 交错 RGBA8
    Rgba8,
}

impl PixelFormat {
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Yuv420 => "YUV_420_888",
            PixelFormat::Rgba8 => "RGBA_8888",
        }
    }
}

/// 单个图像平面
#[derive(Clone, Debug)]
pub struct ImagePlane {
    pub data: Vec<u8>,
    /// 行跨度 (字节)
    pub row_stride: usize,
    /// 像素跨度 (相邻样本间隔字节)
    pub pixel_stride: usize,
}

/// 相机帧 (帧源 → 检测)
///
/// 帧拥有自己的平面数据, Drop 即释放
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<ImagePlane>,
    pub frame_id: u64, // 帧序号
}

impl Frame {
    /// 校验为 YUV420 三平面格式
    pub fn ensure_yuv420(&self) -> Result<(), VisionError> {
        if self.format != PixelFormat::Yuv420 || self.planes.len() < 3 {
            return Err(VisionError::InvalidInputFormat {
                expected: PixelFormat::Yuv420.name().to_string(),
                found: format!("{} ({} planes)", self.format.name(), self.planes.len()),
            });
        }
        Ok(())
    }

    /// YUV420 → RGB (BT.601 全范围)
    pub fn to_rgb_image(&self) -> Result<RgbImage, VisionError> {
        self.ensure_yuv420()?;
        let (w, h) = (self.width as usize, self.height as usize);
        let (y_plane, u_plane, v_plane) = (&self.planes[0], &self.planes[1], &self.planes[2]);

        let mut rgb = Vec::with_capacity(w * h * 3);
        for row in 0..h {
            for col in 0..w {
                let y = sample(y_plane, row, col) as f32;
                let u = sample(u_plane, row / 2, col / 2) as f32 - 128.0;
                let v = sample(v_plane, row / 2, col / 2) as f32 - 128.0;

                let r = y + 1.402 * v;
                let g = y - 0.344_136 * u - 0.714_136 * v;
                let b = y + 1.772 * u;
                rgb.push(r.round().clamp(0.0, 255.0) as u8);
                rgb.push(g.round().clamp(0.0, 255.0) as u8);
                rgb.push(b.round().clamp(0.0, 255.0) as u8);
            }
        }

        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| VisionError::Image("RGB缓冲区尺寸不符".to_string()))
    }
}

// 越界样本按中性值处理 (Y=0, UV=128 由调用方偏移)
fn sample(plane: &ImagePlane, row: usize, col: usize) -> u8 {
    plane
        .data
        .get(row * plane.row_stride + col * plane.pixel_stride)
        .copied()
        .unwrap_or(128)
}

/// 帧源接口 (外部协作者)
pub trait FrameSource {
    /// 获取当前帧
    ///
    /// 帧未就绪时返回 `VisionError::NotYetAvailable`, 调用方应跳过本次tick
    fn acquire_frame(&mut self) -> Result<Frame, VisionError>;
}
