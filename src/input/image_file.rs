// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 静态图片帧源 - 把图片转换为 YUV420 帧
//!
//! 色度平面按 Android 半平面布局输出: row_stride = 宽度, pixel_stride = 2

use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;

use super::{Frame, FrameSource, ImagePlane, PixelFormat};
use crate::error::VisionError;

/// 重复输出同一张图片的帧源
pub struct ImageFrameSource {
    frame: Frame,
    next_id: u64,
}

impl ImageFrameSource {
    /// 从图片文件加载
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("无法打开图片: {}", path.display()))?
            .to_rgb8();
        tracing::info!("加载图片帧源 {} ({}x{})", path.display(), img.width(), img.height());
        Ok(Self::from_rgb(&img))
    }

    pub fn from_rgb(img: &RgbImage) -> Self {
        Self {
            frame: frame_from_rgb(img, 0),
            next_id: 0,
        }
    }
}

impl FrameSource for ImageFrameSource {
    fn acquire_frame(&mut self) -> Result<Frame, VisionError> {
        let mut frame = self.frame.clone();
        frame.frame_id = self.next_id;
        self.next_id += 1;
        Ok(frame)
    }
}

/// RGB → YUV420 (BT.601 全范围), 色度按2x2块取平均
pub fn frame_from_rgb(img: &RgbImage, frame_id: u64) -> Frame {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let chroma_w = w.div_ceil(2);
    let chroma_h = h.div_ceil(2);
    let row_stride = chroma_w * 2;

    let mut y_plane = vec![0u8; w * h];
    let mut u_plane = vec![128u8; chroma_h * row_stride];
    let mut v_plane = vec![128u8; chroma_h * row_stride];

    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b] = px.0.map(|c| c as f32);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        y_plane[y as usize * w + x as usize] = luma.round().clamp(0.0, 255.0) as u8;
    }

    for cy in 0..chroma_h {
        for cx in 0..chroma_w {
            let (mut u_sum, mut v_sum, mut n) = (0.0f32, 0.0f32, 0.0f32);
            for dy in 0..2 {
                for dx in 0..2 {
                    let (px, py) = (cx * 2 + dx, cy * 2 + dy);
                    if px >= w || py >= h {
                        continue;
                    }
                    let [r, g, b] = img.get_pixel(px as u32, py as u32).0.map(|c| c as f32);
                    u_sum += -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
                    v_sum += 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
                    n += 1.0;
                }
            }
            let idx = cy * row_stride + cx * 2;
            u_plane[idx] = (u_sum / n).round().clamp(0.0, 255.0) as u8;
            v_plane[idx] = (v_sum / n).round().clamp(0.0, 255.0) as u8;
        }
    }

    Frame {
        width: w as u32,
        height: h as u32,
        format: PixelFormat::Yuv420,
        planes: vec![
            ImagePlane { data: y_plane, row_stride: w, pixel_stride: 1 },
            ImagePlane { data: u_plane, row_stride, pixel_stride: 2 },
            ImagePlane { data: v_plane, row_stride, pixel_stride: 2 },
        ],
        frame_id,
    }
}
