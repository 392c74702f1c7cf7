// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 色度色块检测器 (Chrominance Blob Detector)
//!
//! 流程: YUV420 帧 → 逐样本色度判定 → 标记图 (2x2块 + 平滑) → 连通区域 → 评分
//!
//! 标记图使用原图分辨率, 每个色度样本对应 2x2 像素块。

use serde::{Deserialize, Serialize};

use super::locator::{BlobLocator, MarkPattern, MarkedBitmap, DEFAULT_MIN_AREA};
use super::types::Blob;
use crate::error::VisionError;
use crate::input::Frame;

/// 色度样本对应的像素块边长
pub const ENCODING_BLOCK_SIZE: usize = 2;

// ========== 颜色判定 ==========

/// 闭区间 [lo, hi]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromaRange {
    pub lo: u8,
    pub hi: u8,
}

impl ChromaRange {
    pub const fn new(lo: u8, hi: u8) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, value: u8) -> bool {
        (self.lo..=self.hi).contains(&value)
    }
}

/// 色度判定: 每个通道为区间列表, 空列表表示不限制
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPredicate {
    pub u_ranges: Vec<ChromaRange>,
    pub v_ranges: Vec<ChromaRange>,
}

impl Default for ColorPredicate {
    fn default() -> Self {
        Self::red()
    }
}

impl ColorPredicate {
    /// 红色 (U/V 双通道)
    pub fn red() -> Self {
        Self {
            u_ranges: vec![ChromaRange::new(0x6B, 0x7E), ChromaRange::new(0x81, 0x99)],
            v_ranges: vec![ChromaRange::new(0xA1, 0xCF)],
        }
    }

    /// 红色 (仅 V 通道)
    pub fn red_v_only() -> Self {
        Self {
            u_ranges: Vec::new(),
            v_ranges: vec![ChromaRange::new(0xA1, 0xCF)],
        }
    }

    pub fn matches(&self, u: u8, v: u8) -> bool {
        channel_passes(&self.u_ranges, u) && channel_passes(&self.v_ranges, v)
    }
}

fn channel_passes(ranges: &[ChromaRange], value: u8) -> bool {
    ranges.is_empty() || ranges.iter().any(|r| r.contains(value))
}

// ========== 屏幕映射 ==========

/// 图像坐标 → 竖屏坐标 (旋转90°的线性映射)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenMapping {
    pub screen_width: f32,
    pub screen_height: f32,
}

impl Default for ScreenMapping {
    fn default() -> Self {
        Self {
            screen_width: 1080.0,
            screen_height: 1920.0,
        }
    }
}

impl ScreenMapping {
    /// (row, col) → (x, y)
    pub fn to_screen(&self, row: f32, col: f32, image_width: u32, image_height: u32) -> (f32, f32) {
        let x = self.screen_width - row * self.screen_width / image_height as f32;
        let y = col * self.screen_height / image_width as f32;
        (x, y)
    }
}

/// 检测器参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDetectorConfig {
    pub predicate: ColorPredicate,
    pub mark_pattern: MarkPattern,
    pub min_area: u32,
    pub screen: ScreenMapping,
}

impl Default for BlobDetectorConfig {
    fn default() -> Self {
        Self {
            predicate: ColorPredicate::red(),
            mark_pattern: MarkPattern::default(),
            min_area: DEFAULT_MIN_AREA,
            screen: ScreenMapping::default(),
        }
    }
}

// ========== 检测器 ==========

/// 单帧色块检测 (持有 U/V 平面副本)
pub struct BlobFinder {
    u: Vec<u8>,
    v: Vec<u8>,
    row_stride: usize,
    pixel_stride: usize,
    width: u32,
    height: u32,
    pattern: MarkPattern,
    locator: BlobLocator,
}

impl BlobFinder {
    /// 从 YUV420 帧构造, 非 YUV420 格式返回 InvalidInputFormat
    pub fn from_frame(frame: &Frame) -> Result<Self, VisionError> {
        Self::from_frame_with(frame, &BlobDetectorConfig::default())
    }

    pub fn from_frame_with(frame: &Frame, config: &BlobDetectorConfig) -> Result<Self, VisionError> {
        frame.ensure_yuv420()?;
        let (u_plane, v_plane) = (&frame.planes[1], &frame.planes[2]);
        Ok(Self {
            u: u_plane.data.clone(),
            v: v_plane.data.clone(),
            row_stride: v_plane.row_stride.max(1),
            pixel_stride: v_plane.pixel_stride.max(1),
            width: frame.width,
            height: frame.height,
            pattern: config.mark_pattern.clone(),
            locator: BlobLocator::new(config.min_area),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 按颜色判定标记并提取色块
    pub fn find(&self, predicate: &ColorPredicate) -> Vec<Blob> {
        let stride = self.row_stride;
        let mut bitmap = MarkedBitmap::with_pattern(
            (self.width as usize).min(stride),
            self.height as usize,
            stride,
            self.pattern.clone(),
        );

        let start = 2 * stride;
        let end = self.v.len().saturating_sub(stride / 2 + 1);
        let mut j = 2 * stride;
        let mut hits = 0usize;

        for i in (start..end).step_by(self.pixel_stride) {
            let u = self.u.get(i).copied().unwrap_or(0x80);
            if predicate.matches(u, self.v[i]) && j >= 2 {
                bitmap.mark(j);
                hits += 1;
            }
            j += ENCODING_BLOCK_SIZE;
            if j % stride == 0 {
                // 色度行结束, 跳过对应的第二个像素行
                j += stride;
            }
        }

        let blobs = self.locator.extract(bitmap);
        tracing::debug!(
            "色块检测: {}x{} 命中样本{}个, 色块{}个",
            self.width,
            self.height,
            hits,
            blobs.len()
        );
        blobs
    }
}

/// 评分最高的色块
pub fn best_blob(blobs: &[Blob]) -> Option<&Blob> {
    blobs.iter().max()
}
