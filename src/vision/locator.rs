// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 连通区域定位 (Connected-Component Locator)
//!
//! 在二值标记图上做8连通洪水填充, 把标记像素聚合成色块。
//! 标记图按值传入 `extract`, 提取后即被消耗。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::types::{Blob, BlobAccumulator, GridPoint};

/// 默认最小面积 (像素), 面积需严格大于该值
pub const DEFAULT_MIN_AREA: u32 = 100;

// 8邻域 (d_row, d_col)
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// 标记图案: 2x2 编码块 + 抗锯齿平滑偏移
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MarkPattern {
    /// 核心块 (d_row, d_col)
    pub block: Vec<(isize, isize)>,
    /// 附加平滑偏移 (d_row, d_col), 不对称, 按线性索引计算
    pub smoothing: Vec<(isize, isize)>,
}

impl Default for MarkPattern {
    fn default() -> Self {
        Self {
            block: vec![(0, 0), (0, 1), (1, 0), (1, 1)],
            smoothing: vec![
                (1, -1),
                (0, -1),
                (-1, 0),
                (-1, 1),
                (-1, -1),
                (-1, -2),
                (-2, -1),
                (-2, -2),
            ],
        }
    }
}

/// 二值标记图 (每个检测pass独占一份)
pub struct MarkedBitmap {
    cells: Vec<bool>,
    width: usize,
    height: usize,
    stride: usize,
    pattern: MarkPattern,
}

impl MarkedBitmap {
    pub fn new(width: usize, height: usize, stride: usize) -> Self {
        Self::with_pattern(width, height, stride, MarkPattern::default())
    }

    pub fn with_pattern(width: usize, height: usize, stride: usize, pattern: MarkPattern) -> Self {
        Self {
            cells: vec![false; height * stride],
            width,
            height,
            stride,
            pattern,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// 以线性索引为锚点标记图案, 越界写入静默忽略
    pub fn mark(&mut self, index: usize) {
        let stride = self.stride as isize;
        let base = index as isize;
        for &(dr, dc) in self.pattern.block.iter().chain(self.pattern.smoothing.iter()) {
            let target = base + dr * stride + dc;
            if target >= 0 {
                if let Some(cell) = self.cells.get_mut(target as usize) {
                    *cell = true;
                }
            }
        }
    }

    /// 单点置位 (不带图案)
    pub fn set(&mut self, point: GridPoint) {
        if let Some(cell) = self.cells.get_mut(point.position()) {
            *cell = true;
        }
    }

    pub fn is_marked(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width && self.cells[row * self.stride + col]
    }

    pub fn marked_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    // 边界检查 + 是否标记
    fn check(&self, row: isize, col: isize) -> Option<GridPoint> {
        if row < 0 || col < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if self.is_marked(row, col) {
            Some(GridPoint::new(row, col, self.stride))
        } else {
            None
        }
    }

    fn clear(&mut self, point: GridPoint) {
        self.cells[point.position()] = false;
    }
}

/// 连通区域定位器
#[derive(Clone, Debug)]
pub struct BlobLocator {
    min_area: u32,
}

impl Default for BlobLocator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_AREA)
    }
}

impl BlobLocator {
    pub fn new(min_area: u32) -> Self {
        Self { min_area }
    }

    pub fn min_area(&self) -> u32 {
        self.min_area
    }

    /// 行优先扫描, 8连通洪水填充提取色块
    ///
    /// 像素入队时即清除, 每个像素只访问一次; 面积 <= min_area 的区域被丢弃
    pub fn extract(&self, mut bitmap: MarkedBitmap) -> Vec<Blob> {
        self.extract_in_place(&mut bitmap)
    }

    /// 原地提取, 已访问的像素被清除
    pub fn extract_in_place(&self, bitmap: &mut MarkedBitmap) -> Vec<Blob> {
        let mut blobs = Vec::new();
        let mut queue: VecDeque<GridPoint> = VecDeque::new();
        let mut discarded = 0usize;

        for row in 0..bitmap.height {
            for col in 0..bitmap.width {
                let Some(seed) = bitmap.check(row as isize, col as isize) else {
                    continue;
                };

                let mut acc = BlobAccumulator::new(bitmap.width, bitmap.height);
                bitmap.clear(seed);
                acc.add_point(seed);
                queue.push_back(seed);

                while let Some(p) = queue.pop_front() {
                    for (dr, dc) in NEIGHBORS {
                        if let Some(n) = bitmap.check(p.row as isize + dr, p.col as isize + dc) {
                            bitmap.clear(n);
                            acc.add_point(n);
                            queue.push_back(n);
                        }
                    }
                }

                if acc.area() > self.min_area {
                    blobs.extend(acc.finish());
                } else {
                    discarded += 1;
                }
            }
        }

        tracing::debug!("色块提取: 保留{}个, 丢弃{}个小区域", blobs.len(), discarded);
        blobs
    }
}
