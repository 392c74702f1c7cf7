// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 色块检测数据结构定义
/// Data structures for the color-blob detector

use std::cmp::Ordering;

// ========== 评分权重 ==========

const DENSITY_WEIGHT: f32 = 0.1;
const ROUNDNESS_WEIGHT: f32 = 0.7;
const WIDTH_CENTRALITY_WEIGHT: f32 = 0.1;
const HEIGHT_CENTRALITY_WEIGHT: f32 = 0.1;

/// 网格坐标 (二维 ↔ 一维线性索引)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    pub row: usize,
    pub col: usize,
    stride: usize,
}

impl GridPoint {
    pub fn new(row: usize, col: usize, stride: usize) -> Self {
        Self { row, col, stride }
    }

    /// 线性缓冲区偏移
    pub fn position(&self) -> usize {
        self.row * self.stride + self.col
    }

    /// 由线性偏移还原行列
    pub fn from_position(position: usize, stride: usize) -> Self {
        Self {
            row: position / stride,
            col: position % stride,
            stride,
        }
    }
}

/// 单个连通区域的统计累加器 (提取过程中可变)
#[derive(Debug, Clone)]
pub struct BlobAccumulator {
    area: u32,
    row_total: u64,
    col_total: u64,
    min_row: usize,
    max_row: usize,
    min_col: usize,
    max_col: usize,
    // 图像名义尺寸, 用于居中度评分
    width: usize,
    height: usize,
}

impl BlobAccumulator {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            area: 0,
            row_total: 0,
            col_total: 0,
            min_row: usize::MAX,
            max_row: 0,
            min_col: usize::MAX,
            max_col: 0,
            width,
            height,
        }
    }

    /// 加入一个像素
    pub fn add_point(&mut self, point: GridPoint) {
        self.area += 1;
        self.row_total += point.row as u64;
        self.col_total += point.col as u64;
        self.min_row = self.min_row.min(point.row);
        self.max_row = self.max_row.max(point.row);
        self.min_col = self.min_col.min(point.col);
        self.max_col = self.max_col.max(point.col);
    }

    pub fn area(&self) -> u32 {
        self.area
    }

    /// 结束累加, 空区域返回 None
    pub fn finish(self) -> Option<Blob> {
        if self.area == 0 {
            return None;
        }
        Some(Blob { acc: self })
    }
}

/// 色块 (不可变值对象, area 恒大于 0)
#[derive(Debug, Clone)]
pub struct Blob {
    acc: BlobAccumulator,
}

impl Blob {
    /// 像素数
    pub fn area(&self) -> u32 {
        self.acc.area
    }

    /// 质心 (row, col)
    pub fn center(&self) -> (f32, f32) {
        let area = self.acc.area as f64;
        (
            (self.acc.row_total as f64 / area) as f32,
            (self.acc.col_total as f64 / area) as f32,
        )
    }

    /// 外接矩形 (min_row, min_col, max_row, max_col), 闭区间
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (self.acc.min_row, self.acc.min_col, self.acc.max_row, self.acc.max_col)
    }

    fn bbox_size(&self) -> (f32, f32) {
        let h = (self.acc.max_row - self.acc.min_row + 1) as f32;
        let w = (self.acc.max_col - self.acc.min_col + 1) as f32;
        (w, h)
    }

    /// 填充率: 面积 / 外接矩形面积
    pub fn density(&self) -> f32 {
        let (w, h) = self.bbox_size();
        (self.acc.area as f32 / (w * h)).min(1.0)
    }

    /// 圆度: min(宽高比, 1/宽高比)
    pub fn roundness(&self) -> f32 {
        let (w, h) = self.bbox_size();
        let aspect = w / h;
        aspect.min(1.0 / aspect)
    }

    /// 水平居中度 (1 = 图像正中, 0 = 边缘)
    pub fn width_centrality(&self) -> f32 {
        centrality(self.center().1, self.acc.width)
    }

    /// 垂直居中度
    pub fn height_centrality(&self) -> f32 {
        centrality(self.center().0, self.acc.height)
    }

    /// 综合评分 ∈ [0, 1]
    pub fn score(&self) -> f32 {
        DENSITY_WEIGHT * self.density()
            + ROUNDNESS_WEIGHT * self.roundness()
            + WIDTH_CENTRALITY_WEIGHT * self.width_centrality()
            + HEIGHT_CENTRALITY_WEIGHT * self.height_centrality()
    }
}

fn centrality(value: f32, extent: usize) -> f32 {
    if extent == 0 {
        return 0.0;
    }
    let half = extent as f32 / 2.0;
    (1.0 - (value - half).abs() / half).clamp(0.0, 1.0)
}

// 按评分全序
impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Blob {}

impl PartialOrd for Blob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Blob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score().total_cmp(&other.score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square_blob(top: usize, left: usize, side: usize, width: usize, height: usize) -> Blob {
        let mut acc = BlobAccumulator::new(width, height);
        for r in top..top + side {
            for c in left..left + side {
                acc.add_point(GridPoint::new(r, c, width));
            }
        }
        acc.finish().unwrap()
    }

    #[test]
    fn test_grid_point_position() {
        let p = GridPoint::new(3, 5, 100);
        assert_eq!(p.position(), 305);
        assert_eq!(GridPoint::from_position(305, 100), p);
    }

    #[test]
    fn test_empty_accumulator() {
        assert!(BlobAccumulator::new(10, 10).finish().is_none());
    }

    #[test]
    fn test_centered_square_scores_high() {
        // 10x10 图像中心的 2x2 方块: 密度1, 圆度1, 居中度0.9
        let blob = square_blob(4, 4, 2, 10, 10);
        assert_eq!(blob.area(), 4);
        assert_abs_diff_eq!(blob.center().0, 4.5, epsilon = 1e-6);
        assert_abs_diff_eq!(blob.density(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(blob.roundness(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(blob.width_centrality(), 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(blob.score(), 0.98, epsilon = 1e-5);
    }

    #[test]
    fn test_score_range_for_thin_line() {
        let mut acc = BlobAccumulator::new(50, 50);
        for c in 0..50 {
            acc.add_point(GridPoint::new(0, c, 50));
        }
        let blob = acc.finish().unwrap();
        assert_abs_diff_eq!(blob.roundness(), 1.0 / 50.0, epsilon = 1e-6);
        assert_abs_diff_eq!(blob.height_centrality(), 0.0, epsilon = 1e-6);
        let score = blob.score();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_density_of_diagonal() {
        let mut acc = BlobAccumulator::new(20, 20);
        for i in 0..4 {
            acc.add_point(GridPoint::new(i, i, 20));
        }
        let blob = acc.finish().unwrap();
        assert_abs_diff_eq!(blob.density(), 4.0 / 16.0, epsilon = 1e-6);
        assert_eq!(blob.bounds(), (0, 0, 3, 3));
    }

    #[test]
    fn test_ordering_by_score() {
        let centered = square_blob(8, 8, 4, 20, 20);
        let corner = square_blob(0, 0, 4, 20, 20);
        assert!(centered > corner);
        let blobs = vec![corner.clone(), centered.clone()];
        assert_eq!(blobs.iter().max().unwrap().bounds(), centered.bounds());
    }
}
