// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 色块视觉检测 (Color-Blob Vision)
///
/// - types:       网格坐标 / 色块累加器 / 色块评分
/// - locator:     标记图 + 8连通区域提取
/// - blob_finder: YUV420 色度判定 → 色块
pub mod blob_finder;
pub mod locator;
pub mod types;

pub use blob_finder::{
    best_blob, BlobDetectorConfig, BlobFinder, ChromaRange, ColorPredicate, ScreenMapping,
    ENCODING_BLOCK_SIZE,
};
pub use locator::{BlobLocator, MarkPattern, MarkedBitmap, DEFAULT_MIN_AREA};
pub use types::{Blob, BlobAccumulator, GridPoint};
