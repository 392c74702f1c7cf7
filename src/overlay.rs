// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 调试叠加层 - 在图像上绘制骨架与站立点

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::models::{Human, SKELETON_CONNECTIONS};

const KEYPOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LIMB_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const FOOT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const KEYPOINT_RADIUS: i32 = 4;
const FOOT_RADIUS: i32 = 6;

/// 绘制骨架, `scale` 为热力图单元 → 图像像素的倍数
pub fn draw_humans(img: &mut RgbImage, humans: &[Human], scale: f32) {
    for human in humans {
        let point = |part: usize| {
            human.parts()[part].map(|slot| (slot.col as f32 * scale, slot.row as f32 * scale))
        };

        // 先画连接, 关键点覆盖在上面
        for &(a, b) in SKELETON_CONNECTIONS.iter() {
            if let (Some(start), Some(end)) = (point(a), point(b)) {
                draw_line_segment_mut(img, start, end, LIMB_COLOR);
            }
        }

        for (x, y) in (0..human.parts().len()).filter_map(point) {
            draw_hollow_circle_mut(
                img,
                (x.round() as i32, y.round() as i32),
                KEYPOINT_RADIUS,
                KEYPOINT_COLOR,
            );
        }
    }
}

/// 标出站立点估计 (图像像素坐标)
pub fn draw_foot(img: &mut RgbImage, x: f32, y: f32) {
    draw_filled_circle_mut(img, (x.round() as i32, y.round() as i32), FOOT_RADIUS, FOOT_COLOR);
}
