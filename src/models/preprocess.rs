// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 姿态模型输入预处理
//!
//! YUV420 帧 → RGB → 裁剪左上角正方形 (丢弃画面底部) → 缩放 → 顺时针旋转90° → BGR 浮点张量

use fast_image_resize as fr;
use image::{imageops, RgbImage};
use ndarray::Array3;

use crate::error::VisionError;
use crate::input::Frame;

/// 生成模型输入张量 [input_size, input_size, 3], BGR 顺序, 数值范围 0-255
pub fn prepare_pose_input(frame: &Frame, input_size: u32) -> Result<Array3<f32>, VisionError> {
    let image = prepare_pose_image(frame, input_size)?;
    Ok(image_to_bgr_tensor(&image))
}

/// 生成模型输入图像 (也用于叠加绘制)
pub fn prepare_pose_image(frame: &Frame, input_size: u32) -> Result<RgbImage, VisionError> {
    let rgb = frame.to_rgb_image()?;

    // 1. 裁剪左上角正方形
    let side = rgb.width().min(rgb.height());
    let square = imageops::crop_imm(&rgb, 0, 0, side, side).to_image();

    // 2. 缩放到模型输入尺寸 (fast_image_resize, 双线性)
    let src_image = fr::images::Image::from_vec_u8(side, side, square.into_raw(), fr::PixelType::U8x3)
        .map_err(|e| VisionError::Image(format!("源图像创建失败: {e}")))?;
    let mut dst_image = fr::images::Image::new(input_size, input_size, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .map_err(|e| VisionError::Image(format!("缩放失败: {e}")))?;

    let scaled = RgbImage::from_raw(input_size, input_size, dst_image.buffer().to_vec())
        .ok_or_else(|| VisionError::Image("缩放结果尺寸不符".to_string()))?;

    // 3. 顺时针旋转90°
    Ok(imageops::rotate90(&scaled))
}

/// RGB 图像 → HWC 张量 (BGR, 不归一化)
pub fn image_to_bgr_tensor(image: &RgbImage) -> Array3<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut tensor = Array3::<f32>::zeros((h, w, 3));
    for (x, y, px) in image.enumerate_pixels() {
        let [r, g, b] = px.0;
        let (x, y) = (x as usize, y as usize);
        tensor[[y, x, 0]] = b as f32;
        tensor[[y, x, 1]] = g as f32;
        tensor[[y, x, 2]] = r as f32;
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::image_file::frame_from_rgb;
    use crate::input::{ImagePlane, PixelFormat};
    use image::Rgb;

    #[test]
    fn test_shape_and_bgr_order() {
        let img = RgbImage::from_pixel(64, 48, Rgb([200, 100, 50]));
        let tensor = prepare_pose_input(&frame_from_rgb(&img, 0), 368).unwrap();
        assert_eq!(tensor.shape(), &[368, 368, 3]);
        assert!((tensor[[100, 100, 0]] - 50.0).abs() <= 3.0);
        assert!((tensor[[100, 100, 1]] - 100.0).abs() <= 3.0);
        assert!((tensor[[100, 100, 2]] - 200.0).abs() <= 3.0);
    }

    #[test]
    fn test_rotated_clockwise() {
        // 上半白, 下半黑; 旋转后白色位于右侧
        let mut img = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        for y in 0..4 {
            for x in 0..8 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let out = prepare_pose_image(&frame_from_rgb(&img, 0), 4).unwrap();
        assert!(out.get_pixel(3, 0).0[0] > 200);
        assert!(out.get_pixel(0, 0).0[0] < 50);
    }

    #[test]
    fn test_rejects_rgba() {
        let frame = Frame {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8,
            planes: vec![ImagePlane { data: vec![0; 4], row_stride: 4, pixel_stride: 4 }],
            frame_id: 0,
        };
        assert!(matches!(
            prepare_pose_input(&frame, 368),
            Err(VisionError::InvalidInputFormat { .. })
        ));
    }
}
