// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 胡萝卜棒 (Carrot Stick) 离线调试工具
///
/// - blobs:  图片 → 色块排名 + 屏幕坐标
/// - pose:   原始网络输出张量 → 骨架 + 站立点 (可输出叠加图)
/// - guide:  角度/距离/锚点数 → 电机指令 (--send 时经 UDP 发给小车)
/// - config: 写出默认配置
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::RgbImage;
use ndarray::Array3;
use tracing_subscriber::EnvFilter;

use carrotstick_rs::config::CarrotConfig;
use carrotstick_rs::guidance::{GuidanceEncoder, GuidanceInput};
use carrotstick_rs::input::{FrameSource, ImageFrameSource};
use carrotstick_rs::models::{BodyPart, OpenPosePostprocessor};
use carrotstick_rs::overlay::{draw_foot, draw_humans};
use carrotstick_rs::tracking::{standing_point, PoseScreenMapping};
use carrotstick_rs::transport::{LogTransport, Transport, UdpTransport};
use carrotstick_rs::vision::{BlobFinder, ColorPredicate};

#[derive(Parser, Debug)]
#[command(author, version, about = "胡萝卜棒 - 目标检测与小车引导调试工具", long_about = None)]
struct Args {
    /// 配置文件 (JSON), 不指定时使用默认值
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 在图片中查找色块
    Blobs {
        #[arg(short, long)]
        image: String,

        /// 仅按 V 分量判定
        #[arg(long, default_value_t = false)]
        v_only: bool,
    },

    /// 解码原始姿态张量 (小端 f32, [H, W, C])
    Pose {
        #[arg(short, long)]
        tensor: String,

        /// 叠加图输出路径 (PNG)
        #[arg(short, long)]
        overlay: Option<String>,
    },

    /// 计算电机指令
    Guide {
        #[arg(long, allow_negative_numbers = true)]
        angle: f64,

        #[arg(long)]
        distance: f32,

        #[arg(long)]
        anchors: usize,

        /// 发送到配置中的小车地址, 否则只写日志
        #[arg(long, default_value_t = false)]
        send: bool,
    },

    /// 写出默认配置
    Config {
        #[arg(short, long)]
        write: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match args.config.as_deref() {
        Some(path) => CarrotConfig::load(path),
        None => CarrotConfig::default(),
    };

    match args.command {
        Command::Blobs { image, v_only } => run_blobs(&config, &image, v_only),
        Command::Pose { tensor, overlay } => run_pose(&config, &tensor, overlay.as_deref()),
        Command::Guide {
            angle,
            distance,
            anchors,
            send,
        } => {
            let encoder = GuidanceEncoder::new(config.guidance.clone());
            let command = encoder.command(&GuidanceInput {
                anchor_count: anchors,
                distance,
                angle,
            });
            println!("{}", command);

            let mut transport: Box<dyn Transport> = if send {
                Box::new(UdpTransport::connect(&config.transport)?)
            } else {
                Box::new(LogTransport::default())
            };
            transport.send(&command);
            anyhow::ensure!(transport.is_connected(), "指令发送失败: {}", config.transport.bot_address);
            Ok(())
        }
        Command::Config { write } => {
            config.print_summary();
            anyhow::ensure!(config.save(&write), "无法写入配置: {}", write);
            Ok(())
        }
    }
}

// ========== 色块 ==========

fn run_blobs(config: &CarrotConfig, image: &str, v_only: bool) -> Result<()> {
    let frame = ImageFrameSource::open(image)?.acquire_frame()?;
    let finder = BlobFinder::from_frame_with(&frame, &config.detector)?;
    let predicate = if v_only {
        ColorPredicate::red_v_only()
    } else {
        config.detector.predicate.clone()
    };

    let mut blobs = finder.find(&predicate);
    blobs.sort_by(|a, b| b.cmp(a));

    println!("🔍 {} 个色块 ({}x{})", blobs.len(), frame.width, frame.height);
    for (rank, blob) in blobs.iter().enumerate() {
        let (row, col) = blob.center();
        let (x, y) = config.detector.screen.to_screen(row, col, frame.width, frame.height);
        println!(
            "  #{:<2} score={:.3} area={:<5} center=({:.1}, {:.1}) screen=({:.0}, {:.0})",
            rank + 1,
            blob.score(),
            blob.area(),
            row,
            col,
            x,
            y
        );
    }
    Ok(())
}

// ========== 姿态 ==========

fn run_pose(config: &CarrotConfig, tensor: &str, overlay: Option<&str>) -> Result<()> {
    let output = load_tensor(tensor, config.pose.openpose.output_shape())?;
    let postprocessor = OpenPosePostprocessor::new(config.pose.openpose.clone());
    let humans = postprocessor.decode(output.view())?;

    println!("🦴 {} 人", humans.len());
    for (i, human) in humans.iter().enumerate() {
        println!("  人物 {} ({} 个部位)", i, human.part_count());
        for part in BodyPart::ALL {
            if let Some(slot) = human.part(part) {
                println!("    {:<10} row={:<3} col={}", part.name(), slot.row, slot.col);
            }
        }
        match standing_point(human, &config.pose.screen) {
            Some(foot) => println!("    站立点: ({:.0}, {:.0})", foot.x, foot.y),
            None => println!("    站立点: 腿部不完整"),
        }
    }

    if let Some(path) = overlay {
        let openpose = &config.pose.openpose;
        let size = openpose.input_size as u32;
        let scale = openpose.input_size as f32 / openpose.map_width as f32;
        let mut img = RgbImage::new(size, size);
        draw_humans(&mut img, &humans, scale);

        // 叠加层与网络输入同尺寸, 无水平偏移
        let mapping = PoseScreenMapping {
            input_size: openpose.input_size as f32,
            map_size: openpose.map_width as f32,
            overlay_size: openpose.input_size as f32,
            screen_width: openpose.input_size as f32,
        };
        for foot in humans.iter().filter_map(|h| standing_point(h, &mapping)) {
            draw_foot(&mut img, foot.x, foot.y);
        }
        img.save(path).with_context(|| format!("无法保存叠加图: {}", path))?;
        println!("💾 叠加图已保存到 {}", path);
    }
    Ok(())
}

fn load_tensor(path: &str, shape: [usize; 3]) -> Result<Array3<f32>> {
    let bytes = std::fs::read(path).with_context(|| format!("无法读取张量: {}", path))?;
    let expected = shape.iter().product::<usize>() * 4;
    anyhow::ensure!(
        bytes.len() == expected,
        "张量大小不符: 期望 {} 字节 ({:?}), 实际 {} 字节",
        expected,
        shape,
        bytes.len()
    );

    let data: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(Array3::from_shape_vec((shape[0], shape[1], shape[2]), data)?)
}
