// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运行配置 - 通过JSON文件调整参数

use serde::{Deserialize, Serialize};
use std::fs;

use crate::guidance::GuidanceConfig;
use crate::models::OpenPoseConfig;
use crate::tracking::{PoseScreenMapping, TrackerConfig};
use crate::transport::TransportConfig;
use crate::vision::BlobDetectorConfig;

/// 姿态检测参数
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseConfig {
    pub openpose: OpenPoseConfig,
    pub screen: PoseScreenMapping,
}

/// 全部参数
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrotConfig {
    // === 色块检测 ===
    pub detector: BlobDetectorConfig,
    // === 姿态检测 ===
    pub pose: PoseConfig,
    // === 锚点跟踪 ===
    pub tracker: TrackerConfig,
    // === 电机指令 ===
    pub guidance: GuidanceConfig,
    // === 发送通道 ===
    pub transport: TransportConfig,
}

impl CarrotConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    tracing::info!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) -> bool {
        match serde_json::to_string_pretty(self) {
            Ok(json) => match fs::write(path, json) {
                Ok(()) => {
                    tracing::info!("💾 配置已保存到 {}", path);
                    true
                }
                Err(e) => {
                    tracing::error!("❌ 保存配置失败: {}", e);
                    false
                }
            },
            Err(e) => {
                tracing::error!("❌ 序列化配置失败: {}", e);
                false
            }
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        println!("\n🎛️  当前配置:");
        println!("  色块最小面积: {}", self.detector.min_area);
        println!(
            "  姿态网络输入: {}, 输出: {:?}",
            self.pose.openpose.input_size,
            self.pose.openpose.output_shape()
        );
        println!("  到达距离: {:.2}m", self.tracker.closeness_threshold);
        println!("  锚点容量: {}", self.tracker.anchor_capacity);
        println!(
            "  转向阈值: {:.0}°, 巡航速度: {}",
            self.guidance.turn_threshold_deg, self.guidance.cruise_speed
        );
        println!("  小车地址: {}\n", self.transport.bot_address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!("carrotstick-{}-{}", name, std::process::id()));
        dir.to_string_lossy().into_owned()
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let path = temp_path("missing.json");
        let _ = fs::remove_file(&path);

        let config = CarrotConfig::load(&path);
        assert_eq!(config, CarrotConfig::default());
        assert!(fs::metadata(&path).is_ok());

        // 再次加载读到同样的内容
        assert_eq!(CarrotConfig::load(&path), config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unparseable_uses_defaults() {
        let path = temp_path("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(CarrotConfig::load(&path), CarrotConfig::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let path = temp_path("partial.json");
        let mut config = CarrotConfig::default();
        config.transport.bot_address = "10.0.0.2:4210".to_string();
        config.guidance.cruise_speed = 100;
        assert!(config.save(&path));

        let loaded = CarrotConfig::load(&path);
        assert_eq!(loaded.transport.bot_address, "10.0.0.2:4210");
        assert_eq!(loaded.guidance.cruise_speed, 100);
        assert_eq!(loaded.tracker, TrackerConfig::default());
        let _ = fs::remove_file(&path);

        let path = temp_path("section.json");
        fs::write(&path, r#"{ "guidance": { "turn_threshold_deg": 5.0, "turn_speed_offset": 60, "max_turn_speed": 150, "cruise_speed": 125, "final_approach_distance": 0.3 } }"#).unwrap();
        let loaded = CarrotConfig::load(&path);
        assert_eq!(loaded.guidance.turn_threshold_deg, 5.0);
        assert_eq!(loaded.detector, BlobDetectorConfig::default());
        let _ = fs::remove_file(&path);
    }
}
