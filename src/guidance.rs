// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 电机指令编码 (Guidance Encoder)
//!
//! 线上格式: 8 位 ASCII 数字 `%1d%3d%1d%3d`
//! 依次为 右侧方向, 右侧速度, 左侧方向, 左侧速度

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VisionError;

/// 单侧轮方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Stop = 0,
    Forward = 1,
    Backward = 2,
}

impl Direction {
    pub fn digit(self) -> u8 {
        self as u8
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Direction::Stop),
            1 => Some(Direction::Forward),
            2 => Some(Direction::Backward),
            _ => None,
        }
    }
}

/// 差速电机指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    pub right_dir: Direction,
    pub right_speed: u8,
    pub left_dir: Direction,
    pub left_speed: u8,
}

impl MotorCommand {
    pub fn new(right_dir: Direction, right_speed: u8, left_dir: Direction, left_speed: u8) -> Self {
        Self {
            right_dir,
            right_speed,
            left_dir,
            left_speed,
        }
    }

    pub fn stop() -> Self {
        Self::new(Direction::Stop, 0, Direction::Stop, 0)
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::stop()
    }

    /// 编码为 8 位数字字符串
    pub fn encode(&self) -> String {
        format!(
            "{:01}{:03}{:01}{:03}",
            self.right_dir.digit(),
            self.right_speed,
            self.left_dir.digit(),
            self.left_speed
        )
    }

    /// 解析 8 位数字字符串
    pub fn parse(s: &str) -> Result<Self, VisionError> {
        let invalid = || VisionError::InvalidCommand(s.to_string());
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let direction = |i: usize| Direction::from_digit(s.as_bytes()[i] - b'0').ok_or_else(invalid);
        let speed = |range: std::ops::Range<usize>| {
            s[range]
                .parse::<u16>()
                .ok()
                .and_then(|v| u8::try_from(v).ok())
                .ok_or_else(invalid)
        };

        Ok(Self::new(direction(0)?, speed(1..4)?, direction(4)?, speed(5..8)?))
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// 编码器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceConfig {
    /// 超过该角度 (度) 原地转向
    pub turn_threshold_deg: f64,
    pub turn_speed_offset: u8,
    pub max_turn_speed: u8,
    pub cruise_speed: u8,
    /// 最后一个锚点的停车距离 (米)
    pub final_approach_distance: f32,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            turn_threshold_deg: 10.0,
            turn_speed_offset: 60,
            max_turn_speed: 150,
            cruise_speed: 125,
            final_approach_distance: 0.3,
        }
    }
}

/// 一次编码所需的跟踪量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceInput {
    pub anchor_count: usize,
    pub distance: f32,
    /// 顺时针为正 (度)
    pub angle: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GuidanceEncoder {
    config: GuidanceConfig,
}

impl GuidanceEncoder {
    pub fn new(config: GuidanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    pub fn command(&self, input: &GuidanceInput) -> MotorCommand {
        if input.anchor_count == 0 {
            return MotorCommand::stop();
        }
        if input.anchor_count == 1 && input.distance < self.config.final_approach_distance {
            return MotorCommand::stop();
        }

        let off = input.angle.abs();
        if off > self.config.turn_threshold_deg {
            let speed = (off.trunc() + self.config.turn_speed_offset as f64)
                .min(self.config.max_turn_speed as f64)
                .clamp(0.0, 255.0) as u8;
            return if input.angle > 0.0 {
                MotorCommand::new(Direction::Forward, speed, Direction::Backward, speed)
            } else {
                MotorCommand::new(Direction::Backward, speed, Direction::Forward, speed)
            };
        }

        let cruise = self.config.cruise_speed;
        MotorCommand::new(Direction::Forward, cruise, Direction::Forward, cruise)
    }

    pub fn encode(&self, input: &GuidanceInput) -> String {
        self.command(input).encode()
    }
}
