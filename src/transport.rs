// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 指令发送通道 (Transport)
//!
//! 发送为尽力而为: 未连接时静默丢弃, 发送失败只记录日志并标记断开
//! - UdpTransport:       UDP 数据报发往小车 (地址来自配置)
//! - LogTransport:       仅写日志 (离线调试)
//! - RecordingTransport: 把指令转发到通道 (测试/上层观察)

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::guidance::MotorCommand;

pub trait Transport {
    fn send(&mut self, command: &MotorCommand);

    fn is_connected(&self) -> bool;
}

/// 通道配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// 小车地址 (host:port)
    pub bot_address: String,
    /// 本地绑定地址
    pub bind_address: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bot_address: "192.168.4.1:4210".to_string(),
            bind_address: "0.0.0.0:0".to_string(),
        }
    }
}

// ========== UDP ==========

pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
    connected: bool,
}

impl UdpTransport {
    pub fn connect(config: &TransportConfig) -> Result<Self> {
        let target = config
            .bot_address
            .to_socket_addrs()
            .with_context(|| format!("无法解析小车地址: {}", config.bot_address))?
            .next()
            .with_context(|| format!("小车地址为空: {}", config.bot_address))?;
        let socket = UdpSocket::bind(&config.bind_address)
            .with_context(|| format!("无法绑定本地地址: {}", config.bind_address))?;
        tracing::info!("✅ UDP 通道就绪 {} → {}", socket.local_addr()?, target);
        Ok(Self {
            socket,
            target,
            connected: true,
        })
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, command: &MotorCommand) {
        if !self.connected {
            return;
        }
        if let Err(e) = self.socket.send_to(command.encode().as_bytes(), self.target) {
            tracing::warn!("⚠️  指令发送失败 ({}), 通道标记为断开: {}", self.target, e);
            self.connected = false;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ========== 日志 ==========

/// 仅记录日志, 指令变化时以 info 输出
#[derive(Default)]
pub struct LogTransport {
    last: Option<MotorCommand>,
}

impl LogTransport {
    /// 最近一次发送的指令
    pub fn last(&self) -> Option<MotorCommand> {
        self.last
    }
}

impl Transport for LogTransport {
    fn send(&mut self, command: &MotorCommand) {
        if self.last != Some(*command) {
            tracing::info!("🚗 指令: {}", command);
            self.last = Some(*command);
        } else {
            tracing::trace!("🚗 指令: {}", command);
        }
    }

    fn is_connected(&self) -> bool {
        true
    }
}

// ========== 记录 ==========

/// 把发送的指令转发到通道
pub struct RecordingTransport {
    tx: Sender<MotorCommand>,
}

impl RecordingTransport {
    pub fn new() -> (Self, Receiver<MotorCommand>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, command: &MotorCommand) {
        let _ = self.tx.send(*command);
    }

    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::Direction;
    use std::time::Duration;

    #[test]
    fn test_udp_sends_wire_format() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let config = TransportConfig {
            bot_address: receiver.local_addr().unwrap().to_string(),
            bind_address: "127.0.0.1:0".to_string(),
        };

        let mut transport = UdpTransport::connect(&config).unwrap();
        transport.send(&MotorCommand::new(Direction::Forward, 125, Direction::Forward, 125));

        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"11251125");
        assert!(transport.is_connected());
    }

    #[test]
    fn test_udp_bad_address() {
        let config = TransportConfig {
            bot_address: "not an address".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
        };
        assert!(UdpTransport::connect(&config).is_err());
    }

    #[test]
    fn test_log_transport_tracks_last() {
        let mut transport = LogTransport::default();
        assert!(transport.last().is_none());
        assert!(transport.is_connected());

        transport.send(&MotorCommand::stop());
        transport.send(&MotorCommand::stop());
        assert_eq!(transport.last(), Some(MotorCommand::stop()));

        let forward = MotorCommand::new(Direction::Forward, 125, Direction::Forward, 125);
        transport.send(&forward);
        assert_eq!(transport.last(), Some(forward));
    }

    #[test]
    fn test_recording_transport() {
        let (mut transport, rx) = RecordingTransport::new();
        transport.send(&MotorCommand::stop());
        assert_eq!(rx.try_recv().unwrap().encode(), "00000000");
        assert!(rx.try_recv().is_err());
    }
}
