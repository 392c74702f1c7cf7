// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 姿态检测工作线程 (Pose Worker)
/// 职责: 接收相机帧 → 预处理 → 推理 → OpenPose解码 → 返回骨架
///
/// - 同一时刻至多一帧在处理, 忙碌时新帧直接丢弃
/// - 结果带会话纪元 (epoch), 失效后的旧结果被忽略
/// - 工作线程不接触锚点队列
/// - 单帧推理 panic 被隔离, 忙碌标志总会复位
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::input::Frame;
use crate::models::{prepare_pose_input, Human, InferenceEngine, OpenPoseConfig, OpenPosePostprocessor};

/// 单帧解码结果 (工作线程 → tick线程)
#[derive(Clone, Debug)]
pub struct PoseResult {
    pub frame_id: u64,
    pub epoch: u64,
    pub humans: Vec<Human>,
    pub inference_ms: f64,
}

pub struct PoseWorker {
    tx_frame: Option<Sender<(u64, Frame)>>,
    rx_result: Receiver<PoseResult>,
    busy: Arc<AtomicBool>,
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

impl PoseWorker {
    /// 启动工作线程
    pub fn spawn<E>(engine: E, config: OpenPoseConfig) -> Self
    where
        E: InferenceEngine + 'static,
    {
        let (tx_frame, rx_frame) = crossbeam_channel::bounded::<(u64, Frame)>(1);
        let (tx_result, rx_result) = crossbeam_channel::unbounded::<PoseResult>();
        let busy = Arc::new(AtomicBool::new(false));

        let worker_busy = busy.clone();
        let handle = std::thread::Builder::new()
            .name("pose-worker".to_string())
            .spawn(move || pose_thread(engine, config, rx_frame, tx_result, worker_busy))
            .map_err(|e| tracing::error!("姿态线程启动失败: {}", e))
            .ok();

        Self {
            tx_frame: Some(tx_frame),
            rx_result,
            busy,
            epoch: 0,
            handle,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 提交一帧; 忙碌时返回 false (帧被丢弃)
    pub fn submit(&self, frame: Frame) -> bool {
        let Some(tx) = self.tx_frame.as_ref() else {
            return false;
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if tx.try_send((self.epoch, frame)).is_err() {
            self.busy.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// 取出当前纪元的最新结果 (非阻塞)
    pub fn try_recv(&self) -> Option<PoseResult> {
        let mut latest = None;
        while let Ok(result) = self.rx_result.try_recv() {
            if result.epoch == self.epoch {
                latest = Some(result);
            }
        }
        latest
    }

    /// 阻塞等待当前纪元的结果
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PoseResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx_result.recv_timeout(remaining) {
                Ok(result) if result.epoch == self.epoch => return Some(result),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// 使在途结果失效 (会话重置/暂停时调用)
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        tracing::debug!("姿态结果失效, 纪元 → {}", self.epoch);
    }
}

impl Drop for PoseWorker {
    fn drop(&mut self) {
        // 关闭通道, 线程在 recv 返回错误后退出
        self.tx_frame.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("姿态线程异常退出");
            }
        }
    }
}

fn pose_thread<E: InferenceEngine>(
    mut engine: E,
    config: OpenPoseConfig,
    rx_frame: Receiver<(u64, Frame)>,
    tx_result: Sender<PoseResult>,
    busy: Arc<AtomicBool>,
) {
    tracing::info!("✅ 姿态线程启动");
    let input_size = config.input_size as u32;
    let postprocessor = OpenPosePostprocessor::new(config);

    while let Ok((epoch, frame)) = rx_frame.recv() {
        let frame_id = frame.frame_id;
        let pass = panic::catch_unwind(AssertUnwindSafe(|| {
            detect_once(&mut engine, &postprocessor, input_size, epoch, &frame, &tx_result)
        }));
        if pass.is_err() {
            tracing::error!("❌ 帧{} 姿态推理崩溃, 已跳过", frame_id);
        }
        busy.store(false, Ordering::Release);
    }
    tracing::info!("姿态线程退出");
}

// 单帧: 预处理 → 推理 → 解码 → 发送
fn detect_once<E: InferenceEngine>(
    engine: &mut E,
    postprocessor: &OpenPosePostprocessor,
    input_size: u32,
    epoch: u64,
    frame: &Frame,
    tx_result: &Sender<PoseResult>,
) {
    let start = Instant::now();
    let outcome = prepare_pose_input(frame, input_size)
        .map_err(anyhow::Error::from)
        .and_then(|input| engine.infer(&input))
        .and_then(|output| postprocessor.decode(output.view()).map_err(anyhow::Error::from));

    match outcome {
        Ok(humans) => {
            let inference_ms = start.elapsed().as_secs_f64() * 1000.0;
            tracing::debug!(
                "帧{} 姿态检测: {}人, 耗时{:.1}ms",
                frame.frame_id,
                humans.len(),
                inference_ms
            );
            let _ = tx_result.send(PoseResult {
                frame_id: frame.frame_id,
                epoch,
                humans,
                inference_ms,
            });
        }
        Err(e) => tracing::warn!("帧{} 姿态检测失败: {:#}", frame.frame_id, e),
    }
}
