// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 采集线程 (Capture loop)
//!
//! 单独的工作线程: 取帧 → 编排 → 发布最新标注帧
//! - 显示端通过 `FrameSlot` 读取最新帧, 旧帧直接被覆盖
//! - 停止信号经 crossbeam 通道下发, 每个周期检查一次, 不打断进行中的写入

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::orchestrator::{FrameOrchestrator, Recording};
use crate::detection::Frame;
use crate::storage::captured_images;

const REPORT_CAPACITY: usize = 64;

/// 帧来源 (摄像头 / 视频 / 图片目录)
pub trait FrameSource: Send {
    /// `Ok(None)` 表示来源已结束
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// 图片目录 (或单张图片) 按文件名顺序回放, 帧ID取文件名主干
pub struct ImageDirSource {
    camera_id: u32,
    paths: VecDeque<PathBuf>,
}

impl ImageDirSource {
    pub fn open(path: &Path, camera_id: u32) -> Result<Self> {
        let paths: VecDeque<PathBuf> = if path.is_dir() {
            captured_images(path)?.into()
        } else if path.is_file() {
            VecDeque::from([path.to_path_buf()])
        } else {
            return Err(anyhow!("frame source {:?} does not exist", path));
        };
        info!("📂 帧来源 {:?}: {} 张图片", path, paths.len());
        Ok(Self { camera_id, paths })
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path)
            .with_context(|| format!("failed to read frame {:?}", path))?
            .to_rgb8();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(Frame::new(id, self.camera_id, image)))
    }
}

/// 最新发布的标注帧
#[derive(Debug)]
pub struct LatestFrame {
    pub seq: u64,
    pub frame_id: String,
    pub camera_id: u32,
    pub image: RgbImage,
}

#[derive(Default)]
struct SlotState {
    seq: u64,
    latest: Option<Arc<LatestFrame>>,
}

/// 最新帧交接槽: 后写覆盖先写, 读者拿到的总是完整的一帧
#[derive(Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布一帧, 返回其序号 (从 1 开始)
    pub fn publish(&self, frame_id: String, camera_id: u32, image: RgbImage) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.seq += 1;
        let seq = state.seq;
        state.latest = Some(Arc::new(LatestFrame {
            seq,
            frame_id,
            camera_id,
            image,
        }));
        seq
    }

    pub fn latest(&self) -> Option<Arc<LatestFrame>> {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.latest.clone()
    }

    /// 序号大于 `seen` 的最新帧
    pub fn newer_than(&self, seen: u64) -> Option<Arc<LatestFrame>> {
        self.latest().filter(|frame| frame.seq > seen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Shutdown,
}

/// 每个周期的简报
#[derive(Debug, Clone)]
pub enum CycleReport {
    Processed {
        frame_id: String,
        seq: u64,
        confirmed: usize,
        saved: Option<PathBuf>,
    },
    Failed {
        frame_id: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub processed: u64,
    pub failed: u64,
    pub recorded: u64,
    pub record_failures: u64,
    pub capture_errors: u64,
}

pub struct CaptureLoop {
    control: Sender<ControlMessage>,
    reports: Receiver<CycleReport>,
    handle: JoinHandle<CaptureStats>,
}

impl CaptureLoop {
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        orchestrator: Arc<FrameOrchestrator>,
        slot: Arc<FrameSlot>,
    ) -> Result<Self> {
        let (control, rx_control) = crossbeam_channel::unbounded();
        let (tx_report, reports) = crossbeam_channel::bounded(REPORT_CAPACITY);

        let handle = thread::Builder::new()
            .name("sentinel-capture".into())
            .spawn(move || run(source.as_mut(), &orchestrator, &slot, &rx_control, &tx_report))
            .context("failed to spawn capture thread")?;

        Ok(Self {
            control,
            reports,
            handle,
        })
    }

    pub fn reports(&self) -> &Receiver<CycleReport> {
        &self.reports
    }

    /// 请求停止, 当前周期结束后生效
    pub fn stop(&self) {
        // 线程已退出时接收端已关闭, 忽略
        let _ = self.control.send(ControlMessage::Shutdown);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待线程退出 (来源耗尽或已调用 `stop`), 不会主动取消
    pub fn join(self) -> Result<CaptureStats> {
        let CaptureLoop {
            control, handle, ..
        } = self;
        let stats = handle
            .join()
            .map_err(|_| anyhow!("capture thread panicked"));
        drop(control);
        stats
    }
}

fn run(
    source: &mut dyn FrameSource,
    orchestrator: &FrameOrchestrator,
    slot: &FrameSlot,
    rx_control: &Receiver<ControlMessage>,
    tx_report: &Sender<CycleReport>,
) -> CaptureStats {
    info!("✅ 采集线程启动");
    let mut stats = CaptureStats::default();

    loop {
        match rx_control.try_recv() {
            Ok(ControlMessage::Shutdown) => {
                info!("🛑 收到停止信号");
                break;
            }
            // CaptureLoop 已被丢弃, 无人再能发出停止信号
            Err(TryRecvError::Disconnected) => {
                info!("🛑 控制端已关闭");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("🏁 帧来源结束");
                break;
            }
            Err(e) => {
                warn!("⚠️ 取帧失败, 跳过: {:#}", e);
                stats.capture_errors += 1;
                continue;
            }
        };
        stats.frames += 1;

        let report = match orchestrator.process_frame(&frame) {
            Ok(report) => {
                stats.processed += 1;
                match &report.recording {
                    Recording::Saved(_) => stats.recorded += 1,
                    Recording::Failed(_) => stats.record_failures += 1,
                    Recording::Skipped => {}
                }
                let saved = report.saved_path().map(Path::to_path_buf);
                let confirmed = report.confirmed.len();
                let seq = slot.publish(report.frame_id, report.camera_id, report.annotated);
                CycleReport::Processed {
                    frame_id: frame.id,
                    seq,
                    confirmed,
                    saved,
                }
            }
            Err(e) => {
                error!("❌ 帧 {} 处理失败: {}", frame.id, e);
                stats.failed += 1;
                CycleReport::Failed {
                    frame_id: frame.id,
                    reason: e.to_string(),
                }
            }
        };

        if let Err(TrySendError::Full(_)) = tx_report.try_send(report) {
            debug!("📭 周期简报队列已满, 丢弃");
        }
    }

    info!(
        "📊 采集线程退出: {} 帧, {} 处理, {} 失败, {} 记录",
        stats.frames, stats.processed, stats.failed, stats.recorded
    );
    stats
}
