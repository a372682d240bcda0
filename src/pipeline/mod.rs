// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 处理流水线 (Processing pipeline)
///
/// 架构:
/// ```text
/// FrameSource → CaptureLoop ─┬─→ FrameOrchestrator ─→ EventRecorder
///                            └─→ FrameSlot (最新标注帧) ─→ 显示端
/// ```
pub mod capture;
pub mod orchestrator;
pub mod renderer;

pub use capture::{
    CaptureLoop, CaptureStats, ControlMessage, CycleReport, FrameSlot, FrameSource,
    ImageDirSource, LatestFrame,
};
pub use orchestrator::{FrameOrchestrator, FrameReport, Recording};
pub use renderer::{annotate, SKELETON};
