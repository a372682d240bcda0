// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 运行配置
pub mod detection; // 行为检测核心
pub mod error; // 错误类型
pub mod models; // 模型接口与具体实现
pub mod pipeline; // 采集/编排/标注
pub mod storage; // 事件存储与查询

pub use crate::config::SentinelConfig;
pub use crate::detection::{
    CandidateRegion, Detection, Frame, ObjectBox, ObjectLocator, PersonPose, Point2,
};
pub use crate::error::{QueryError, SentinelError, StoreError};
pub use crate::models::{ModelHandle, ObjectDetector, PoseEstimator};
pub use crate::pipeline::{
    CaptureLoop, FrameOrchestrator, FrameReport, FrameSlot, FrameSource, ImageDirSource,
    Recording,
};
pub use crate::storage::{EventQuery, EventRecord, EventRecorder, EventStore, JsonlEventStore};
