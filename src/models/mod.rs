// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型统一接口 (外部协作方)
///
/// # 架构说明
///
/// 姿态估计与目标检测对核心流水线来说是黑盒, 只约定输出格式:
/// - **PoseEstimator**: 图片 → 每人一组固定布局关键点 + 人体框
/// - **ObjectDetector**: 图片 + 置信度阈值 → 归一化检测框 (或 "本帧无结果")
///
/// ## 实现
/// - `sidecar.rs`: 离线回放, 读取预先生成的标签/姿态文件
/// - `yolov8.rs`:  YOLOv8 输出解码 (letterbox + 后处理)
/// - `onnx.rs`:    ONNX Runtime 推理后端 (需启用 `onnx` feature)
///
/// ## 生命周期
/// 模型只加载一次, 以 `ModelHandle` 注入编排器, 跨帧共享, 进程退出时释放.
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detection::{Detection, Frame, PersonPose};

/// 姿态估计模型接口
pub trait PoseEstimator: Send {
    /// 检测一帧中的所有人, 未检出的关键点为 (0, 0)
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<PersonPose>>;
}

/// 目标检测模型接口
pub trait ObjectDetector: Send {
    /// 返回归一化检测结果
    ///
    /// `Ok(None)` 表示本帧没有检测结果 (不是错误).
    fn detect(&mut self, frame: &Frame, conf_threshold: f32) -> Result<Option<Vec<Detection>>>;
}

/// 长期持有的共享模型句柄
pub type ModelHandle<M> = Arc<Mutex<Box<M>>>;

pub fn pose_handle<P: PoseEstimator + 'static>(model: P) -> ModelHandle<dyn PoseEstimator> {
    Arc::new(Mutex::new(Box::new(model)))
}

pub fn detector_handle<D: ObjectDetector + 'static>(model: D) -> ModelHandle<dyn ObjectDetector> {
    Arc::new(Mutex::new(Box::new(model)))
}

/// 在句柄上执行一次推理
pub(crate) fn with_model<M: ?Sized, T>(
    handle: &ModelHandle<M>,
    f: impl FnOnce(&mut M) -> Result<T>,
) -> Result<T> {
    let mut guard = handle
        .lock()
        .map_err(|_| anyhow!("model handle poisoned by a previous panic"))?;
    f(&mut **guard)
}

pub mod sidecar;
pub mod yolov8;

#[cfg(feature = "onnx")]
pub mod onnx;

// Re-exports
pub use sidecar::{LabelFileDetector, PoseFileEstimator};
pub use yolov8::{YOLOTask, YOLOv8Config, YOLOv8Postprocessor};

#[cfg(feature = "onnx")]
pub use onnx::{OnnxObjectDetector, OnnxPoseEstimator};
