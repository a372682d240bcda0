// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// YOLOv8-pose / YOLOv8 检测模型, 输入名 "images", 输出名 "output0"

use std::path::Path;

use anyhow::{Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::yolov8::{letterbox, YOLOTask, YOLOv8Config, YOLOv8Postprocessor};
use super::{ObjectDetector, PoseEstimator};
use crate::detection::{Detection, Frame, PersonPose};

struct OnnxYOLOv8 {
    session: Session,
    post: YOLOv8Postprocessor,
}

impl OnnxYOLOv8 {
    fn load(path: &Path, config: YOLOv8Config) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)
            .with_context(|| format!("failed to load ONNX model {:?}", path))?;
        info!("✅ 模型加载完成: {:?} ({:?})", path, config.task);
        Ok(Self {
            session,
            post: YOLOv8Postprocessor::new(config),
        })
    }

    fn run<T>(
        &mut self,
        frame: &Frame,
        decode: impl FnOnce(&YOLOv8Postprocessor, ndarray::ArrayViewD<f32>, f32) -> Result<T>,
    ) -> Result<T> {
        let lb = letterbox(&frame.image, self.post.config().input_size);
        let input_tensor = Tensor::from_array(lb.tensor)?;
        let outputs = self
            .session
            .run(ort::inputs!["images" => input_tensor])
            .context("inference failed")?;
        let output: ndarray::ArrayViewD<f32> = outputs["output0"]
            .try_extract_array()
            .context("failed to extract output")?;
        decode(&self.post, output, lb.ratio)
    }
}

/// YOLOv8-pose 姿态估计
pub struct OnnxPoseEstimator {
    inner: OnnxYOLOv8,
}

impl OnnxPoseEstimator {
    pub fn new(path: impl AsRef<Path>, config: YOLOv8Config) -> Result<Self> {
        let config = YOLOv8Config {
            task: YOLOTask::Pose,
            ..config
        };
        Ok(Self {
            inner: OnnxYOLOv8::load(path.as_ref(), config)?,
        })
    }
}

impl PoseEstimator for OnnxPoseEstimator {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<PersonPose>> {
        let (w, h) = (frame.width(), frame.height());
        self.inner
            .run(frame, |post, output, ratio| post.poses(output, ratio, w, h))
    }
}

/// YOLOv8 目标检测
pub struct OnnxObjectDetector {
    inner: OnnxYOLOv8,
}

impl OnnxObjectDetector {
    pub fn new(path: impl AsRef<Path>, config: YOLOv8Config) -> Result<Self> {
        let config = YOLOv8Config {
            task: YOLOTask::Detect,
            ..config
        };
        Ok(Self {
            inner: OnnxYOLOv8::load(path.as_ref(), config)?,
        })
    }
}

impl ObjectDetector for OnnxObjectDetector {
    /// 模型每帧都有输出, 从不返回 `None`
    fn detect(&mut self, frame: &Frame, conf_threshold: f32) -> Result<Option<Vec<Detection>>> {
        let (w, h) = (frame.width(), frame.height());
        self.inner.post.set_conf(conf_threshold);
        self.inner
            .run(frame, |post, output, ratio| post.detections(output, ratio, w, h))
            .map(Some)
    }
}
