// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 目标定位 (Object locator)
//! 职责: 目标检测模型 → 筛选目标类别 → 归一化坐标转像素坐标

use anyhow::Result;
use tracing::debug;

use super::types::{Detection, Frame, ObjectBox};
use crate::models::{self, ModelHandle, ObjectDetector};

pub struct ObjectLocator {
    detector: ModelHandle<dyn ObjectDetector>,
    conf_threshold: f32,
    target_class: Option<usize>,
}

impl ObjectLocator {
    pub fn new(detector: ModelHandle<dyn ObjectDetector>, conf_threshold: f32) -> Self {
        Self {
            detector,
            conf_threshold,
            target_class: None,
        }
    }

    /// 只保留指定类别 (`None` 保留全部, 单类别模型的默认用法)
    pub fn with_target_class(mut self, class_id: Option<usize>) -> Self {
        self.target_class = class_id;
        self
    }

    pub fn conf_threshold(&self) -> f32 {
        self.conf_threshold
    }

    /// 当前帧的目标框; 模型报告 "无结果" 时返回空列表
    pub fn detections_for_frame(&self, frame: &Frame) -> Result<Vec<ObjectBox>> {
        let detections = models::with_model(&self.detector, |detector| {
            detector.detect(frame, self.conf_threshold)
        })?;

        let Some(detections) = detections else {
            debug!("📭 帧 {} 无检测结果", frame.id);
            return Ok(Vec::new());
        };

        Ok(to_pixel_boxes(
            &detections,
            frame.width(),
            frame.height(),
            self.target_class,
        ))
    }
}

/// 归一化 (cx, cy, w, h) → 像素
///
/// 中心点原样写入 `x_min`/`y_min`, 与 `ObjectBox::centroid` 的约定配套.
pub fn to_pixel_boxes(
    detections: &[Detection],
    width: u32,
    height: u32,
    target_class: Option<usize>,
) -> Vec<ObjectBox> {
    let (w, h) = (width as f32, height as f32);
    detections
        .iter()
        .filter(|d| target_class.map_or(true, |class_id| d.class_id == class_id))
        .map(|d| ObjectBox {
            x_min: d.cx * w,
            y_min: d.cy * h,
            width: d.width * w,
            height: d.height * h,
            class_id: d.class_id,
            confidence: d.confidence,
        })
        .collect()
}
