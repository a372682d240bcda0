// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 离线回放协作方
// 读取模型预先导出的逐帧结果文件, 文件名为帧ID:
//   - 检测: <labels_dir>/<frame_id>.txt   YOLO标签格式 `class cx cy w h [conf]`
//   - 姿态: <poses_dir>/<frame_id>.json   [{"bbox": [x1,y1,x2,y2], "keypoints": [[x,y], ...]}]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::{ObjectDetector, PoseEstimator};
use crate::detection::{BBox, Detection, Frame, PersonPose, Point2};

/// 读取文件, 不存在时返回 `None`
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {:?}", path)),
    }
}

/// YOLO 标签文件检测器
pub struct LabelFileDetector {
    labels_dir: PathBuf,
}

impl LabelFileDetector {
    pub fn new(labels_dir: impl Into<PathBuf>) -> Self {
        Self {
            labels_dir: labels_dir.into(),
        }
    }

    pub fn label_path(&self, frame_id: &str) -> PathBuf {
        self.labels_dir.join(format!("{}.txt", frame_id))
    }
}

/// 解析标签文件内容, 置信度列缺省时视为 1.0
pub fn parse_labels(text: &str, conf_threshold: f32) -> Result<Vec<Detection>> {
    let mut detections = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if parts.len() != 5 && parts.len() != 6 {
            bail!(
                "label line {}: expected 5 or 6 columns, got {}",
                line_no + 1,
                parts.len()
            );
        }

        let class_id: usize = parts[0]
            .parse()
            .with_context(|| format!("label line {}: bad class id", line_no + 1))?;
        let mut values = [1.0f32; 5];
        for (slot, part) in values.iter_mut().zip(&parts[1..]) {
            *slot = part
                .parse()
                .with_context(|| format!("label line {}: bad number {:?}", line_no + 1, part))?;
        }
        let [cx, cy, width, height, confidence] = values;

        if confidence < conf_threshold {
            continue;
        }

        detections.push(Detection {
            class_id,
            cx,
            cy,
            width,
            height,
            confidence,
        });
    }

    Ok(detections)
}

impl ObjectDetector for LabelFileDetector {
    fn detect(&mut self, frame: &Frame, conf_threshold: f32) -> Result<Option<Vec<Detection>>> {
        match read_optional(&self.label_path(&frame.id))? {
            Some(text) => parse_labels(&text, conf_threshold).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PoseEntry {
    bbox: [f32; 4],
    keypoints: Vec<[f32; 2]>,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

/// 姿态 JSON 文件估计器
pub struct PoseFileEstimator {
    poses_dir: PathBuf,
    conf_threshold: f32,
}

impl PoseFileEstimator {
    pub fn new(poses_dir: impl Into<PathBuf>, conf_threshold: f32) -> Self {
        Self {
            poses_dir: poses_dir.into(),
            conf_threshold,
        }
    }

    pub fn pose_path(&self, frame_id: &str) -> PathBuf {
        self.poses_dir.join(format!("{}.json", frame_id))
    }
}

/// 解析姿态 JSON, 过滤低置信度人体
pub fn parse_poses(text: &str, conf_threshold: f32) -> Result<Vec<PersonPose>> {
    let entries: Vec<PoseEntry> = serde_json::from_str(text).context("malformed pose json")?;

    Ok(entries
        .into_iter()
        .filter(|entry| entry.confidence >= conf_threshold)
        .map(|entry| {
            let [x1, y1, x2, y2] = entry.bbox;
            let points: Vec<Point2> = entry
                .keypoints
                .iter()
                .map(|&[x, y]| Point2::new(x, y))
                .collect();
            PersonPose::from_points(
                &points,
                BBox {
                    x1,
                    y1,
                    x2,
                    y2,
                    confidence: entry.confidence,
                },
            )
        })
        .collect())
}

impl PoseEstimator for PoseFileEstimator {
    /// 无姿态文件视为画面中无人
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<PersonPose>> {
        match read_optional(&self.pose_path(&frame.id))? {
            Some(text) => parse_poses(&text, self.conf_threshold),
            None => Ok(Vec::new()),
        }
    }
}
