// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 预处理与后处理
// 包含: letterbox 预处理、检测/姿态输出解码、NMS
// 推理本身由 onnx.rs 中的 ONNX Runtime 后端完成

use anyhow::{bail, Result};
use image::{imageops, RgbImage};
use ndarray::{s, Array, ArrayViewD, Axis, Ix2, Ix4};

use crate::detection::{BBox, Detection, PersonPose, Point2, NUM_KEYPOINTS};

/// YOLOv8 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YOLOTask {
    Detect,
    Pose,
}

/// YOLOv8 后处理配置
#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub task: YOLOTask,
    pub input_size: u32,
    pub conf: f32,
    pub kconf: f32,
    pub iou: f32,
    pub nk: usize,
}

impl Default for YOLOv8Config {
    fn default() -> Self {
        Self {
            task: YOLOTask::Detect,
            input_size: 640,
            conf: 0.3,
            kconf: 0.5,
            iou: 0.45,
            nk: NUM_KEYPOINTS,
        }
    }
}

/// letterbox 结果: NCHW 张量 + 缩放比例
pub struct Letterbox {
    pub tensor: Array<f32, Ix4>,
    pub ratio: f32,
}

/// 等比缩放到 `input_size` 方形画布左上角, 其余填充 144/255
pub fn letterbox(image: &RgbImage, input_size: u32) -> Letterbox {
    let (w0, h0) = image.dimensions();
    let ratio = (input_size as f32 / w0 as f32).min(input_size as f32 / h0 as f32);
    let w_new = ((w0 as f32 * ratio).round() as u32).clamp(1, input_size);
    let h_new = ((h0 as f32 * ratio).round() as u32).clamp(1, input_size);

    let resized = imageops::resize(image, w_new, h_new, imageops::FilterType::Triangle);

    let size = input_size as usize;
    let mut tensor = Array::from_elem((1, 3, size, size), 144.0f32 / 255.0);
    for (x, y, rgb) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = rgb.0;
        tensor[[0, 0, y, x]] = (r as f32) / 255.0;
        tensor[[0, 1, y, x]] = (g as f32) / 255.0;
        tensor[[0, 2, y, x]] = (b as f32) / 255.0;
    }

    Letterbox { tensor, ratio }
}

/// 解码后的候选框 (原图像素坐标)
#[derive(Debug, Clone)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    class_id: usize,
    confidence: f32,
    keypoints: Option<Vec<Point2>>,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, another: &Candidate) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        let inter = (r - l).max(0.0) * (b - t).max(0.0);
        let union = self.area() + another.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

fn non_max_suppression(xs: &mut Vec<Candidate>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// YOLOv8 后处理器
///
/// 输出格式: [batch, 4 + nc (+ 3 * nk), anchors]
/// - 前4行: cx, cy, w, h (letterbox 输入坐标)
/// - nc行:  各类别分数
/// - 姿态任务末尾 3 * nk 行: 每个关键点 (x, y, conf)
pub struct YOLOv8Postprocessor {
    config: YOLOv8Config,
}

impl YOLOv8Postprocessor {
    pub fn new(config: YOLOv8Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YOLOv8Config {
        &self.config
    }

    pub fn set_conf(&mut self, conf: f32) {
        self.config.conf = conf;
    }

    fn decode(
        &self,
        output: ArrayViewD<f32>,
        ratio: f32,
        width_original: f32,
        height_original: f32,
    ) -> Result<Vec<Candidate>> {
        const CXYWH_OFFSET: usize = 4;
        const KPT_STEP: usize = 3;

        if output.ndim() != 3 {
            bail!("expected 3-d output, got shape {:?}", output.shape());
        }
        let kpt_len = match self.config.task {
            YOLOTask::Pose => KPT_STEP * self.config.nk,
            YOLOTask::Detect => 0,
        };
        let channels = output.shape()[1];
        if channels <= CXYWH_OFFSET + kpt_len {
            bail!(
                "output has {} channels, too few for task {:?}",
                channels,
                self.config.task
            );
        }
        let nc = channels - CXYWH_OFFSET - kpt_len;

        let mut data = Vec::new();
        let anchor = output.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

            let Some((class_id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };

            if confidence < self.config.conf {
                continue;
            }

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;

            let keypoints = if kpt_len > 0 {
                let kpts = pred.slice(s![pred.len() - kpt_len..]);
                let mut kpts_ = Vec::with_capacity(self.config.nk);
                for i in 0..self.config.nk {
                    let kx = kpts[KPT_STEP * i] / ratio;
                    let ky = kpts[KPT_STEP * i + 1] / ratio;
                    let kconf = kpts[KPT_STEP * i + 2];
                    if kconf < self.config.kconf {
                        // 低置信度关键点按未检出处理
                        kpts_.push(Point2::default());
                    } else {
                        kpts_.push(Point2::new_with_conf(
                            kx.clamp(0.0, width_original),
                            ky.clamp(0.0, height_original),
                            kconf,
                        ));
                    }
                }
                Some(kpts_)
            } else {
                None
            };

            data.push(Candidate {
                x1: (cx - w / 2.0).clamp(0.0, width_original),
                y1: (cy - h / 2.0).clamp(0.0, height_original),
                x2: (cx + w / 2.0).clamp(0.0, width_original),
                y2: (cy + h / 2.0).clamp(0.0, height_original),
                class_id,
                confidence,
                keypoints,
            });
        }

        non_max_suppression(&mut data, self.config.iou);
        Ok(data)
    }

    /// 姿态输出 → 每人一组关键点
    pub fn poses(
        &self,
        output: ArrayViewD<f32>,
        ratio: f32,
        width_original: u32,
        height_original: u32,
    ) -> Result<Vec<PersonPose>> {
        let candidates = self.decode(
            output,
            ratio,
            width_original as f32,
            height_original as f32,
        )?;
        Ok(candidates
            .into_iter()
            .map(|c| {
                PersonPose::from_points(
                    c.keypoints.as_deref().unwrap_or_default(),
                    BBox {
                        x1: c.x1,
                        y1: c.y1,
                        x2: c.x2,
                        y2: c.y2,
                        confidence: c.confidence,
                    },
                )
            })
            .collect())
    }

    /// 检测输出 → 归一化 (cx, cy, w, h)
    pub fn detections(
        &self,
        output: ArrayViewD<f32>,
        ratio: f32,
        width_original: u32,
        height_original: u32,
    ) -> Result<Vec<Detection>> {
        let (w0, h0) = (width_original as f32, height_original as f32);
        let candidates = self.decode(output, ratio, w0, h0)?;
        Ok(candidates
            .into_iter()
            .map(|c| Detection {
                class_id: c.class_id,
                cx: (c.x1 + c.x2) / 2.0 / w0,
                cy: (c.y1 + c.y2) / 2.0 / h0,
                width: (c.x2 - c.x1) / w0,
                height: (c.y2 - c.y1) / h0,
                confidence: c.confidence,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::KeypointKind;
    use ndarray::Array3;

    #[test]
    fn test_letterbox_ratio_and_padding() {
        let image = RgbImage::from_pixel(320, 160, image::Rgb([255, 0, 0]));
        let lb = letterbox(&image, 640);
        assert_eq!(lb.ratio, 2.0);
        assert_eq!(lb.tensor.shape(), &[1, 3, 640, 640]);
        assert!((lb.tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert!((lb.tensor[[0, 0, 600, 10]] - 144.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_detections() {
        // 2个类别, 3个anchor
        let mut out = Array3::<f32>::zeros((1, 6, 3));
        // anchor 0: 类别1, 置信度0.9, 中心 (320, 240), 64x32
        for (c, v) in [320.0, 240.0, 64.0, 32.0, 0.1, 0.9].iter().enumerate() {
            out[[0, c, 0]] = *v;
        }
        // anchor 1: 与 anchor 0 重叠, 置信度较低 → 被NMS抑制
        for (c, v) in [322.0, 241.0, 64.0, 32.0, 0.0, 0.6].iter().enumerate() {
            out[[0, c, 1]] = *v;
        }
        // anchor 2: 低于阈值
        out[[0, 4, 2]] = 0.1;

        let post = YOLOv8Postprocessor::new(YOLOv8Config::default());
        let dets = post.detections(out.view().into_dyn(), 1.0, 640, 480).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert!((dets[0].cx - 0.5).abs() < 1e-6);
        assert!((dets[0].cy - 0.5).abs() < 1e-6);
        assert!((dets[0].width - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_decode_poses() {
        let nk = NUM_KEYPOINTS;
        let mut out = Array3::<f32>::zeros((1, 5 + 3 * nk, 1));
        for (c, v) in [200.0, 200.0, 100.0, 200.0, 0.8].iter().enumerate() {
            out[[0, c, 0]] = *v;
        }
        // 鼻子: 高置信度
        out[[0, 5, 0]] = 190.0;
        out[[0, 6, 0]] = 120.0;
        out[[0, 7, 0]] = 0.9;
        // 左肩: 低置信度 → 未检出
        let base = 5 + 3 * KeypointKind::LeftShoulder.idx();
        out[[0, base, 0]] = 220.0;
        out[[0, base + 1, 0]] = 150.0;
        out[[0, base + 2, 0]] = 0.2;

        let post = YOLOv8Postprocessor::new(YOLOv8Config {
            task: YOLOTask::Pose,
            conf: 0.5,
            ..Default::default()
        });
        // 原图 1280x960, 缩放比例 0.5
        let poses = post.poses(out.view().into_dyn(), 0.5, 1280, 960).unwrap();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].bbox.x1, 300.0);
        assert_eq!(poses[0].bbox.y2, 600.0);
        let nose = poses[0].keypoint(KeypointKind::Nose);
        assert_eq!((nose.x(), nose.y()), (380.0, 240.0));
        assert!(poses[0].keypoint(KeypointKind::LeftShoulder).is_absent());
    }

    #[test]
    fn test_bad_shape() {
        let out = Array3::<f32>::zeros((1, 4, 3));
        let post = YOLOv8Postprocessor::new(YOLOv8Config::default());
        assert!(post.detections(out.view().into_dyn(), 1.0, 10, 10).is_err());
    }
}
