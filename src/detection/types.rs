// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 行为融合数据结构定义
/// Data structures for the behavior-fusion pipeline
use image::RgbImage;

// ========== 公共常量 ==========

/// YOLOv8-pose 关键点数量 (COCO-17)
pub const NUM_KEYPOINTS: usize = 17;

// ========== 枚举类型 ==========

/// 关键点索引, 顺序与上游姿态模型的输出布局一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypointKind {
    Nose = 0,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointKind {
    pub const fn idx(self) -> usize {
        self as usize
    }
}

/// 手臂 (左/右)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arm {
    Left,
    Right,
}

impl Arm {
    /// (肩, 肘, 腕)
    pub const fn joints(self) -> (KeypointKind, KeypointKind, KeypointKind) {
        match self {
            Arm::Left => (
                KeypointKind::LeftShoulder,
                KeypointKind::LeftElbow,
                KeypointKind::LeftWrist,
            ),
            Arm::Right => (
                KeypointKind::RightShoulder,
                KeypointKind::RightElbow,
                KeypointKind::RightWrist,
            ),
        }
    }

    pub const fn wrist(self) -> KeypointKind {
        self.joints().2
    }
}

// ========== 数据结构 ==========

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Point2 {
    // A point2d with x, y, conf
    x: f32,
    y: f32,
    confidence: f32,
}

impl Point2 {
    pub fn new_with_conf(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// 上游用 (0, 0) 表示未检出的关键点
    pub fn is_absent(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// 人体检测框 (x1, y1) 左上, (x2, y2) 右下, 像素坐标
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence: 1.0,
        }
    }
}

/// 单人姿态: 固定布局的关键点 + 人体框, 生命周期为一帧
#[derive(Clone, Debug, PartialEq)]
pub struct PersonPose {
    pub keypoints: [Point2; NUM_KEYPOINTS],
    pub bbox: BBox,
}

impl PersonPose {
    /// 从任意长度的关键点列表构建, 缺失的索引视为未检出
    pub fn from_points(points: &[Point2], bbox: BBox) -> Self {
        let mut keypoints = [Point2::default(); NUM_KEYPOINTS];
        for (slot, point) in keypoints.iter_mut().zip(points) {
            *slot = *point;
        }
        Self { keypoints, bbox }
    }

    pub fn keypoint(&self, kind: KeypointKind) -> Point2 {
        self.keypoints[kind.idx()]
    }
}

/// 候选区域 (手-嘴区域假设), 由一条弯曲的手臂推出
///
/// `y_min` 取腕部 y, `y_max` 取鼻子 y, 二者大小关系不做归一化.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateRegion {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
    pub arm: Arm,
    pub(crate) person: usize,
}

impl CandidateRegion {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32, arm: Arm) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
            arm,
            person: 0,
        }
    }

    /// y 区间 (小, 大)
    pub fn y_span(&self) -> (f32, f32) {
        (self.y_min.min(self.y_max), self.y_min.max(self.y_max))
    }
}

/// 归一化检测结果 (目标检测模型原始输出, 均在 [0, 1])
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// 像素空间目标框
///
/// 注意: `x_min`/`y_min` 直接沿用检测器的中心点坐标 (乘以帧宽高),
/// 下游 `centroid()` 在此基础上再加半宽半高, 两处必须保持一致.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectBox {
    pub x_min: f32,
    pub y_min: f32,
    pub width: f32,
    pub height: f32,
    pub class_id: usize,
    pub confidence: f32,
}

impl ObjectBox {
    pub fn centroid(&self) -> (f32, f32) {
        (
            self.x_min + self.width / 2.0,
            self.y_min + self.height / 2.0,
        )
    }
}

/// 一帧图像 (采集线程 → 编排器)
#[derive(Clone, Debug)]
pub struct Frame {
    pub id: String,
    pub camera_id: u32,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(id: impl Into<String>, camera_id: u32, image: RgbImage) -> Self {
        Self {
            id: id.into(),
            camera_id,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
