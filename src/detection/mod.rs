// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 行为检测核心 (Behavior Detection Core)
///
/// 单帧纯几何推理, 无副作用:
/// - geometry: 关节弯曲角
/// - posture:  手-嘴候选区域
/// - locator:  目标框像素化
/// - fusion:   区域 × 目标框 → 确认行为
pub mod fusion;
pub mod geometry;
pub mod locator;
pub mod posture;
pub mod types;

pub use fusion::confirm;
pub use geometry::cosine_of_flexion;
pub use locator::ObjectLocator;
pub use posture::find_candidate_regions;
pub use types::{
    Arm, BBox, CandidateRegion, Detection, Frame, KeypointKind, ObjectBox, PersonPose, Point2,
    NUM_KEYPOINTS,
};
