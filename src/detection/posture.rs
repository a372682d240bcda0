// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 姿态分类器 (Posture classifier)
//!
//! 职责: 扫描每个人的左右手臂 → 肘部弯曲达标 → 输出手-嘴候选区域

use std::ops::Range;

use super::geometry::cosine_of_flexion;
use super::types::{Arm, CandidateRegion, KeypointKind, PersonPose};

/// 弯曲余弦区间 [0.5, 1.0): 约 0°~60° 的夹角, 不含完全重合 (cos = 1)
pub const FLEXION_RANGE: Range<f32> = 0.5..1.0;

/// 余弦是否落在弯曲区间内, 未定义 (`None`) 永远不达标
pub fn is_flexed(cosine: Option<f32>) -> bool {
    cosine.is_some_and(|c| FLEXION_RANGE.contains(&c))
}

/// 单条手臂的弯曲余弦
pub fn arm_cosine(pose: &PersonPose, arm: Arm) -> Option<f32> {
    let (shoulder, elbow, wrist) = arm.joints();
    cosine_of_flexion(
        &pose.keypoint(shoulder),
        &pose.keypoint(elbow),
        &pose.keypoint(wrist),
    )
}

/// 查找所有人的候选区域, 每人 0~2 个 (先左臂后右臂)
pub fn find_candidate_regions(poses: &[PersonPose]) -> Vec<CandidateRegion> {
    let mut regions = Vec::new();

    for (person, pose) in poses.iter().enumerate() {
        for arm in [Arm::Left, Arm::Right] {
            if !is_flexed(arm_cosine(pose, arm)) {
                continue;
            }

            // 横向范围取人体框, 纵向从腕部到鼻子 (可能倒置)
            regions.push(CandidateRegion {
                x_min: pose.bbox.x1,
                y_min: pose.keypoint(arm.wrist()).y(),
                x_max: pose.bbox.x2,
                y_max: pose.keypoint(KeypointKind::Nose).y(),
                arm,
                person,
            });
        }
    }

    regions
}
