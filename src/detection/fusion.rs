// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 行为融合 (Behavior fusion)
//!
//! 候选区域 × 目标框: 目标框中心点落入区域即确认行为

use super::types::{CandidateRegion, ObjectBox};

/// 中心点包含判定
///
/// y 区间按 (小, 大) 比较, 腕部在鼻子上方或下方两种姿态都能命中.
pub fn crossing(region: &CandidateRegion, object: &ObjectBox) -> bool {
    let (cx, cy) = object.centroid();
    let (y_low, y_high) = region.y_span();
    (region.x_min..=region.x_max).contains(&cx) && (y_low..=y_high).contains(&cy)
}

/// 返回被确认的候选区域, 保持输入顺序, 每个区域最多出现一次
pub fn confirm(regions: &[CandidateRegion], boxes: &[ObjectBox]) -> Vec<CandidateRegion> {
    regions
        .iter()
        .filter(|region| boxes.iter().any(|object| crossing(region, object)))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::Arm;

    fn object(x: f32, y: f32, w: f32, h: f32) -> ObjectBox {
        ObjectBox {
            x_min: x,
            y_min: y,
            width: w,
            height: h,
            class_id: 0,
            confidence: 0.8,
        }
    }

    #[test]
    fn test_centroid_inside() {
        let region = CandidateRegion::new(100.0, 100.0, 300.0, 250.0, Arm::Left);
        // 中心点 (200, 175)
        assert!(crossing(&region, &object(190.0, 170.0, 20.0, 10.0)));
    }

    #[test]
    fn test_inverted_and_upright_regions() {
        // 腕部在鼻子下方 (y_min > y_max)
        let below = CandidateRegion::new(100.0, 250.0, 300.0, 100.0, Arm::Left);
        // 腕部在鼻子上方
        let above = CandidateRegion::new(100.0, 100.0, 300.0, 250.0, Arm::Right);
        let cigarette = object(190.0, 170.0, 20.0, 10.0);
        assert!(crossing(&below, &cigarette));
        assert!(crossing(&above, &cigarette));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let region = CandidateRegion::new(100.0, 100.0, 300.0, 250.0, Arm::Left);
        // 中心点恰好 (300, 250)
        assert!(crossing(&region, &object(290.0, 240.0, 20.0, 20.0)));
    }

    #[test]
    fn test_outside_never_confirms() {
        let region = CandidateRegion::new(100.0, 100.0, 300.0, 250.0, Arm::Left);
        assert!(!crossing(&region, &object(500.0, 400.0, 20.0, 20.0)));
        // x 命中但 y 不命中
        assert!(!crossing(&region, &object(190.0, 400.0, 20.0, 20.0)));
        // y 命中但 x 不命中
        assert!(!crossing(&region, &object(10.0, 170.0, 20.0, 20.0)));
    }

    #[test]
    fn test_confirm_keeps_order_and_dedups() {
        let a = CandidateRegion::new(0.0, 0.0, 100.0, 100.0, Arm::Left);
        let b = CandidateRegion::new(200.0, 0.0, 300.0, 100.0, Arm::Right);
        let c = CandidateRegion::new(400.0, 0.0, 500.0, 100.0, Arm::Left);
        let boxes = [
            object(240.0, 40.0, 10.0, 10.0),
            object(40.0, 40.0, 10.0, 10.0),
            object(45.0, 45.0, 10.0, 10.0),
        ];
        let confirmed = confirm(&[a, b, c], &boxes);
        assert_eq!(confirmed, vec![a, b]);
    }

    #[test]
    fn test_confirm_empty_inputs() {
        let a = CandidateRegion::new(0.0, 0.0, 100.0, 100.0, Arm::Left);
        assert!(confirm(&[a], &[]).is_empty());
        assert!(confirm(&[], &[object(40.0, 40.0, 10.0, 10.0)]).is_empty());
    }
}
