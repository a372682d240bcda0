// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 关节角度几何 (Angle geometry)

use super::types::Point2;

/// 肘部弯曲角的余弦: 向量 肘→肩 与 肘→腕 的余弦相似度
///
/// 任一关键点未检出, 或出现零长度向量 (重合点) 时返回 `None`,
/// 调用方应将其视为 "未弯曲".
pub fn cosine_of_flexion(shoulder: &Point2, elbow: &Point2, wrist: &Point2) -> Option<f32> {
    if shoulder.is_absent() || elbow.is_absent() || wrist.is_absent() {
        return None;
    }

    let v1x = shoulder.x() - elbow.x();
    let v1y = shoulder.y() - elbow.y();
    let v2x = wrist.x() - elbow.x();
    let v2y = wrist.y() - elbow.y();

    let dot = v1x * v2x + v1y * v2y;
    let mag1 = v1x.hypot(v1y);
    let mag2 = v2x.hypot(v2y);

    if mag1 < 1e-6 || mag2 < 1e-6 {
        return None;
    }

    Some((dot / (mag1 * mag2)).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_angle() {
        let cos = cosine_of_flexion(
            &Point2::new(100.0, 50.0),
            &Point2::new(100.0, 100.0),
            &Point2::new(150.0, 100.0),
        )
        .unwrap();
        assert!(cos.abs() < 1e-6);
    }

    #[test]
    fn test_straight_arm() {
        let cos = cosine_of_flexion(
            &Point2::new(100.0, 50.0),
            &Point2::new(100.0, 100.0),
            &Point2::new(100.0, 150.0),
        )
        .unwrap();
        assert!((cos + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_folded_arm() {
        // 3-4-5 三角形: cos = 0.6
        let cos = cosine_of_flexion(
            &Point2::new(105.0, 100.0),
            &Point2::new(100.0, 100.0),
            &Point2::new(103.0, 96.0),
        )
        .unwrap();
        assert!((cos - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_absent_point_is_undefined() {
        let elbow = Point2::new(100.0, 100.0);
        let p = Point2::new(150.0, 120.0);
        assert_eq!(cosine_of_flexion(&Point2::default(), &elbow, &p), None);
        assert_eq!(cosine_of_flexion(&p, &Point2::default(), &p), None);
        assert_eq!(cosine_of_flexion(&p, &elbow, &Point2::default()), None);
    }

    #[test]
    fn test_coincident_points_are_undefined() {
        let elbow = Point2::new(100.0, 100.0);
        let cos = cosine_of_flexion(&elbow, &elbow, &Point2::new(10.0, 10.0));
        assert_eq!(cos, None);
    }

    #[test]
    fn test_range() {
        let elbow = Point2::new(320.0, 240.0);
        let targets = [
            (1.0, 2.0),
            (640.0, 1.0),
            (319.0, 480.0),
            (17.5, 240.0),
            (320.5, 239.5),
        ];
        for s in targets {
            for w in targets {
                let cos = cosine_of_flexion(
                    &Point2::new(s.0, s.1),
                    &elbow,
                    &Point2::new(w.0, w.1),
                )
                .unwrap();
                assert!((-1.0..=1.0).contains(&cos), "cos {} out of range", cos);
            }
        }
    }
}
