// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧标注 (Frame annotation)
//! 人体框/骨架按人着色, 目标框绿色, 确认区域品红加粗

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detection::{CandidateRegion, ObjectBox, PersonPose};

/// COCO-17 骨架连线
pub const SKELETON: [(usize, usize); 16] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (11, 13),
    (12, 14),
    (13, 15),
    (14, 16),
];

const BRIGHT_COLORS: [Rgb<u8>; 8] = [
    Rgb([255, 0, 0]),   // 红色
    Rgb([0, 0, 255]),   // 蓝色
    Rgb([255, 255, 0]), // 黄色
    Rgb([0, 255, 255]), // 青色
    Rgb([255, 128, 0]), // 橙色
    Rgb([255, 0, 128]), // 粉红
    Rgb([0, 128, 255]), // 天蓝
    Rgb([128, 0, 255]), // 紫色
];

pub const OBJECT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const CONFIRMED_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const KEYPOINT_RADIUS: i32 = 3;

fn rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Rect {
    let (l, r) = (x1.min(x2), x1.max(x2));
    let (t, b) = (y1.min(y2), y1.max(y2));
    Rect::at(l.round() as i32, t.round() as i32)
        .of_size(((r - l).round() as u32).max(1), ((b - t).round() as u32).max(1))
}

/// 两像素宽的空心框
fn draw_thick_rect(image: &mut RgbImage, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb<u8>) {
    draw_hollow_rect_mut(image, rect(x1, y1, x2, y2), color);
    draw_hollow_rect_mut(image, rect(x1 + 1.0, y1 + 1.0, x2 - 1.0, y2 - 1.0), color);
}

pub fn draw_poses(image: &mut RgbImage, poses: &[PersonPose]) {
    for (i, pose) in poses.iter().enumerate() {
        let color = BRIGHT_COLORS[i % BRIGHT_COLORS.len()];
        let b = &pose.bbox;
        draw_hollow_rect_mut(image, rect(b.x1, b.y1, b.x2, b.y2), color);

        for &(a, z) in SKELETON.iter() {
            let (p, q) = (pose.keypoints[a], pose.keypoints[z]);
            if p.is_absent() || q.is_absent() {
                continue;
            }
            draw_line_segment_mut(image, (p.x(), p.y()), (q.x(), q.y()), color);
        }
        for kpt in pose.keypoints.iter().filter(|k| !k.is_absent()) {
            draw_filled_circle_mut(
                image,
                (kpt.x().round() as i32, kpt.y().round() as i32),
                KEYPOINT_RADIUS,
                color,
            );
        }
    }
}

/// 目标框: `x_min`/`y_min` 为检测中心, 按中心绘制
pub fn draw_objects(image: &mut RgbImage, boxes: &[ObjectBox]) {
    for b in boxes {
        let (hw, hh) = (b.width / 2.0, b.height / 2.0);
        draw_hollow_rect_mut(
            image,
            rect(b.x_min - hw, b.y_min - hh, b.x_min + hw, b.y_min + hh),
            OBJECT_COLOR,
        );
    }
}

pub fn highlight_regions(image: &mut RgbImage, regions: &[CandidateRegion]) {
    for r in regions {
        let (y1, y2) = r.y_span();
        draw_thick_rect(image, r.x_min, y1, r.x_max, y2, CONFIRMED_COLOR);
    }
}

/// 在副本上绘制全部结果, 原图不变
pub fn annotate(
    image: &RgbImage,
    poses: &[PersonPose],
    boxes: &[ObjectBox],
    confirmed: &[CandidateRegion],
) -> RgbImage {
    let mut canvas = image.clone();
    draw_poses(&mut canvas, poses);
    draw_objects(&mut canvas, boxes);
    highlight_regions(&mut canvas, confirmed);
    canvas
}
