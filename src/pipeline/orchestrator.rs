// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 单帧编排 (Frame orchestration)
//!
//! 姿态模型 → 候选区域 → 目标框 → 融合 → 记录 → 标注

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbImage;
use tracing::{debug, info, warn};

use super::renderer;
use crate::detection::{
    confirm, find_candidate_regions, CandidateRegion, Frame, ObjectBox, ObjectLocator,
};
use crate::error::SentinelError;
use crate::models::{self, ModelHandle, PoseEstimator};
use crate::storage::EventRecorder;

/// 本帧的事件记录结果
#[derive(Debug)]
pub enum Recording {
    /// 没有确认区域, 未记录
    Skipped,
    Saved(PathBuf),
    /// 记录失败, 标注帧照常返回
    Failed(SentinelError),
}

/// 一帧的完整处理结果
#[derive(Debug)]
pub struct FrameReport {
    pub frame_id: String,
    pub camera_id: u32,
    pub annotated: RgbImage,
    pub people: usize,
    pub candidates: Vec<CandidateRegion>,
    pub boxes: Vec<ObjectBox>,
    pub confirmed: Vec<CandidateRegion>,
    pub recording: Recording,
}

impl FrameReport {
    pub fn saved_path(&self) -> Option<&Path> {
        match &self.recording {
            Recording::Saved(path) => Some(path),
            _ => None,
        }
    }
}

pub struct FrameOrchestrator {
    pose: ModelHandle<dyn PoseEstimator>,
    locator: ObjectLocator,
    recorder: Arc<EventRecorder>,
    highlight_saved_frames: bool,
    frame_counters: Mutex<HashMap<u32, u64>>,
}

impl FrameOrchestrator {
    pub fn new(
        pose: ModelHandle<dyn PoseEstimator>,
        locator: ObjectLocator,
        recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            pose,
            locator,
            recorder,
            highlight_saved_frames: false,
            frame_counters: Mutex::new(HashMap::new()),
        }
    }

    /// 保存的事件图片上也绘制确认区域
    pub fn with_highlight_saved_frames(mut self, enabled: bool) -> Self {
        self.highlight_saved_frames = enabled;
        self
    }

    /// 处理一帧, 帧ID按摄像头自动编号 (`cam<id>_<n>`)
    pub fn process(&self, image: RgbImage, camera_id: u32) -> Result<FrameReport, SentinelError> {
        let frame = Frame::new(self.next_frame_id(camera_id), camera_id, image);
        self.process_frame(&frame)
    }

    pub fn process_frame(&self, frame: &Frame) -> Result<FrameReport, SentinelError> {
        let camera_id = frame.camera_id;
        let inference_error = |source: anyhow::Error| SentinelError::ModelInference {
            camera_id,
            frame_id: frame.id.clone(),
            source: source.into(),
        };

        let poses = models::with_model(&self.pose, |pose| pose.estimate(frame))
            .map_err(inference_error)?;
        let candidates = find_candidate_regions(&poses);
        let boxes = self
            .locator
            .detections_for_frame(frame)
            .map_err(inference_error)?;
        let confirmed = confirm(&candidates, &boxes);

        debug!(
            "🧮 帧 {}: {} 人, {} 个候选区域, {} 个目标框, {} 个确认",
            frame.id,
            poses.len(),
            candidates.len(),
            boxes.len(),
            confirmed.len()
        );

        let annotated = renderer::annotate(&frame.image, &poses, &boxes, &confirmed);

        let recording = if confirmed.is_empty() {
            Recording::Skipped
        } else {
            info!(
                "🚬 摄像头 {} 帧 {} 检测到吸烟行为 ({} 处)",
                camera_id,
                frame.id,
                confirmed.len()
            );
            let result = if self.highlight_saved_frames {
                let mut saved = frame.image.clone();
                renderer::highlight_regions(&mut saved, &confirmed);
                self.recorder.record(&saved, camera_id)
            } else {
                self.recorder.record(&frame.image, camera_id)
            };
            match result {
                Ok(path) => Recording::Saved(path),
                Err(e) => {
                    let e = e.for_frame(&frame.id);
                    warn!("⚠️ 事件记录失败: {}", e);
                    Recording::Failed(e)
                }
            }
        };

        Ok(FrameReport {
            frame_id: frame.id.clone(),
            camera_id,
            annotated,
            people: poses.len(),
            candidates,
            boxes,
            confirmed,
            recording,
        })
    }

    fn next_frame_id(&self, camera_id: u32) -> String {
        let mut counters = self
            .frame_counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let n = counters.entry(camera_id).or_insert(0);
        *n += 1;
        format!("cam{}_{:06}", camera_id, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, Detection, KeypointKind, PersonPose, Point2, NUM_KEYPOINTS};
    use crate::models::{detector_handle, pose_handle, ObjectDetector};
    use crate::error::StoreError;
    use crate::storage::{EventRecord, EventStore, JsonlEventStore};
    use anyhow::{anyhow, Result};
    use chrono::{Local, NaiveDate};
    use std::fs;

    struct FakePose(Vec<PersonPose>);

    impl PoseEstimator for FakePose {
        fn estimate(&mut self, _frame: &Frame) -> Result<Vec<PersonPose>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenPose;

    impl PoseEstimator for BrokenPose {
        fn estimate(&mut self, _frame: &Frame) -> Result<Vec<PersonPose>> {
            Err(anyhow!("gpu on fire"))
        }
    }

    struct FakeDetector(Option<Vec<Detection>>);

    impl ObjectDetector for FakeDetector {
        fn detect(&mut self, _frame: &Frame, _conf: f32) -> Result<Option<Vec<Detection>>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenDetector;

    impl ObjectDetector for BrokenDetector {
        fn detect(&mut self, _frame: &Frame, _conf: f32) -> Result<Option<Vec<Detection>>> {
            Err(anyhow!("weights missing"))
        }
    }

    struct BrokenStore;

    impl EventStore for BrokenStore {
        fn append(&self, _record: &EventRecord) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: PathBuf::from("broken"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            })
        }

        fn records_between(
            &self,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<EventRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// 左臂弯曲 (cos = 0.6), 候选区域 x ∈ [120, 300], y ∈ [100, 240]
    fn smoker() -> PersonPose {
        let mut points = [Point2::default(); NUM_KEYPOINTS];
        points[KeypointKind::Nose.idx()] = Point2::new(200.0, 100.0);
        points[KeypointKind::LeftShoulder.idx()] = Point2::new(250.0, 200.0);
        points[KeypointKind::LeftElbow.idx()] = Point2::new(250.0, 300.0);
        points[KeypointKind::LeftWrist.idx()] = Point2::new(170.0, 240.0);
        PersonPose::from_points(&points, BBox::new(120.0, 60.0, 300.0, 500.0))
    }

    fn cigarette(cx: f32, cy: f32) -> Detection {
        Detection {
            class_id: 0,
            cx,
            cy,
            width: 0.05,
            height: 0.05,
            confidence: 0.8,
        }
    }

    struct Rig {
        root: PathBuf,
        store: Arc<JsonlEventStore>,
        orchestrator: FrameOrchestrator,
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("sentinel-orch-{}", rand::random::<u64>()))
    }

    fn orchestrator(
        root: &Path,
        pose: impl PoseEstimator + 'static,
        detector: impl ObjectDetector + 'static,
        store: Arc<dyn EventStore>,
    ) -> FrameOrchestrator {
        let recorder = Arc::new(EventRecorder::new(root.join("detected"), store));
        let locator = ObjectLocator::new(detector_handle(detector), 0.3);
        FrameOrchestrator::new(pose_handle(pose), locator, recorder)
    }

    fn rig(pose: impl PoseEstimator + 'static, dets: Option<Vec<Detection>>) -> Rig {
        let root = temp_root();
        let store = Arc::new(JsonlEventStore::open(root.join("events.jsonl")).unwrap());
        let orchestrator = orchestrator(&root, pose, FakeDetector(dets), store.clone());
        Rig {
            root,
            store,
            orchestrator,
        }
    }

    fn today_records(store: &JsonlEventStore) -> usize {
        let today = Local::now().date_naive();
        store.records_between(today, today).unwrap().len()
    }

    #[test]
    fn test_object_at_mouth_is_recorded() {
        // 640x480: 质心 (208, 180) 落在候选区域内
        let rig = rig(FakePose(vec![smoker()]), Some(vec![cigarette(0.3, 0.35)]));
        let image = RgbImage::new(640, 480);
        let report = rig.orchestrator.process(image.clone(), 7).unwrap();

        assert_eq!(report.frame_id, "cam7_000001");
        assert_eq!(report.confirmed.len(), 1);
        let saved = report.saved_path().unwrap().to_path_buf();
        assert!(saved.starts_with(rig.root.join("detected").join("cam_7")));
        // 保存的是原始帧
        let on_disk = image::open(&saved).unwrap().to_rgb8();
        assert_eq!(on_disk.dimensions(), (640, 480));
        assert_ne!(report.annotated, image);

        let today = Local::now().date_naive();
        let records = rig.store.records_between(today, today).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].camera_id, 7);
        fs::remove_dir_all(&rig.root).ok();
    }

    #[test]
    fn test_object_elsewhere_is_not_recorded() {
        let rig = rig(FakePose(vec![smoker()]), Some(vec![cigarette(0.8, 0.35)]));
        let report = rig.orchestrator.process(RgbImage::new(640, 480), 0).unwrap();

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.boxes.len(), 1);
        assert!(report.confirmed.is_empty());
        assert!(matches!(report.recording, Recording::Skipped));
        assert_eq!(report.annotated.dimensions(), (640, 480));
        assert_eq!(today_records(&rig.store), 0);
        fs::remove_dir_all(&rig.root).ok();
    }

    #[test]
    fn test_no_people_no_recording() {
        let rig = rig(FakePose(Vec::new()), None);
        let report = rig.orchestrator.process(RgbImage::new(64, 48), 0).unwrap();
        assert_eq!(report.people, 0);
        assert!(report.candidates.is_empty());
        assert!(matches!(report.recording, Recording::Skipped));
        assert_eq!(today_records(&rig.store), 0);
        fs::remove_dir_all(&rig.root).ok();
    }

    #[test]
    fn test_model_failure_names_frame() {
        let rig = rig(BrokenPose, None);
        let err = rig
            .orchestrator
            .process(RgbImage::new(8, 8), 2)
            .unwrap_err();
        match err {
            SentinelError::ModelInference {
                camera_id,
                frame_id,
                ..
            } => {
                assert_eq!(camera_id, 2);
                assert_eq!(frame_id, "cam2_000001");
            }
            other => panic!("unexpected error: {other}"),
        }
        fs::remove_dir_all(&rig.root).ok();
    }

    #[test]
    fn test_failed_recording_still_returns_frame() {
        let root = temp_root();
        let o = orchestrator(
            &root,
            FakePose(vec![smoker()]),
            FakeDetector(Some(vec![cigarette(0.3, 0.35)])),
            Arc::new(BrokenStore),
        );
        let image = RgbImage::new(640, 480);
        let report = o.process(image.clone(), 5).unwrap();

        assert_eq!(report.confirmed.len(), 1);
        assert!(report.saved_path().is_none());
        match &report.recording {
            Recording::Failed(SentinelError::StorageWrite {
                camera_id,
                frame_id,
                ..
            }) => {
                assert_eq!(*camera_id, 5);
                assert_eq!(frame_id.as_deref(), Some("cam5_000001"));
            }
            other => panic!("unexpected recording: {other:?}"),
        }
        assert_eq!(report.annotated.dimensions(), (640, 480));
        assert_ne!(report.annotated, image);

        let leftover = fs::read_dir(root.join("detected").join("cam_5"))
            .unwrap()
            .count();
        assert_eq!(leftover, 0);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_detector_failure_names_frame() {
        let root = temp_root();
        let store = Arc::new(JsonlEventStore::open(root.join("events.jsonl")).unwrap());
        let o = orchestrator(&root, FakePose(vec![smoker()]), BrokenDetector, store.clone());
        o.process(RgbImage::new(8, 8), 3).unwrap_err();
        let err = o.process(RgbImage::new(8, 8), 3).unwrap_err();
        match err {
            SentinelError::ModelInference {
                camera_id,
                frame_id,
                ..
            } => {
                assert_eq!(camera_id, 3);
                assert_eq!(frame_id, "cam3_000002");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(today_records(&store), 0);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_frame_ids_are_per_camera() {
        let rig = rig(FakePose(Vec::new()), None);
        let o = &rig.orchestrator;
        assert_eq!(o.process(RgbImage::new(4, 4), 1).unwrap().frame_id, "cam1_000001");
        assert_eq!(o.process(RgbImage::new(4, 4), 1).unwrap().frame_id, "cam1_000002");
        assert_eq!(o.process(RgbImage::new(4, 4), 2).unwrap().frame_id, "cam2_000001");
        fs::remove_dir_all(&rig.root).ok();
    }
}
