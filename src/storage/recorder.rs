// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 事件记录 (Event recorder)
//! 确认帧 → `<root>/cam_<id>/YYYY-MM-DD_HH-MM-SS[_n].jpg` + 一条 EventRecord

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDateTime, Timelike};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{info, warn};

use super::store::{EventRecord, EventStore};
use crate::error::{BoxError, SentinelError};

const JPEG_QUALITY: u8 = 95;

pub struct EventRecorder {
    root: PathBuf,
    store: Arc<dyn EventStore>,
    camera_locks: Mutex<HashMap<u32, Arc<Mutex<()>>>>,
}

impl EventRecorder {
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn EventStore>) -> Self {
        Self {
            root: root.into(),
            store,
            camera_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn camera_dir(&self, camera_id: u32) -> PathBuf {
        self.root.join(format!("cam_{}", camera_id))
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// 以本地时间记录一帧
    pub fn record(&self, image: &RgbImage, camera_id: u32) -> Result<PathBuf, SentinelError> {
        self.record_at(image, camera_id, Local::now().naive_local())
    }

    /// 以指定时间记录一帧 (精确到秒)
    ///
    /// 同一秒内的多次记录依次得到 `_1`, `_2`, ... 后缀, 已有文件永不覆盖.
    /// 记录追加失败时删除刚写入的图片.
    pub fn record_at(
        &self,
        image: &RgbImage,
        camera_id: u32,
        at: NaiveDateTime,
    ) -> Result<PathBuf, SentinelError> {
        let at = at.with_nanosecond(0).unwrap_or(at);
        let dir = self.camera_dir(camera_id);
        let write_error = |path: &Path, source: BoxError| SentinelError::StorageWrite {
            camera_id,
            frame_id: None,
            path: path.to_path_buf(),
            source,
        };

        let camera_lock = self.camera_lock(camera_id);
        let _guard = camera_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        fs::create_dir_all(&dir).map_err(|e| write_error(&dir, e.into()))?;

        let stem = at.format("%Y-%m-%d_%H-%M-%S").to_string();
        let (path, mut file) = reserve(&dir, &stem).map_err(|e| write_error(&dir, e.into()))?;

        if let Err(source) = write_jpeg(&mut file, image) {
            discard(&path);
            return Err(write_error(&path, source));
        }

        let record = EventRecord {
            camera_id,
            date: at.date(),
            time: at.time(),
            path: path.to_string_lossy().replace('\\', "/"),
        };
        if let Err(e) = self.store.append(&record) {
            discard(&path);
            return Err(write_error(&path, e.into()));
        }

        info!("📸 摄像头 {} 记录事件: {}", camera_id, record.path);
        Ok(path)
    }

    fn camera_lock(&self, camera_id: u32) -> Arc<Mutex<()>> {
        let mut locks = self
            .camera_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(camera_id).or_default().clone()
    }
}

/// 以 create-new 方式占用第一个空闲文件名
fn reserve(dir: &Path, stem: &str) -> std::io::Result<(PathBuf, File)> {
    let mut n = 0u32;
    loop {
        let name = if n == 0 {
            format!("{}.jpg", stem)
        } else {
            format!("{}_{}.jpg", stem, n)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

fn write_jpeg(file: &mut File, image: &RgbImage) -> Result<(), BoxError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(image)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("⚠️ 无法删除未完成的事件图片 {:?}: {}", path, e);
    }
}
