// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 事件存储 (Event store)
//! 追加写入的 JSON-lines 文件, 每行一条 `EventRecord`

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// 一次确认事件: 哪个摄像头, 何时, 图片存在哪里
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub camera_id: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// 图片路径, 统一使用 `/` 分隔
    pub path: String,
}

pub trait EventStore: Send + Sync {
    fn append(&self, record: &EventRecord) -> Result<(), StoreError>;

    /// 日期在 [start, end] 内的记录, 按日期排序, 同一天内保持写入顺序
    fn records_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EventRecord>, StoreError>;
}

pub struct JsonlEventStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlEventStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl EventStore for JsonlEventStore {
    fn append(&self, record: &EventRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        // 锁只保护文件追加, 中毒不影响文件内容
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| self.io_error(e))?;
        file.sync_data().map_err(|e| self.io_error(e))
    }

    fn records_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut lines: Vec<&str> = text.split('\n').collect();
        // 末尾无换行的行仍在写入中, 跳过
        lines.pop();

        let mut records = Vec::new();
        for (idx, line) in lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: EventRecord =
                serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                    path: self.path.clone(),
                    line: idx + 1,
                    source,
                })?;
            if start <= record.date && record.date <= end {
                records.push(record);
            }
        }

        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}
