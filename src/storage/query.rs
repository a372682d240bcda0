// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 事件查询与图片浏览 (Event query & gallery)

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use super::store::EventStore;
use crate::error::{QueryError, SentinelError, StoreError};

/// 只读的事件查询
pub struct EventQuery {
    store: Arc<dyn EventStore>,
}

impl EventQuery {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// [start, end] 内的事件图片路径, 按日期排序
    ///
    /// 日期由调用方保证合法 (见 `parse_range`), 这里不再校验;
    /// start > end 时结果为空.
    pub fn query(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PathBuf>, SentinelError> {
        let records = self.store.records_between(start, end)?;
        debug!("🔎 查询 {} ~ {}: {} 条记录", start, end, records.len());
        Ok(records
            .into_iter()
            .map(|r| PathBuf::from(r.path.replace('\\', "/")))
            .collect())
    }
}

/// 解析并校验 `YYYY-MM-DD` 日期区间
pub fn parse_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), QueryError> {
    let parse = |value: &str| {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|source| {
            QueryError::InvalidDate {
                value: value.to_string(),
                source,
            }
        })
    };
    let (start, end) = (parse(start)?, parse(end)?);
    if start > end {
        return Err(QueryError::ReversedRange { start, end });
    }
    Ok((start, end))
}

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 摄像头目录下的所有图片, 按文件名排序; 目录不存在时为空
pub fn captured_images(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let io_error = |source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(e)),
    };

    let mut images = Vec::new();
    for entry in entries {
        let path = entry.map_err(io_error)?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_image && path.is_file() {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// 图片轮播, 前后翻页首尾循环
#[derive(Debug, Clone)]
pub struct Gallery {
    paths: Vec<PathBuf>,
    current: usize,
}

impl Gallery {
    /// 空列表返回 `None`; 起始位置越界时取模
    pub fn new(paths: Vec<PathBuf>, start: usize) -> Option<Self> {
        if paths.is_empty() {
            return None;
        }
        let current = start % paths.len();
        Some(Self { paths, current })
    }

    pub fn current(&self) -> &Path {
        &self.paths[self.current]
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn next(&mut self) -> &Path {
        self.current = (self.current + 1) % self.paths.len();
        self.current()
    }

    pub fn previous(&mut self) -> &Path {
        self.current = (self.current + self.paths.len() - 1) % self.paths.len();
        self.current()
    }
}
