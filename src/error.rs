// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error taxonomy)

use std::path::PathBuf;

use chrono::NaiveDate;

/// 外部协作方 (模型 / 编码器 / 存储) 的底层错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// 姿态或检测模型失败, 本帧作废
    #[error("model inference failed for camera {camera_id}, frame {frame_id}")]
    ModelInference {
        camera_id: u32,
        frame_id: String,
        #[source]
        source: BoxError,
    },

    /// 事件图片或记录写入失败, 标注帧仍然返回
    ///
    /// `frame_id` 由编排器在交还调用方前补上, 直接调用记录器时为 `None`.
    #[error("failed to store event image {path:?} for camera {camera_id}, frame {}", frame_id.as_deref().unwrap_or("?"))]
    StorageWrite {
        camera_id: u32,
        frame_id: Option<String>,
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SentinelError {
    /// 为存储错误补上帧ID
    pub fn for_frame(self, id: &str) -> Self {
        match self {
            SentinelError::StorageWrite {
                camera_id,
                frame_id: None,
                path,
                source,
            } => SentinelError::StorageWrite {
                camera_id,
                frame_id: Some(id.to_string()),
                path,
                source,
            },
            other => other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid date {value:?}, expected YYYY-MM-DD")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("start date {start} is after end date {end}")]
    ReversedRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("event store I/O failed on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode event record")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt event record at {path:?} line {line}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
