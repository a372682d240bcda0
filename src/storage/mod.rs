// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 事件持久化 (Event persistence)
///
/// - store:    追加写入的事件表 (JSON-lines)
/// - recorder: 确认帧落盘 + 追加记录
/// - query:    按日期区间查询, 图片浏览
pub mod query;
pub mod recorder;
pub mod store;

pub use query::{captured_images, parse_range, EventQuery, Gallery};
pub use recorder::EventRecorder;
pub use store::{EventRecord, EventStore, JsonlEventStore};
