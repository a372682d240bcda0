// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运行配置 - 通过JSON文件调整参数

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 哨兵运行参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    // === 摄像头与存储 ===
    pub camera_id: u32,               // 摄像头编号
    pub output_dir: PathBuf,          // 事件图片根目录
    pub store_path: PathBuf,          // 事件记录文件
    pub highlight_saved_frames: bool, // 事件图片上绘制确认区域

    // === 模型 ===
    pub pose_model: PathBuf,         // 姿态模型 (onnx)
    pub object_model: PathBuf,       // 目标检测模型 (onnx)
    pub input_size: u32,             // 模型输入尺寸
    pub target_class: Option<usize>, // 只保留该类别, None 为全部

    // === 阈值 ===
    pub pose_conf: f32,     // 人体置信度
    pub keypoint_conf: f32, // 关键点置信度
    pub object_conf: f32,   // 目标置信度
    pub iou: f32,           // NMS IOU阈值

    // === 离线回放 ===
    pub labels_dir: PathBuf, // YOLO 标签目录
    pub poses_dir: PathBuf,  // 姿态 JSON 目录
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            camera_id: 0,
            output_dir: PathBuf::from("detected"),
            store_path: PathBuf::from("smoking_pics.jsonl"),
            highlight_saved_frames: false,

            pose_model: PathBuf::from("models/yolov8s-pose.onnx"),
            object_model: PathBuf::from("models/v8s.onnx"),
            input_size: 640,
            target_class: None,

            pose_conf: 0.5,
            keypoint_conf: 0.5,
            object_conf: 0.3,
            iou: 0.45,

            labels_dir: PathBuf::from("runs/detect/predict/labels"),
            poses_dir: PathBuf::from("runs/pose/predict/poses"),
        }
    }
}

impl SentinelConfig {
    /// 读取配置文件, 文件不存在时返回 `None`
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("failed to read config {:?}", path)),
        };
        let config = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse config {:?}", path))?;
        Ok(Some(config))
    }

    /// 从JSON文件加载配置, 不存在则创建默认配置
    pub fn load(path: &Path) -> Result<Self> {
        match Self::try_load(path)? {
            Some(config) => {
                info!("✅ 配置已从 {:?} 加载", path);
                Ok(config)
            }
            None => {
                info!("📝 配置文件不存在, 创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("⚠️ 默认配置未能写入 {:?}: {:#}", path, e);
                }
                Ok(config)
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json).with_context(|| format!("failed to write config {:?}", path))?;
        info!("💾 配置已保存到 {:?}", path);
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️ 当前配置:");
        info!("  摄像头: {}", self.camera_id);
        info!("  事件目录: {:?}, 记录文件: {:?}", self.output_dir, self.store_path);
        info!(
            "  置信度: 人体 {:.2}, 关键点 {:.2}, 目标 {:.2}",
            self.pose_conf, self.keypoint_conf, self.object_conf
        );
        if let Some(class_id) = self.target_class {
            info!("  目标类别: {}", class_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("sentinel-cfg-{}", rand::random::<u64>()))
            .join("sentinel.json")
    }

    #[test]
    fn test_load_creates_default() {
        let path = temp_path();
        let config = SentinelConfig::load(&path).unwrap();
        assert_eq!(config, SentinelConfig::default());
        assert!(path.exists());
        fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_save_load_round_trip() {
        let path = temp_path();
        let config = SentinelConfig {
            camera_id: 4,
            object_conf: 0.45,
            target_class: Some(2),
            highlight_saved_frames: true,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SentinelConfig::try_load(&path).unwrap(), Some(config));
        fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"camera_id": 9}"#).unwrap();
        let config = SentinelConfig::try_load(&path).unwrap().unwrap();
        assert_eq!(config.camera_id, 9);
        assert_eq!(config.pose_conf, 0.5);

        fs::write(&path, "{").unwrap();
        assert!(SentinelConfig::try_load(&path).is_err());
        fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
