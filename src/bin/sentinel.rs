// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 吸烟行为哨兵 (Smoking Sentinel)
///
/// 系统架构:
/// 1. 采集线程: 取帧 → 姿态/检测 → 融合 → 事件记录 (独立工作线程)
/// 2. 主线程:   消费周期简报, 输出最新标注帧预览
///
/// 子命令:
/// - run:   处理图片目录 (或单张图片) 组成的帧流
/// - query: 按日期区间查询事件图片
/// - list:  列出某个摄像头已保存的图片
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use smoking_sentinel::detection::ObjectLocator;
use smoking_sentinel::models::{
    self, LabelFileDetector, ModelHandle, ObjectDetector, PoseEstimator, PoseFileEstimator,
};
use smoking_sentinel::pipeline::{
    CaptureLoop, CycleReport, FrameOrchestrator, FrameSlot, ImageDirSource,
};
use smoking_sentinel::storage::{self, EventQuery, EventRecorder, JsonlEventStore};
use smoking_sentinel::SentinelConfig;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// 哨兵参数
#[derive(Parser, Debug)]
#[command(author, version, about = "吸烟行为哨兵 - 姿态 + 目标检测融合", long_about = None)]
struct Args {
    /// 配置文件 (不存在时创建默认配置)
    #[arg(short, long, default_value = "sentinel.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 处理帧流
    Run {
        /// 图片目录或单张图片
        #[arg(short, long)]
        input: PathBuf,

        /// 摄像头编号 (覆盖配置)
        #[arg(long)]
        camera: Option<u32>,

        /// 推理后端
        #[arg(short, long, value_enum, default_value_t = Backend::Sidecar)]
        backend: Backend,

        /// 目标置信度 (覆盖配置)
        #[arg(long)]
        object_conf: Option<f32>,

        /// 目标类别 (覆盖配置)
        #[arg(long)]
        target_class: Option<usize>,

        /// 事件图片上绘制确认区域
        #[arg(long)]
        highlight: bool,

        /// 最新标注帧写入此文件
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// 查询事件图片
    Query {
        /// 起始日期 YYYY-MM-DD
        #[arg(long)]
        from: String,

        /// 结束日期 YYYY-MM-DD (含)
        #[arg(long)]
        to: String,
    },

    /// 列出摄像头目录中的图片
    List {
        #[arg(long)]
        camera: Option<u32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    /// 读取预先导出的标签/姿态文件
    Sidecar,
    /// ONNX Runtime 推理 (需启用 `onnx` feature)
    Onnx,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smoking_sentinel=info,sentinel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = SentinelConfig::load(&args.config)?;

    match args.command {
        Command::Run {
            input,
            camera,
            backend,
            object_conf,
            target_class,
            highlight,
            preview,
        } => {
            if let Some(camera) = camera {
                config.camera_id = camera;
            }
            if let Some(conf) = object_conf {
                config.object_conf = conf;
            }
            if target_class.is_some() {
                config.target_class = target_class;
            }
            config.highlight_saved_frames |= highlight;
            run(&config, &input, backend, preview)
        }
        Command::Query { from, to } => query(&config, &from, &to),
        Command::List { camera } => list(&config, camera.unwrap_or(config.camera_id)),
    }
}

fn load_models(
    config: &SentinelConfig,
    backend: Backend,
) -> Result<(ModelHandle<dyn PoseEstimator>, ModelHandle<dyn ObjectDetector>)> {
    match backend {
        Backend::Sidecar => {
            info!("📦 离线回放: 标签 {:?}, 姿态 {:?}", config.labels_dir, config.poses_dir);
            Ok((
                models::pose_handle(PoseFileEstimator::new(&config.poses_dir, config.pose_conf)),
                models::detector_handle(LabelFileDetector::new(&config.labels_dir)),
            ))
        }
        #[cfg(feature = "onnx")]
        Backend::Onnx => {
            use smoking_sentinel::models::{OnnxObjectDetector, OnnxPoseEstimator, YOLOv8Config};

            let base = YOLOv8Config {
                input_size: config.input_size,
                kconf: config.keypoint_conf,
                iou: config.iou,
                ..Default::default()
            };
            info!("🦴 姿态模型: {:?}", config.pose_model);
            info!("📦 检测模型: {:?}", config.object_model);
            let pose = OnnxPoseEstimator::new(
                &config.pose_model,
                YOLOv8Config {
                    conf: config.pose_conf,
                    ..base.clone()
                },
            )?;
            let detector = OnnxObjectDetector::new(
                &config.object_model,
                YOLOv8Config {
                    conf: config.object_conf,
                    ..base
                },
            )?;
            Ok((models::pose_handle(pose), models::detector_handle(detector)))
        }
        #[cfg(not(feature = "onnx"))]
        Backend::Onnx => anyhow::bail!("this build has no ONNX backend, rebuild with `--features onnx`"),
    }
}

fn run(
    config: &SentinelConfig,
    input: &Path,
    backend: Backend,
    preview: Option<PathBuf>,
) -> Result<()> {
    info!("🚀 吸烟行为哨兵启动");
    config.log_summary();

    let (pose, detector) = load_models(config, backend)?;
    let store = Arc::new(JsonlEventStore::open(&config.store_path)?);
    let recorder = Arc::new(EventRecorder::new(&config.output_dir, store));
    let locator =
        ObjectLocator::new(detector, config.object_conf).with_target_class(config.target_class);
    let orchestrator = Arc::new(
        FrameOrchestrator::new(pose, locator, recorder)
            .with_highlight_saved_frames(config.highlight_saved_frames),
    );

    let source = ImageDirSource::open(input, config.camera_id)?;
    let slot = Arc::new(FrameSlot::new());
    let capture = CaptureLoop::spawn(Box::new(source), orchestrator, slot.clone())?;

    // 采集线程退出时简报通道关闭, 循环结束
    let mut seen = 0;
    for report in capture.reports().iter() {
        match report {
            CycleReport::Processed {
                frame_id,
                confirmed,
                saved,
                ..
            } => {
                if let Some(path) = saved {
                    info!("🚬 帧 {}: {} 处确认, 已保存 {:?}", frame_id, confirmed, path);
                }
            }
            CycleReport::Failed { frame_id, reason } => {
                warn!("⚠️ 帧 {} 跳过: {}", frame_id, reason);
            }
        }

        if let (Some(path), Some(latest)) = (&preview, slot.newer_than(seen)) {
            seen = latest.seq;
            if let Err(e) = latest.image.save(path) {
                warn!("⚠️ 预览帧写入失败 {:?}: {}", path, e);
            }
        }
    }

    let stats = capture.join()?;
    info!(
        "✅ 完成: {} 帧, {} 处理, {} 失败, {} 事件",
        stats.frames, stats.processed, stats.failed, stats.recorded
    );
    Ok(())
}

fn query(config: &SentinelConfig, from: &str, to: &str) -> Result<()> {
    let (start, end) = storage::parse_range(from, to)?;
    let store = Arc::new(JsonlEventStore::open(&config.store_path)?);
    let paths = EventQuery::new(store).query(start, end)?;
    if paths.is_empty() {
        info!("📭 {} ~ {} 无事件", start, end);
    }
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

fn list(config: &SentinelConfig, camera_id: u32) -> Result<()> {
    let dir = config.output_dir.join(format!("cam_{}", camera_id));
    let images = storage::captured_images(&dir)?;
    info!("📂 {:?}: {} 张图片", dir, images.len());
    for path in images {
        println!("{}", path.display());
    }
    Ok(())
}
