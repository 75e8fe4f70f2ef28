pub mod cli;
pub mod errors;
pub mod loader;

use std::path::PathBuf;

use errors::FrontendError;
use plancad_config::AppConfig;
use plancad_core::document::SnapSettings;
use plancad_engine::EditorSettings;
use tracing::info;

pub use cli::DemoSummary;

/// 命令行指定的启动选项，优先于配置文件。
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub project: Option<PathBuf>,
    pub save: Option<PathBuf>,
}

/// 把配置文件中的编辑参数映射为引擎设置。
pub fn editor_settings(config: &AppConfig) -> EditorSettings {
    let editor = &config.editor;
    EditorSettings {
        history_capacity: editor.history_capacity,
        link_threshold: editor.link_threshold,
        link_mode: editor.link_mode,
        freehand_min_distance: editor.freehand_min_distance,
        freehand_tolerance: editor.freehand_tolerance,
        polyline_tolerance: editor.polyline_tolerance,
        avoid_overlap: editor.avoid_overlap,
        units_per_pixel: editor.units_per_pixel,
    }
}

pub fn snap_settings(config: &AppConfig) -> SnapSettings {
    SnapSettings {
        enabled: config.snap.enabled,
        grid_size: config.snap.grid_size,
    }
}

/// 启动 CLI 演示：打开项目或构建示例布局，执行命令并打印概览。
pub fn run_cli_demo(
    config: &AppConfig,
    options: &LaunchOptions,
) -> Result<DemoSummary, FrontendError> {
    info!("启动 CLI 演示前端");
    let project = options.project.as_deref().or(config.project.path.as_deref());
    let session = loader::open_session(config, project)?;
    cli::run_demo(session, options.save.as_deref())
}
