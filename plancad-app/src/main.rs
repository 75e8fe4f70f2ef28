use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use plancad_config::{AppConfig, ConfigError};
use plancad_frontend::LaunchOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// plancad 布局编辑引擎的命令行演示。
#[derive(Debug, Parser)]
#[command(name = "plancad", version, about)]
struct Cli {
    /// 配置文件路径，默认读取 `PLANCAD_CONFIG` 或 `./config/default.toml`
    #[arg(long)]
    config: Option<PathBuf>,
    /// 要打开的 JSON 项目，覆盖配置中的 `project.path`
    #[arg(long)]
    project: Option<PathBuf>,
    /// 演示结束后把项目保存到该路径
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_configuration(cli.config);
    init_logging(&config);
    info!("启动 plancad");

    let options = LaunchOptions {
        project: cli.project,
        save: cli.save,
    };
    match plancad_frontend::run_cli_demo(&config, &options) {
        Ok(summary) => {
            if !summary.failed_commands.is_empty() {
                warn!(failed = summary.failed_commands.len(), "部分演示命令未成功");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "执行 CLI 演示失败");
            ExitCode::FAILURE
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
