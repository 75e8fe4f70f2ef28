use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use plancad_core::document::Shape;
use plancad_engine::{CommandBus, CommandContext, CommandRequest, DocumentStore};
use plancad_io::JsonProjectFacade;
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{LoadedSession, ProjectSource};

/// 演示中依次执行的命令。
pub const DEMO_SCRIPT: &[&str] = &[
    "check_collisions",
    "focus_selection",
    "duplicate_selection 0 120",
    "check_collisions",
    "undo",
    "toggle_link_mode",
    "clear_selection",
];

/// 演示结束时的文档概览。
#[derive(Debug, Clone)]
pub struct DemoSummary {
    pub source: ProjectSource,
    pub pages: usize,
    pub layers: usize,
    pub elements: usize,
    pub kinds: BTreeMap<&'static str, usize>,
    pub catalog_entries: usize,
    pub catalog_total: f64,
    pub collisions: usize,
    pub failed_commands: Vec<String>,
    pub undo_depth: usize,
    pub saved_to: Option<PathBuf>,
}

/// 简易 CLI 演示：执行命令脚本，打印文档概览，按需保存项目。
pub fn run_demo(session: LoadedSession, save: Option<&Path>) -> Result<DemoSummary, FrontendError> {
    let LoadedSession {
        mut store,
        source,
        reports,
        ..
    } = session;

    println!("plancad 布局编辑 CLI 演示");
    match &source {
        ProjectSource::File(path) => {
            println!("已打开项目：{}", path.display());
            let repaired = reports.iter().filter(|report| !report.is_clean()).count();
            if repaired > 0 {
                println!("  加载时修复了 {repaired} 个页面");
            }
        }
        ProjectSource::Demo => println!("已构建内置示例布局"),
    }

    let command_bus = CommandBus::new();
    let mut commands: Vec<&str> = command_bus.available_commands().copied().collect();
    commands.sort_unstable();
    println!("支持的命令: {}", commands.join(", "));

    let failed_commands = run_script(&command_bus, &mut store, DEMO_SCRIPT);
    let mut summary = summarize(&store, source, failed_commands);
    print_summary(&store, &summary);

    if let Some(path) = save {
        JsonProjectFacade::new().save_bundle(&store.to_bundle(), path)?;
        println!("项目已保存到 {}", path.display());
        summary.saved_to = Some(path.to_path_buf());
    }

    info!(
        elements = summary.elements,
        collisions = summary.collisions,
        undo_depth = summary.undo_depth,
        "CLI 演示完成"
    );
    Ok(summary)
}

/// 逐行执行命令脚本，返回失败的命令行。
pub fn run_script(bus: &CommandBus, store: &mut DocumentStore, script: &[&str]) -> Vec<String> {
    let mut context = CommandContext { store };
    let mut failed = Vec::new();
    for line in script {
        let Some(request) = CommandRequest::parse(line) else {
            continue;
        };
        let response = bus.dispatch(&request, &mut context);
        let message = response.message.unwrap_or_default();
        if response.success {
            println!("> {line}: {message}");
        } else {
            warn!(command = %line, message = %message, "CLI 命令执行失败");
            println!("> {line}: 失败 ({message})");
            failed.push((*line).to_string());
        }
    }
    failed
}

fn summarize(
    store: &DocumentStore,
    source: ProjectSource,
    failed_commands: Vec<String>,
) -> DemoSummary {
    let mut kinds = BTreeMap::new();
    for element in store.elements() {
        *kinds.entry(element.kind().as_str()).or_insert(0) += 1;
    }
    DemoSummary {
        source,
        pages: store.pages().len(),
        layers: store.layers().count(),
        elements: store.elements().len(),
        kinds,
        catalog_entries: store.catalog().len(),
        catalog_total: store.catalog().total_price(),
        collisions: store.colliding_pairs().len(),
        failed_commands,
        undo_depth: store.history().undo_len(),
        saved_to: None,
    }
}

fn print_summary(store: &DocumentStore, summary: &DemoSummary) {
    println!(
        "页面 {} 个，当前页面 {}，图层 {} 个，图元 {} 个",
        summary.pages,
        store.active_page_id(),
        summary.layers,
        summary.elements
    );
    for (kind, count) in &summary.kinds {
        println!("  - {kind}: {count}");
    }
    for element in store.elements() {
        if let Shape::Dimension(_) = element.shape {
            if let Some(label) = store.dimension_label(&element.id) {
                println!("尺寸标注 {}: {label}", element.id);
            }
        }
    }
    println!(
        "目录条目 {} 个，合计价格 {:.2}",
        summary.catalog_entries, summary.catalog_total
    );
    println!("重叠图元 {} 组", summary.collisions);
    println!(
        "联动模式: {}，可撤销步数 {}",
        if store.link_mode() { "开" } else { "关" },
        summary.undo_depth
    );
    let view = store.view();
    println!(
        "视图缩放 {:.3}，平移 ({:.1}, {:.1})",
        view.scale(),
        view.translation().x,
        view.translation().y
    );
}
