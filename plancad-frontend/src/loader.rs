use std::path::{Path, PathBuf};

use glam::DVec2;
use plancad_config::AppConfig;
use plancad_core::document::{ElementId, Furniture, LoadReport, ModuleClass};
use plancad_core::geometry::Point2;
use plancad_engine::{DocumentStore, InteractionController, Tool};
use plancad_io::JsonProjectFacade;
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::{editor_settings, snap_settings};

/// 会话来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectSource {
    File(PathBuf),
    Demo,
}

/// 示例布局中各图元的 ID。
#[derive(Debug, Clone, Default)]
pub struct DemoLayout {
    pub walls: Vec<ElementId>,
    pub door: Option<ElementId>,
    pub cabinets: Vec<ElementId>,
    pub dimension: Option<ElementId>,
    pub label: Option<ElementId>,
    pub sketch: Option<ElementId>,
}

/// 统一封装打开后的文档存储与元信息。
#[derive(Debug)]
pub struct LoadedSession {
    pub store: DocumentStore,
    pub source: ProjectSource,
    pub reports: Vec<LoadReport>,
    pub demo: Option<DemoLayout>,
}

/// 打开指定项目；未指定时构建内置示例布局。
pub fn open_session(
    config: &AppConfig,
    project: Option<&Path>,
) -> Result<LoadedSession, FrontendError> {
    let mut store = DocumentStore::with_settings(editor_settings(config));
    store.set_snap_settings(snap_settings(config));

    if let Some(path) = project {
        let bundle = JsonProjectFacade::new().load_bundle(path)?;
        let reports = store.load_bundle(bundle);
        let repaired = reports.iter().filter(|report| !report.is_clean()).count();
        if repaired > 0 {
            warn!(path = %path.display(), pages = repaired, "项目加载时修复了部分页面");
        }
        info!(path = %path.display(), pages = store.pages().len(), "已打开项目");
        return Ok(LoadedSession {
            store,
            source: ProjectSource::File(path.to_path_buf()),
            reports,
            demo: None,
        });
    }

    let layout = build_demo(&mut store);
    info!(elements = store.elements().len(), "已构建示例布局");
    Ok(LoadedSession {
        store,
        source: ProjectSource::Demo,
        reports: Vec::new(),
        demo: Some(layout),
    })
}

/// 通过交互控制器绘制一个小厨房：四面墙、门、两个柜体、尺寸标注、文字与一笔手绘。
pub fn build_demo(store: &mut DocumentStore) -> DemoLayout {
    let mut controller = InteractionController::new();
    let mut layout = DemoLayout::default();

    let corners = [
        Point2::new(0.0, 0.0),
        Point2::new(400.0, 0.0),
        Point2::new(400.0, 300.0),
        Point2::new(0.0, 300.0),
    ];
    for (index, start) in corners.iter().enumerate() {
        let end = corners[(index + 1) % corners.len()];
        if let Some(id) = drag(&mut controller, store, Tool::Wall, *start, end) {
            layout.walls.push(id);
        }
    }

    layout.door = click(&mut controller, store, Tool::Door, Point2::new(200.0, 0.0));

    let mut cabinet = Furniture::new(60.0, 60.0, ModuleClass::Base);
    cabinet.label = Some("Sink base".to_string());
    cabinet.sku = Some("SB-60".to_string());
    cabinet.price = Some(289.0);
    controller.set_furniture_template(cabinet);
    // 第二个柜体故意与第一个重叠，供碰撞检查演示
    for x in [20.0, 70.0] {
        if let Some(id) = click(&mut controller, store, Tool::Furniture, Point2::new(x, 20.0)) {
            layout.cabinets.push(id);
        }
    }

    layout.dimension = drag(
        &mut controller,
        store,
        Tool::Dimension,
        Point2::new(0.0, -40.0),
        Point2::new(400.0, -40.0),
    );

    controller.set_text_template("Kitchen");
    layout.label = click(&mut controller, store, Tool::Text, Point2::new(180.0, 150.0));

    controller.set_tool(store, Tool::Freehand);
    let stroke: Vec<Point2> = (0..=16)
        .map(|step| {
            let t = step as f64 / 16.0;
            Point2::new(250.0 + 80.0 * t, 200.0 + 20.0 * (t * std::f64::consts::PI).sin())
        })
        .collect();
    if let Some((first, rest)) = stroke.split_first() {
        controller.pointer_down(store, screen(store, *first));
        for point in rest {
            controller.pointer_move(store, screen(store, *point));
        }
        let last = rest.last().copied().unwrap_or(*first);
        layout.sketch = controller.pointer_up(store, screen(store, last));
    }

    controller.set_tool(store, Tool::Select);
    store.set_selection(layout.cabinets.iter().cloned());
    layout
}

fn screen(store: &DocumentStore, world: Point2) -> DVec2 {
    store.view().world_to_screen(world).as_vec2()
}

fn drag(
    controller: &mut InteractionController,
    store: &mut DocumentStore,
    tool: Tool,
    from: Point2,
    to: Point2,
) -> Option<ElementId> {
    controller.set_tool(store, tool);
    controller.pointer_down(store, screen(store, from));
    let mid = Point2::new((from.x() + to.x()) / 2.0, (from.y() + to.y()) / 2.0);
    controller.pointer_move(store, screen(store, mid));
    controller.pointer_up(store, screen(store, to))
}

fn click(
    controller: &mut InteractionController,
    store: &mut DocumentStore,
    tool: Tool,
    at: Point2,
) -> Option<ElementId> {
    controller.set_tool(store, tool);
    controller.pointer_down(store, screen(store, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plancad_core::document::Element;
    use plancad_io::IoError;

    #[test]
    fn demo_layout_is_drawn_through_the_controller() {
        let session = open_session(&AppConfig::default(), None).expect("demo session");
        assert_eq!(session.source, ProjectSource::Demo);
        let store = &session.store;
        let layout = session.demo.expect("demo layout");

        assert_eq!(layout.walls.len(), 4);
        for wall in &layout.walls {
            let connected = store
                .element(wall)
                .and_then(Element::as_wall)
                .map(|wall| wall.connected_walls.len());
            assert_eq!(connected, Some(2), "wall {wall} should touch two neighbours");
        }
        assert!(layout.door.is_some());
        assert_eq!(layout.cabinets.len(), 2);
        assert_eq!(store.catalog().len(), 2);
        assert_eq!(store.catalog().total_price(), 578.0);
        let dimension = layout.dimension.expect("dimension");
        assert_eq!(store.dimension_label(&dimension).as_deref(), Some("400.00"));
        assert!(layout.label.is_some());
        assert!(layout.sketch.is_some());
        assert_eq!(store.selection(), layout.cabinets.as_slice());
        assert!(store.collisions_for(&layout.cabinets[0]).contains(&layout.cabinets[1]));
    }

    #[test]
    fn missing_project_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.json");
        let err = open_session(&AppConfig::default(), Some(&missing)).unwrap_err();
        assert!(matches!(err, FrontendError::Io(IoError::ReadError { .. })));
    }

    #[test]
    fn config_units_scale_dimension_labels() {
        let mut config = AppConfig::default();
        config.editor.units_per_pixel = 0.5;
        let session = open_session(&config, None).expect("demo session");
        let dimension = session
            .demo
            .and_then(|layout| layout.dimension)
            .expect("dimension");
        assert_eq!(
            session.store.dimension_label(&dimension).as_deref(),
            Some("200.00")
        );
    }
}
