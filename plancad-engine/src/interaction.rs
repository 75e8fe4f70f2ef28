//! 指针交互：把指针事件转换为草稿图元，提交时简化几何并写入文档存储。
//!
//! 指针坐标为屏幕坐标，进入控制器后按当前视图变换换算为世界坐标。
//! 草稿在切换工具、切换页面或按 Escape 时直接丢弃，不会产生命令。

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use plancad_core::collision;
use plancad_core::document::{
    Circle, Dimension, Door, DoorSwing, Element, ElementId, Ellipse, Freehand, Furniture, Line,
    ModuleClass, Polyline, Rectangle, Shape, Text, Wall, Window,
};
use plancad_core::geometry::{Point2, flatten_points, iter_points};
use plancad_core::simplify::{append_freehand_point, simplify_path};

use crate::store::{DocumentStore, PageId};

const DEFAULT_DOOR_WIDTH: f64 = 90.0;
const DEFAULT_WINDOW_WIDTH: f64 = 120.0;
/// 小于该尺寸的拖拽视为误触。
const MIN_DRAG: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Pan,
    Line,
    Polyline,
    Rectangle,
    Circle,
    Ellipse,
    Freehand,
    Wall,
    Door,
    Window,
    Furniture,
    Dimension,
    Text,
}

impl Tool {
    /// 单击即放置的工具。
    fn places_on_click(self) -> bool {
        matches!(self, Tool::Door | Tool::Window | Tool::Furniture | Tool::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
}

/// 进行中的交互。
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    /// 两点确定的图元：线、墙、尺寸、矩形、圆、椭圆。
    Span { tool: Tool, start: Point2, end: Point2 },
    Polyline { points: Vec<Point2>, hover: Option<Point2> },
    /// 绝对坐标的扁平点列。
    Freehand { points: Vec<f64> },
    /// 拖动选中集。
    Move { origin: Point2, current: Point2 },
    Pan { last: DVec2 },
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    draft: Option<Draft>,
    furniture_template: Furniture,
    text_template: String,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionController {
    pub fn new() -> Self {
        Self {
            draft: None,
            furniture_template: Furniture::new(60.0, 60.0, ModuleClass::Base),
            text_template: "Text".to_string(),
        }
    }

    #[inline]
    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn set_furniture_template(&mut self, template: Furniture) {
        self.furniture_template = template;
    }

    pub fn set_text_template(&mut self, text: impl Into<String>) {
        self.text_template = text.into();
    }

    /// 丢弃草稿，返回之前是否存在草稿。
    pub fn cancel(&mut self) -> bool {
        let had = self.draft.take().is_some();
        if had {
            debug!("已取消草稿");
        }
        had
    }

    pub fn set_tool(&mut self, store: &mut DocumentStore, tool: Tool) {
        self.cancel();
        store.set_tool(tool);
    }

    pub fn switch_page(&mut self, store: &mut DocumentStore, id: &PageId) -> bool {
        self.cancel();
        store.switch_page(id)
    }

    pub fn key_down(&mut self, store: &mut DocumentStore, key: Key) -> Option<ElementId> {
        match key {
            Key::Escape => {
                self.cancel();
                None
            }
            Key::Enter => self.finish_polyline(store),
        }
    }

    pub fn pointer_down(&mut self, store: &mut DocumentStore, screen: DVec2) -> Option<ElementId> {
        let world = store.view().screen_to_world(screen);
        let snapped = store.snap_point(world);
        let tool = store.tool();

        if tool.places_on_click() {
            return self.place(store, tool, snapped);
        }
        match tool {
            Tool::Select => {
                let inside = store
                    .selection_bounds()
                    .is_some_and(|bounds| bounds.contains_point(world));
                if inside {
                    self.draft = Some(Draft::Move {
                        origin: world,
                        current: world,
                    });
                }
            }
            Tool::Pan => self.draft = Some(Draft::Pan { last: screen }),
            Tool::Polyline => match &mut self.draft {
                Some(Draft::Polyline { points, hover }) => {
                    if points.last() != Some(&snapped) {
                        points.push(snapped);
                    }
                    *hover = None;
                }
                _ => {
                    self.draft = Some(Draft::Polyline {
                        points: vec![snapped],
                        hover: None,
                    });
                }
            },
            Tool::Freehand => {
                let mut points = Vec::new();
                append_freehand_point(&mut points, world, store.settings().freehand_min_distance);
                self.draft = Some(Draft::Freehand { points });
            }
            _ => {
                self.draft = Some(Draft::Span {
                    tool,
                    start: snapped,
                    end: snapped,
                });
            }
        }
        None
    }

    pub fn pointer_move(&mut self, store: &mut DocumentStore, screen: DVec2) {
        let world = store.view().screen_to_world(screen);
        match &mut self.draft {
            Some(Draft::Span { end, .. }) => *end = store.snap_point(world),
            Some(Draft::Polyline { hover, .. }) => *hover = Some(store.snap_point(world)),
            Some(Draft::Freehand { points }) => {
                append_freehand_point(points, world, store.settings().freehand_min_distance);
            }
            Some(Draft::Move { current, .. }) => *current = world,
            Some(Draft::Pan { last }) => {
                let delta = screen - *last;
                store.view_mut().pan(delta.x, delta.y);
                *last = screen;
            }
            None => {}
        }
    }

    pub fn pointer_up(&mut self, store: &mut DocumentStore, screen: DVec2) -> Option<ElementId> {
        if matches!(self.draft, Some(Draft::Polyline { .. }) | None) {
            return None;
        }
        self.pointer_move(store, screen);
        match self.draft.take()? {
            Draft::Span { tool, start, end } => commit_span(store, tool, start, end),
            Draft::Freehand { points } => commit_freehand(store, &points),
            Draft::Move { origin, current } => {
                commit_move(store, current.x() - origin.x(), current.y() - origin.y());
                None
            }
            Draft::Pan { .. } | Draft::Polyline { .. } => None,
        }
    }

    /// 结束多段线，至少需要两个不同的点。
    pub fn finish_polyline(&mut self, store: &mut DocumentStore) -> Option<ElementId> {
        let Some(Draft::Polyline { points, .. }) = self.draft.take() else {
            return None;
        };
        if points.len() < 2 {
            debug!("多段线点数不足，已丢弃");
            return None;
        }
        let tolerance = store.settings().polyline_tolerance;
        let simplified = simplify_path(&flatten_points(points), tolerance);
        let (origin, relative) = relative_to_first(&simplified)?;
        store.create_element(
            origin,
            Shape::Polyline(Polyline {
                points: relative,
                closed: false,
                fill: None,
            }),
        )
    }

    fn place(&mut self, store: &mut DocumentStore, tool: Tool, point: Point2) -> Option<ElementId> {
        self.cancel();
        let thickness = store.drawing_settings().wall_thickness;
        let shape = match tool {
            Tool::Door => Shape::Door(Door {
                width: DEFAULT_DOOR_WIDTH,
                thickness,
                swing: DoorSwing::Left,
                wall_id: None,
            }),
            Tool::Window => Shape::Window(Window {
                width: DEFAULT_WINDOW_WIDTH,
                thickness,
                wall_id: None,
            }),
            Tool::Furniture => Shape::Furniture(self.furniture_template.clone()),
            Tool::Text => Shape::Text(Text {
                text: self.text_template.clone(),
                font_size: store.drawing_settings().font_size,
                font_family: None,
                fill: None,
            }),
            _ => return None,
        };
        let position = if store.settings().avoid_overlap {
            free_spot(store, point, &shape)
        } else {
            point
        };
        store.create_element(position, shape)
    }
}

/// 在放置点附近寻找不重叠的位置，找不到时仍使用原位置。
fn free_spot(store: &DocumentStore, point: Point2, shape: &Shape) -> Point2 {
    let candidate = Element::new(
        ElementId::new("draft"),
        store.active_layer_id().clone(),
        point,
        shape.clone(),
    );
    match collision::collision_free_position(&candidate, store.elements(), &[]) {
        Some(position) => position,
        None => {
            warn!(x = point.x(), y = point.y(), "放置位置周围没有空位，保留重叠");
            point
        }
    }
}

fn commit_span(store: &mut DocumentStore, tool: Tool, start: Point2, end: Point2) -> Option<ElementId> {
    let delta = start.vector_to(end);
    if delta.length() <= MIN_DRAG {
        debug!(?tool, "拖拽距离过小，已丢弃草稿");
        return None;
    }
    let segment = vec![0.0, 0.0, delta.x(), delta.y()];
    let (position, shape) = match tool {
        Tool::Line => (start, Shape::Line(Line { points: segment })),
        Tool::Wall => (
            start,
            Shape::Wall(Wall {
                points: segment,
                thickness: store.drawing_settings().wall_thickness,
                connected_walls: Vec::new(),
            }),
        ),
        Tool::Dimension => (
            start,
            Shape::Dimension(Dimension {
                points: segment,
                offset: 0.0,
            }),
        ),
        Tool::Rectangle => {
            if delta.x().abs() <= MIN_DRAG || delta.y().abs() <= MIN_DRAG {
                return None;
            }
            let corner = Point2::new(start.x().min(end.x()), start.y().min(end.y()));
            (
                corner,
                Shape::Rectangle(Rectangle {
                    width: delta.x().abs(),
                    height: delta.y().abs(),
                    fill: None,
                    corner_radius: 0.0,
                }),
            )
        }
        Tool::Circle => (
            start,
            Shape::Circle(Circle {
                radius: delta.length(),
                fill: None,
            }),
        ),
        Tool::Ellipse => (
            start,
            Shape::Ellipse(Ellipse {
                radius_x: delta.x().abs(),
                radius_y: delta.y().abs(),
                fill: None,
            }),
        ),
        _ => return None,
    };
    store.create_element(position, shape)
}

fn commit_freehand(store: &mut DocumentStore, points: &[f64]) -> Option<ElementId> {
    if points.len() < 4 {
        debug!("手绘笔画点数不足，已丢弃");
        return None;
    }
    let simplified = simplify_path(points, store.settings().freehand_tolerance);
    let (origin, relative) = relative_to_first(&simplified)?;
    store.create_element(origin, Shape::Freehand(Freehand { points: relative }))
}

/// 拖动结束时整体平移选中集；开启避让且只拖动单个图元时，落点会被推到附近的空位。
fn commit_move(store: &mut DocumentStore, dx: f64, dy: f64) {
    let ids = store.selection().to_vec();
    let (mut dx, mut dy) = (dx, dy);
    if store.settings().avoid_overlap {
        if let [id] = ids.as_slice() {
            if let Some(element) = store.element(id) {
                let mut candidate = element.clone();
                candidate.x += dx;
                candidate.y += dy;
                if let Some(free) = collision::collision_free_position(&candidate, store.elements(), &[]) {
                    dx = free.x() - element.x;
                    dy = free.y() - element.y;
                }
            }
        }
    }
    store.move_elements(&ids, dx, dy);
}

/// 把绝对坐标点列转换为 (首点, 相对首点的点列)。
fn relative_to_first(coords: &[f64]) -> Option<(Point2, Vec<f64>)> {
    let origin = iter_points(coords).next()?;
    let relative = flatten_points(iter_points(coords).map(|p| p.offset(-origin.x(), -origin.y())));
    Some((origin, relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> DVec2 {
        DVec2::new(x, y)
    }

    #[test]
    fn rectangle_drag_creates_normalised_rectangle() {
        let mut store = DocumentStore::new();
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Rectangle);

        controller.pointer_down(&mut store, at(100.0, 80.0));
        controller.pointer_move(&mut store, at(40.0, 20.0));
        let id = controller
            .pointer_up(&mut store, at(20.0, 30.0))
            .expect("rectangle committed");

        let element = store.element(&id).expect("stored");
        assert_eq!(element.position(), Point2::new(20.0, 30.0));
        match &element.shape {
            Shape::Rectangle(rect) => {
                assert_eq!(rect.width, 80.0);
                assert_eq!(rect.height, 50.0);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
        assert!(controller.draft().is_none());
    }

    #[test]
    fn click_without_drag_commits_nothing() {
        let mut store = DocumentStore::new();
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Line);
        controller.pointer_down(&mut store, at(5.0, 5.0));
        assert!(controller.pointer_up(&mut store, at(5.0, 5.0)).is_none());
        assert!(store.elements().is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn escape_and_tool_switch_abandon_drafts() {
        let mut store = DocumentStore::new();
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Freehand);
        controller.pointer_down(&mut store, at(0.0, 0.0));
        controller.pointer_move(&mut store, at(10.0, 0.0));
        controller.key_down(&mut store, Key::Escape);
        assert!(controller.pointer_up(&mut store, at(20.0, 0.0)).is_none());

        controller.set_tool(&mut store, Tool::Wall);
        controller.pointer_down(&mut store, at(0.0, 0.0));
        controller.pointer_move(&mut store, at(50.0, 0.0));
        controller.set_tool(&mut store, Tool::Select);
        assert!(controller.draft().is_none());
        assert!(store.elements().is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn freehand_stroke_is_filtered_and_simplified() {
        let mut store = DocumentStore::new();
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Freehand);
        controller.pointer_down(&mut store, at(0.0, 0.0));
        controller.pointer_move(&mut store, at(0.2, 0.1));
        controller.pointer_move(&mut store, at(5.0, 5.0));
        let id = controller
            .pointer_up(&mut store, at(10.0, 0.0))
            .expect("stroke committed");
        let element = store.element(&id).expect("stored");
        assert_eq!(element.points(), Some(&[0.0, 0.0, 5.0, 5.0, 10.0, 0.0][..]));
    }

    #[test]
    fn polyline_collects_clicks_until_enter() {
        let mut store = DocumentStore::new();
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Polyline);
        for (x, y) in [(10.0, 10.0), (20.0, 10.0), (30.0, 10.0), (30.0, 40.0)] {
            assert!(controller.pointer_down(&mut store, at(x, y)).is_none());
            controller.pointer_up(&mut store, at(x, y));
        }
        let id = controller
            .key_down(&mut store, Key::Enter)
            .expect("polyline committed");
        let element = store.element(&id).expect("stored");
        assert_eq!(element.position(), Point2::new(10.0, 10.0));
        // 共线的中间点被简化掉
        assert_eq!(element.points(), Some(&[0.0, 0.0, 20.0, 0.0, 20.0, 30.0][..]));
    }

    #[test]
    fn snapping_applies_to_committed_points() {
        let mut store = DocumentStore::new();
        store.set_snap_settings(plancad_core::document::SnapSettings {
            enabled: true,
            grid_size: 10.0,
        });
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Wall);
        controller.pointer_down(&mut store, at(3.0, 4.0));
        let id = controller
            .pointer_up(&mut store, at(98.0, 2.0))
            .expect("wall committed");
        let element = store.element(&id).expect("stored");
        assert_eq!(element.position(), Point2::new(0.0, 0.0));
        assert_eq!(element.points(), Some(&[0.0, 0.0, 100.0, 0.0][..]));
    }

    #[test]
    fn furniture_placement_avoids_overlap_when_enabled() {
        let mut store = DocumentStore::with_settings(crate::store::EditorSettings {
            avoid_overlap: true,
            ..crate::store::EditorSettings::default()
        });
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Furniture);
        let first = controller
            .pointer_down(&mut store, at(0.0, 0.0))
            .expect("first cabinet");
        let second = controller
            .pointer_down(&mut store, at(55.0, 0.0))
            .expect("second cabinet");
        assert_eq!(store.element(&first).map(Element::position), Some(Point2::new(0.0, 0.0)));
        // 向右平移 10 后恰好不再相交
        assert_eq!(store.element(&second).map(Element::position), Some(Point2::new(65.0, 0.0)));
        assert!(store.collisions_for(&second).is_empty());
    }

    #[test]
    fn dragging_selection_moves_it_as_one_command() {
        let mut store = DocumentStore::new();
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Rectangle);
        controller.pointer_down(&mut store, at(0.0, 0.0));
        let id = controller
            .pointer_up(&mut store, at(10.0, 10.0))
            .expect("rectangle");

        controller.set_tool(&mut store, Tool::Select);
        controller.pointer_down(&mut store, at(5.0, 5.0));
        controller.pointer_move(&mut store, at(15.0, 5.0));
        controller.pointer_up(&mut store, at(25.0, 10.0));
        assert_eq!(store.element(&id).map(Element::position), Some(Point2::new(20.0, 5.0)));
        assert_eq!(store.history().undo_len(), 2);
    }

    #[test]
    fn pan_tool_moves_the_view() {
        let mut store = DocumentStore::new();
        let mut controller = InteractionController::new();
        controller.set_tool(&mut store, Tool::Pan);
        controller.pointer_down(&mut store, at(100.0, 100.0));
        controller.pointer_move(&mut store, at(130.0, 90.0));
        controller.pointer_up(&mut store, at(130.0, 90.0));
        assert_eq!(store.view().translation(), DVec2::new(30.0, -10.0));
        assert!(!store.can_undo());
    }
}
