//! 基于轴对齐包围盒的碰撞检测，仅供放置/拖拽前参考，不修改文档。
//!
//! 包围盒忽略图元旋转。

use crate::document::{Element, ElementId, Shape};
use crate::geometry::{Bounds2D, Point2, Vector2, iter_points};

/// 寻找无碰撞位置时的试探步长。
pub const NUDGE_STEP: f64 = 10.0;

/// 八个试探方向：±x、±y 以及两条对角线。
const NUDGE_DIRECTIONS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (-1.0, -1.0),
    (1.0, -1.0),
    (-1.0, 1.0),
];

/// 由图元自身几何推导包围盒。文字等无法确定范围的图元返回 `None`。
pub fn element_bounds(element: &Element) -> Option<Bounds2D> {
    let x = element.x;
    let y = element.y;
    match &element.shape {
        Shape::Rectangle(rect) => Some(Bounds2D::from_rect(x, y, rect.width, rect.height)),
        Shape::Furniture(furniture) => Some(Bounds2D::from_rect(
            x,
            y,
            furniture.width,
            furniture.height,
        )),
        Shape::Door(door) => Some(Bounds2D::from_rect(x, y, door.width, door.thickness)),
        Shape::Window(window) => Some(Bounds2D::from_rect(x, y, window.width, window.thickness)),
        Shape::Circle(circle) => Some(radius_bounds(x, y, circle.radius, circle.radius)),
        Shape::Ellipse(ellipse) => Some(radius_bounds(x, y, ellipse.radius_x, ellipse.radius_y)),
        Shape::Arc(arc) => Some(radius_bounds(x, y, arc.radius, arc.radius)),
        Shape::Line(_)
        | Shape::Polyline(_)
        | Shape::Freehand(_)
        | Shape::Wall(_)
        | Shape::Dimension(_) => {
            let coords = element.points()?;
            let mut bounds = Bounds2D::empty();
            for point in iter_points(coords) {
                bounds.include_point(point.offset(x, y));
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
        Shape::Text(_) => None,
    }
}

fn radius_bounds(cx: f64, cy: f64, rx: f64, ry: f64) -> Bounds2D {
    let (rx, ry) = (rx.abs(), ry.abs());
    Bounds2D::new(Point2::new(cx - rx, cy - ry), Point2::new(cx + rx, cy + ry))
}

/// 标准 AABB 重叠测试，满足对称性，且非空盒总与自身重叠。
#[inline]
pub fn boxes_overlap(a: &Bounds2D, b: &Bounds2D) -> bool {
    a.overlaps(b)
}

/// 返回与给定图元包围盒重叠的其他图元（跳过自身与 `exclude` 中的 ID），按文档顺序。
pub fn check_collision<'a>(
    element: &Element,
    elements: &'a [Element],
    exclude: &[ElementId],
) -> Vec<&'a Element> {
    match element_bounds(element) {
        Some(bounds) => collisions_for_bounds(&element.id, &bounds, elements, exclude),
        None => Vec::new(),
    }
}

fn collisions_for_bounds<'a>(
    self_id: &ElementId,
    bounds: &Bounds2D,
    elements: &'a [Element],
    exclude: &[ElementId],
) -> Vec<&'a Element> {
    elements
        .iter()
        .filter(|other| &other.id != self_id && !exclude.contains(&other.id))
        .filter(|other| element_bounds(other).is_some_and(|b| boxes_overlap(bounds, &b)))
        .collect()
}

/// 模拟把图元移动到 `(new_x, new_y)` 后是否会与其他图元重叠。
pub fn would_collide(
    element: &Element,
    new_x: f64,
    new_y: f64,
    elements: &[Element],
    exclude: &[ElementId],
) -> bool {
    let Some(bounds) = element_bounds(element) else {
        return false;
    };
    let moved = bounds.translated(Vector2::new(new_x - element.x, new_y - element.y));
    !collisions_for_bounds(&element.id, &moved, elements, exclude).is_empty()
}

/// 当前不碰撞时返回当前位置；否则依次试探八个固定偏移，返回第一个无碰撞位置，
/// 全部失败时返回 `None`。
pub fn collision_free_position(
    element: &Element,
    elements: &[Element],
    exclude: &[ElementId],
) -> Option<Point2> {
    collision_free_position_with_step(element, elements, exclude, NUDGE_STEP)
}

pub fn collision_free_position_with_step(
    element: &Element,
    elements: &[Element],
    exclude: &[ElementId],
    step: f64,
) -> Option<Point2> {
    if !would_collide(element, element.x, element.y, elements, exclude) {
        return Some(element.position());
    }
    NUDGE_DIRECTIONS
        .iter()
        .map(|(dx, dy)| element.position().offset(dx * step, dy * step))
        .find(|candidate| !would_collide(element, candidate.x(), candidate.y(), elements, exclude))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Circle, ElementId, LayerId, Rectangle, Text, Wall};
    use proptest::prelude::*;

    fn rect(id: &str, x: f64, y: f64, w: f64, h: f64) -> Element {
        Element::new(
            ElementId::new(id),
            LayerId::new("layer-1"),
            Point2::new(x, y),
            Shape::Rectangle(Rectangle {
                width: w,
                height: h,
                fill: None,
                corner_radius: 0.0,
            }),
        )
    }

    #[test]
    fn bounds_follow_native_geometry() {
        let wall = Element::new(
            ElementId::new("w"),
            LayerId::new("layer-1"),
            Point2::new(10.0, 10.0),
            Shape::Wall(Wall {
                points: vec![0.0, 0.0, 50.0, -20.0, 30.0, 40.0],
                thickness: 10.0,
                connected_walls: Vec::new(),
            }),
        );
        let bounds = element_bounds(&wall).expect("wall bounds");
        assert_eq!(bounds.min(), Point2::new(10.0, -10.0));
        assert_eq!(bounds.max(), Point2::new(60.0, 50.0));

        let circle = Element::new(
            ElementId::new("c"),
            LayerId::new("layer-1"),
            Point2::new(0.0, 0.0),
            Shape::Circle(Circle {
                radius: 5.0,
                fill: None,
            }),
        );
        let bounds = element_bounds(&circle).expect("circle bounds");
        assert_eq!(bounds.width(), 10.0);
        assert_eq!(bounds.center(), Point2::new(0.0, 0.0));
    }

    #[test]
    fn text_and_empty_point_lists_have_no_bounds() {
        let text = Element::new(
            ElementId::new("t"),
            LayerId::new("layer-1"),
            Point2::new(0.0, 0.0),
            Shape::Text(Text {
                text: "Kitchen".into(),
                font_size: 14.0,
                font_family: None,
                fill: None,
            }),
        );
        assert!(element_bounds(&text).is_none());

        let mut wall = rect("w", 0.0, 0.0, 1.0, 1.0);
        wall.shape = Shape::Wall(Wall {
            points: Vec::new(),
            thickness: 10.0,
            connected_walls: Vec::new(),
        });
        assert!(element_bounds(&wall).is_none());
        assert!(check_collision(&wall, &[rect("r", 0.0, 0.0, 5.0, 5.0)], &[]).is_empty());
    }

    #[test]
    fn overlapping_rectangles_are_reported() {
        let r1 = rect("r1", 0.0, 0.0, 100.0, 100.0);
        let r2 = rect("r2", 50.0, 50.0, 100.0, 100.0);
        let r3 = rect("r3", 300.0, 300.0, 10.0, 10.0);
        let all = vec![r1.clone(), r2.clone(), r3];

        let hits: Vec<_> = check_collision(&r1, &all, &[]).iter().map(|e| e.id.clone()).collect();
        assert_eq!(hits, vec![r2.id.clone()]);
        assert!(check_collision(&r1, &all, &[r2.id.clone()]).is_empty());
    }

    #[test]
    fn would_collide_does_not_move_the_element() {
        let r1 = rect("r1", 0.0, 0.0, 100.0, 100.0);
        let r2 = rect("r2", 200.0, 200.0, 50.0, 50.0);
        let all = vec![r1.clone(), r2.clone()];
        assert!(!would_collide(&r2, 200.0, 200.0, &all, &[]));
        assert!(would_collide(&r2, 60.0, 60.0, &all, &[]));
        assert_eq!(r2.position(), Point2::new(200.0, 200.0));
    }

    #[test]
    fn nudge_finds_first_clear_offset() {
        // 障碍物在右侧边缘外 5 个单位处，向左平移 10 即可脱离
        let obstacle = rect("o", 95.0, 0.0, 50.0, 50.0);
        let item = rect("i", 0.0, 0.0, 100.0, 50.0);
        let all = vec![obstacle, item.clone()];
        let free = collision_free_position(&item, &all, &[]).expect("clear spot");
        assert_eq!(free, Point2::new(-10.0, 0.0));
    }

    #[test]
    fn nudge_returns_current_position_when_clear() {
        let item = rect("i", 0.0, 0.0, 10.0, 10.0);
        let all = vec![item.clone(), rect("far", 500.0, 500.0, 10.0, 10.0)];
        assert_eq!(
            collision_free_position(&item, &all, &[]),
            Some(Point2::new(0.0, 0.0))
        );
    }

    #[test]
    fn nudge_gives_up_when_surrounded() {
        let item = rect("i", 0.0, 0.0, 10.0, 10.0);
        let all = vec![item.clone(), rect("big", -100.0, -100.0, 300.0, 300.0)];
        assert!(collision_free_position(&item, &all, &[]).is_none());
    }

    fn any_box() -> impl Strategy<Value = Bounds2D> {
        (
            -100.0f64..100.0,
            -100.0f64..100.0,
            0.0f64..80.0,
            0.0f64..80.0,
        )
            .prop_map(|(x, y, w, h)| Bounds2D::from_rect(x, y, w, h))
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric_and_reflexive(a in any_box(), b in any_box()) {
            prop_assert_eq!(boxes_overlap(&a, &b), boxes_overlap(&b, &a));
            prop_assert!(boxes_overlap(&a, &a));
        }
    }
}
