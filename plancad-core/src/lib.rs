pub mod collision;
pub mod simplify;
pub mod walls;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn offset(self, dx: f64, dy: f64) -> Self {
            Self(self.0 + DVec2::new(dx, dy))
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        /// 欧氏距离。
        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn zero() -> Self {
            Self(DVec2::ZERO)
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 将扁平坐标数组 `[x0, y0, x1, y1, ...]` 视为点序列迭代，末尾落单的坐标被忽略。
    pub fn iter_points(coords: &[f64]) -> impl Iterator<Item = Point2> + '_ {
        coords
            .chunks_exact(2)
            .map(|pair| Point2::new(pair[0], pair[1]))
    }

    /// 把点序列重新展开为扁平坐标数组。
    pub fn flatten_points<I>(points: I) -> Vec<f64>
    where
        I: IntoIterator<Item = Point2>,
    {
        points
            .into_iter()
            .flat_map(|point| [point.x(), point.y()])
            .collect()
    }

    /// 轴对齐边界框（AABB），忽略旋转。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        /// 以任意两个角点构造，内部会规整为 min/max。
        #[inline]
        pub fn new(a: Point2, b: Point2) -> Self {
            Self {
                min: Point2::from_vec(a.as_vec2().min(b.as_vec2())),
                max: Point2::from_vec(a.as_vec2().max(b.as_vec2())),
            }
        }

        /// 由左上角与宽高构造，宽高允许为负。
        #[inline]
        pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
            Self::new(Point2::new(x, y), Point2::new(x + width, y + height))
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }

        #[inline]
        pub fn translated(&self, offset: Vector2) -> Self {
            Self {
                min: self.min.translate(offset),
                max: self.max.translate(offset),
            }
        }

        /// 闭区间重叠测试：仅当一方完全位于另一方某一侧时视为不重叠，
        /// 因此边缘相接也算重叠，且任意非空盒与自身重叠。
        pub fn overlaps(&self, other: &Bounds2D) -> bool {
            if self.is_empty() || other.is_empty() {
                return false;
            }
            !(self.max.x() < other.min.x()
                || other.max.x() < self.min.x()
                || self.max.y() < other.min.y()
                || other.max.y() < self.min.y())
        }

        #[inline]
        pub fn contains_point(&self, point: Point2) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }
    }
}

pub mod document {
    use std::collections::{BTreeMap, HashSet};
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::collision::element_bounds;
    use crate::geometry::{Bounds2D, Point2, iter_points};

    pub const DEFAULT_STROKE: &str = "#1f2933";
    pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
    pub const DEFAULT_WALL_THICKNESS: f64 = 12.0;
    const ELEMENT_ID_PREFIX: &str = "el-";
    const LAYER_ID_PREFIX: &str = "layer-";

    /// 图元 ID，创建后不可变，在单个页面内唯一。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ElementId(String);

    impl ElementId {
        #[inline]
        pub fn new(raw: impl Into<String>) -> Self {
            Self(raw.into())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for ElementId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<&str> for ElementId {
        fn from(value: &str) -> Self {
            Self::new(value)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LayerId(String);

    impl LayerId {
        #[inline]
        pub fn new(raw: impl Into<String>) -> Self {
            Self(raw.into())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for LayerId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<&str> for LayerId {
        fn from(value: &str) -> Self {
            Self::new(value)
        }
    }

    /// 图层。顺序即显示顺序；锁定图层上的图元不接受交互编辑，隐藏图层上的图元仍保留在模型中。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Layer {
        pub id: LayerId,
        pub name: String,
        #[serde(default = "default_true")]
        pub visible: bool,
        #[serde(default)]
        pub locked: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color: Option<String>,
    }

    impl Layer {
        #[inline]
        pub fn new(id: LayerId, name: impl Into<String>) -> Self {
            Self {
                id,
                name: name.into(),
                visible: true,
                locked: false,
                color: None,
            }
        }
    }

    fn default_true() -> bool {
        true
    }

    fn default_opacity() -> f64 {
        1.0
    }

    fn default_stroke() -> String {
        DEFAULT_STROKE.to_string()
    }

    fn default_stroke_width() -> f64 {
        DEFAULT_STROKE_WIDTH
    }

    fn default_wall_thickness() -> f64 {
        DEFAULT_WALL_THICKNESS
    }

    /// 图元种类标签，与序列化时的 `type` 字段一致。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ElementKind {
        Line,
        Polyline,
        Rectangle,
        Circle,
        Ellipse,
        Arc,
        Freehand,
        Wall,
        Door,
        Window,
        Furniture,
        Dimension,
        Text,
    }

    impl ElementKind {
        pub fn as_str(self) -> &'static str {
            match self {
                ElementKind::Line => "line",
                ElementKind::Polyline => "polyline",
                ElementKind::Rectangle => "rectangle",
                ElementKind::Circle => "circle",
                ElementKind::Ellipse => "ellipse",
                ElementKind::Arc => "arc",
                ElementKind::Freehand => "freehand",
                ElementKind::Wall => "wall",
                ElementKind::Door => "door",
                ElementKind::Window => "window",
                ElementKind::Furniture => "furniture",
                ElementKind::Dimension => "dimension",
                ElementKind::Text => "text",
            }
        }
    }

    impl fmt::Display for ElementKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// 柜体模块分类。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ModuleClass {
        #[default]
        Base,
        Wall,
        Tall,
        Vanity,
        Corner,
        Appliance,
        Panel,
        Custom,
    }

    impl ModuleClass {
        pub fn as_str(self) -> &'static str {
            match self {
                ModuleClass::Base => "base",
                ModuleClass::Wall => "wall",
                ModuleClass::Tall => "tall",
                ModuleClass::Vanity => "vanity",
                ModuleClass::Corner => "corner",
                ModuleClass::Appliance => "appliance",
                ModuleClass::Panel => "panel",
                ModuleClass::Custom => "custom",
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum DoorSwing {
        #[default]
        Left,
        Right,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum SectionKind {
        Door,
        Drawer,
        Shelf,
        Open,
    }

    /// 柜体分段，`size` 为该段占柜体高度的比例。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FurnitureSection {
        pub kind: SectionKind,
        pub size: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub points: Vec<f64>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Polyline {
        pub points: Vec<f64>,
        #[serde(default)]
        pub closed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fill: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Rectangle {
        pub width: f64,
        pub height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fill: Option<String>,
        #[serde(default)]
        pub corner_radius: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub radius: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fill: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Ellipse {
        pub radius_x: f64,
        pub radius_y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fill: Option<String>,
    }

    /// 圆弧，角度以度为单位，与图元 `rotation` 一致。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Arc {
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Freehand {
        pub points: Vec<f64>,
    }

    /// 墙体。`connected_walls` 只是连接关系的快照，权威关系由端点几何实时推导。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Wall {
        pub points: Vec<f64>,
        #[serde(default = "default_wall_thickness")]
        pub thickness: f64,
        #[serde(default)]
        pub connected_walls: Vec<ElementId>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Door {
        pub width: f64,
        #[serde(default = "default_wall_thickness")]
        pub thickness: f64,
        #[serde(default)]
        pub swing: DoorSwing,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub wall_id: Option<ElementId>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Window {
        pub width: f64,
        #[serde(default = "default_wall_thickness")]
        pub thickness: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub wall_id: Option<ElementId>,
    }

    /// 家具/柜体块，携带目录相关属性。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Furniture {
        pub width: f64,
        pub height: f64,
        #[serde(default)]
        pub module_class: ModuleClass,
        #[serde(default)]
        pub sections: Vec<FurnitureSection>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub finish: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub manufacturer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub sku: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub price: Option<f64>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub metadata: BTreeMap<String, String>,
    }

    impl Furniture {
        pub fn new(width: f64, height: f64, module_class: ModuleClass) -> Self {
            Self {
                width,
                height,
                module_class,
                sections: Vec::new(),
                label: None,
                finish: None,
                manufacturer: None,
                sku: None,
                price: None,
                metadata: BTreeMap::new(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Dimension {
        pub points: Vec<f64>,
        #[serde(default)]
        pub offset: f64,
    }

    impl Dimension {
        /// 两端点之间的像素长度，点数不足时返回 `None`。
        pub fn pixel_length(&self) -> Option<f64> {
            let mut points = iter_points(&self.points);
            let start = points.next()?;
            let end = points.last()?;
            Some(start.distance(end))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Text {
        pub text: String,
        pub font_size: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub font_family: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fill: Option<String>,
    }

    /// 图元的几何与领域数据，按 `type` 字段区分。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "lowercase")]
    pub enum Shape {
        Line(Line),
        Polyline(Polyline),
        Rectangle(Rectangle),
        Circle(Circle),
        Ellipse(Ellipse),
        Arc(Arc),
        Freehand(Freehand),
        Wall(Wall),
        Door(Door),
        Window(Window),
        Furniture(Furniture),
        Dimension(Dimension),
        Text(Text),
    }

    impl Shape {
        pub fn kind(&self) -> ElementKind {
            match self {
                Shape::Line(_) => ElementKind::Line,
                Shape::Polyline(_) => ElementKind::Polyline,
                Shape::Rectangle(_) => ElementKind::Rectangle,
                Shape::Circle(_) => ElementKind::Circle,
                Shape::Ellipse(_) => ElementKind::Ellipse,
                Shape::Arc(_) => ElementKind::Arc,
                Shape::Freehand(_) => ElementKind::Freehand,
                Shape::Wall(_) => ElementKind::Wall,
                Shape::Door(_) => ElementKind::Door,
                Shape::Window(_) => ElementKind::Window,
                Shape::Furniture(_) => ElementKind::Furniture,
                Shape::Dimension(_) => ElementKind::Dimension,
                Shape::Text(_) => ElementKind::Text,
            }
        }

        /// 以扁平坐标数组表示几何的图元返回其点列（相对图元位置）。
        pub fn points(&self) -> Option<&[f64]> {
            match self {
                Shape::Line(line) => Some(&line.points),
                Shape::Polyline(polyline) => Some(&polyline.points),
                Shape::Freehand(freehand) => Some(&freehand.points),
                Shape::Wall(wall) => Some(&wall.points),
                Shape::Dimension(dimension) => Some(&dimension.points),
                Shape::Rectangle(_)
                | Shape::Circle(_)
                | Shape::Ellipse(_)
                | Shape::Arc(_)
                | Shape::Door(_)
                | Shape::Window(_)
                | Shape::Furniture(_)
                | Shape::Text(_) => None,
            }
        }

        pub fn points_mut(&mut self) -> Option<&mut Vec<f64>> {
            match self {
                Shape::Line(line) => Some(&mut line.points),
                Shape::Polyline(polyline) => Some(&mut polyline.points),
                Shape::Freehand(freehand) => Some(&mut freehand.points),
                Shape::Wall(wall) => Some(&mut wall.points),
                Shape::Dimension(dimension) => Some(&mut dimension.points),
                Shape::Rectangle(_)
                | Shape::Circle(_)
                | Shape::Ellipse(_)
                | Shape::Arc(_)
                | Shape::Door(_)
                | Shape::Window(_)
                | Shape::Furniture(_)
                | Shape::Text(_) => None,
            }
        }
    }

    /// 图元：公共样式/位置属性加上具体几何。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Element {
        pub id: ElementId,
        pub layer_id: LayerId,
        #[serde(default = "default_stroke")]
        pub stroke: String,
        #[serde(default = "default_stroke_width")]
        pub stroke_width: f64,
        #[serde(default = "default_opacity")]
        pub opacity: f64,
        #[serde(default)]
        pub rotation: f64,
        pub x: f64,
        pub y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub dash: Option<Vec<f64>>,
        #[serde(flatten)]
        pub shape: Shape,
    }

    impl Element {
        pub fn new(id: ElementId, layer_id: LayerId, position: Point2, shape: Shape) -> Self {
            Self {
                id,
                layer_id,
                stroke: default_stroke(),
                stroke_width: DEFAULT_STROKE_WIDTH,
                opacity: 1.0,
                rotation: 0.0,
                x: position.x(),
                y: position.y(),
                dash: None,
                shape,
            }
        }

        #[inline]
        pub fn kind(&self) -> ElementKind {
            self.shape.kind()
        }

        #[inline]
        pub fn position(&self) -> Point2 {
            Point2::new(self.x, self.y)
        }

        #[inline]
        pub fn set_position(&mut self, position: Point2) {
            self.x = position.x();
            self.y = position.y();
        }

        #[inline]
        pub fn points(&self) -> Option<&[f64]> {
            self.shape.points()
        }

        /// 点列转换为绝对坐标。
        pub fn absolute_points(&self) -> Vec<Point2> {
            let origin = self.position();
            self.points()
                .map(|coords| {
                    iter_points(coords)
                        .map(|p| p.offset(origin.x(), origin.y()))
                        .collect()
                })
                .unwrap_or_default()
        }

        #[inline]
        pub fn as_wall(&self) -> Option<&Wall> {
            match &self.shape {
                Shape::Wall(wall) => Some(wall),
                _ => None,
            }
        }

        #[inline]
        pub fn as_furniture(&self) -> Option<&Furniture> {
            match &self.shape {
                Shape::Furniture(furniture) => Some(furniture),
                _ => None,
            }
        }

        #[inline]
        pub fn is_wall(&self) -> bool {
            matches!(self.shape, Shape::Wall(_))
        }

        /// 应用局部属性修改。与当前种类无关的字段会被忽略，ID 永远不变。
        /// 把不透明度限制在 `[0, 1]`，非有限值视为完全不透明。返回是否有修改。
        pub fn normalize_opacity(&mut self) -> bool {
            let normalized = if self.opacity.is_finite() {
                self.opacity.clamp(0.0, 1.0)
            } else {
                1.0
            };
            let changed = normalized != self.opacity;
            self.opacity = normalized;
            changed
        }

        pub fn apply_patch(&mut self, patch: &ElementPatch) {
            if let Some(layer_id) = &patch.layer_id {
                self.layer_id = layer_id.clone();
            }
            if let Some(stroke) = &patch.stroke {
                self.stroke = stroke.clone();
            }
            if let Some(width) = patch.stroke_width {
                self.stroke_width = width;
            }
            if let Some(opacity) = patch.opacity {
                self.opacity = opacity;
                self.normalize_opacity();
            }
            if let Some(rotation) = patch.rotation {
                self.rotation = rotation;
            }
            if let Some(x) = patch.x {
                self.x = x;
            }
            if let Some(y) = patch.y {
                self.y = y;
            }
            if let Some(dash) = &patch.dash {
                // 空数组表示移除虚线样式
                self.dash = if dash.is_empty() {
                    None
                } else {
                    Some(dash.clone())
                };
            }
            if let Some(points) = &patch.points {
                if let Some(target) = self.shape.points_mut() {
                    *target = points.clone();
                }
            }

            match &mut self.shape {
                Shape::Line(_) | Shape::Freehand(_) => {}
                Shape::Polyline(polyline) => {
                    assign(&mut polyline.closed, patch.closed);
                    assign_opt(&mut polyline.fill, &patch.fill);
                }
                Shape::Rectangle(rect) => {
                    assign(&mut rect.width, patch.width);
                    assign(&mut rect.height, patch.height);
                    assign(&mut rect.corner_radius, patch.corner_radius);
                    assign_opt(&mut rect.fill, &patch.fill);
                }
                Shape::Circle(circle) => {
                    assign(&mut circle.radius, patch.radius);
                    assign_opt(&mut circle.fill, &patch.fill);
                }
                Shape::Ellipse(ellipse) => {
                    assign(&mut ellipse.radius_x, patch.radius_x);
                    assign(&mut ellipse.radius_y, patch.radius_y);
                    assign_opt(&mut ellipse.fill, &patch.fill);
                }
                Shape::Arc(arc) => {
                    assign(&mut arc.radius, patch.radius);
                    assign(&mut arc.start_angle, patch.start_angle);
                    assign(&mut arc.end_angle, patch.end_angle);
                }
                Shape::Wall(wall) => {
                    assign(&mut wall.thickness, patch.thickness);
                    if let Some(connected) = &patch.connected_walls {
                        wall.connected_walls = connected.clone();
                    }
                }
                Shape::Door(door) => {
                    assign(&mut door.width, patch.width);
                    assign(&mut door.thickness, patch.thickness);
                    assign(&mut door.swing, patch.swing);
                    assign_opt(&mut door.wall_id, &patch.wall_id);
                }
                Shape::Window(window) => {
                    assign(&mut window.width, patch.width);
                    assign(&mut window.thickness, patch.thickness);
                    assign_opt(&mut window.wall_id, &patch.wall_id);
                }
                Shape::Furniture(furniture) => {
                    assign(&mut furniture.width, patch.width);
                    assign(&mut furniture.height, patch.height);
                    assign(&mut furniture.module_class, patch.module_class);
                    if let Some(sections) = &patch.sections {
                        furniture.sections = sections.clone();
                    }
                    assign_opt(&mut furniture.label, &patch.label);
                    assign_opt(&mut furniture.finish, &patch.finish);
                    assign_opt(&mut furniture.manufacturer, &patch.manufacturer);
                    assign_opt(&mut furniture.sku, &patch.sku);
                    assign_opt(&mut furniture.price, &patch.price);
                    if let Some(metadata) = &patch.metadata {
                        furniture.metadata = metadata.clone();
                    }
                }
                Shape::Dimension(dimension) => {
                    assign(&mut dimension.offset, patch.offset);
                }
                Shape::Text(text) => {
                    if let Some(content) = &patch.text {
                        text.text = content.clone();
                    }
                    assign(&mut text.font_size, patch.font_size);
                    assign_opt(&mut text.font_family, &patch.font_family);
                    assign_opt(&mut text.fill, &patch.fill);
                }
            }
        }
    }

    #[inline]
    fn assign<T: Copy>(target: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *target = value;
        }
    }

    #[inline]
    fn assign_opt<T: Clone>(target: &mut Option<T>, value: &Option<Option<T>>) {
        if let Some(value) = value {
            *target = value.clone();
        }
    }

    /// 区分缺省字段与显式的 `null`：出现即为 `Some`，`null` 得到 `Some(None)`。
    fn clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }

    /// 局部属性更新（`updateElement` 的参数）。`None` 表示保持原值；
    /// 可清空的可选字段用 `Some(None)`（JSON 中为 `null`）表示移除。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct ElementPatch {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub layer_id: Option<LayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub stroke: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub stroke_width: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub opacity: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub rotation: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub x: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub y: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub dash: Option<Vec<f64>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub points: Option<Vec<f64>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub closed: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
        pub fill: Option<Option<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub width: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub height: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub corner_radius: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub radius: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub radius_x: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub radius_y: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub start_angle: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub end_angle: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub thickness: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub connected_walls: Option<Vec<ElementId>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub swing: Option<DoorSwing>,
        #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
        pub wall_id: Option<Option<ElementId>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub module_class: Option<ModuleClass>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub sections: Option<Vec<FurnitureSection>>,
        #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
        pub label: Option<Option<String>>,
        #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
        pub finish: Option<Option<String>>,
        #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
        pub manufacturer: Option<Option<String>>,
        #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
        pub sku: Option<Option<String>>,
        #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
        pub price: Option<Option<f64>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub metadata: Option<BTreeMap<String, String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub offset: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub font_size: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
        pub font_family: Option<Option<String>>,
    }

    impl ElementPatch {
        pub fn position(x: f64, y: f64) -> Self {
            Self {
                x: Some(x),
                y: Some(y),
                ..Self::default()
            }
        }

        pub fn points(points: Vec<f64>) -> Self {
            Self {
                points: Some(points),
                ..Self::default()
            }
        }

        pub fn is_empty(&self) -> bool {
            *self == Self::default()
        }

        /// 是否涉及家具目录相关的字段。
        pub fn touches_catalog(&self) -> bool {
            self.module_class.is_some()
                || self.finish.is_some()
                || self.manufacturer.is_some()
                || self.sku.is_some()
                || self.price.is_some()
                || self.label.is_some()
                || self.metadata.is_some()
        }
    }

    /// 吸附设置，随项目数据一起持久化。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SnapSettings {
        pub enabled: bool,
        pub grid_size: f64,
    }

    impl Default for SnapSettings {
        fn default() -> Self {
            Self {
                enabled: false,
                grid_size: 10.0,
            }
        }
    }

    impl SnapSettings {
        /// 将点吸附到网格；未启用或网格尺寸非法时原样返回。
        pub fn snap(&self, point: Point2) -> Point2 {
            if !self.enabled || self.grid_size <= f64::EPSILON {
                return point;
            }
            let grid = self.grid_size;
            Point2::new(
                (point.x() / grid).round() * grid,
                (point.y() / grid).round() * grid,
            )
        }
    }

    /// 持久化层交换的纯数据快照。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProjectData {
        pub layers: Vec<Layer>,
        pub elements: Vec<Element>,
        pub active_layer_id: LayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub snap_settings: Option<SnapSettings>,
    }

    /// 多页面项目中的单个页面。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PageData {
        pub id: String,
        pub name: String,
        pub project: ProjectData,
    }

    /// 多页面项目快照，页面顺序即显示顺序。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProjectBundle {
        pub pages: Vec<PageData>,
        pub active_page_id: String,
    }

    /// 从快照重建文档时所做的修复。
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct LoadReport {
        pub created_default_layer: bool,
        pub active_layer_replaced: bool,
        pub reassigned_elements: Vec<ElementId>,
        pub dropped_duplicates: Vec<ElementId>,
        pub dropped_duplicate_layers: Vec<LayerId>,
        pub clamped_opacity: Vec<ElementId>,
    }

    impl LoadReport {
        pub fn is_clean(&self) -> bool {
            !self.created_default_layer
                && !self.active_layer_replaced
                && self.reassigned_elements.is_empty()
                && self.dropped_duplicates.is_empty()
                && self.dropped_duplicate_layers.is_empty()
                && self.clamped_opacity.is_empty()
        }
    }

    /// 单页文档：有序图层、图元集合与当前图层。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Document {
        layers: Vec<Layer>,
        elements: Vec<Element>,
        active_layer: LayerId,
        next_element_id: u64,
        next_layer_id: u64,
    }

    impl Default for Document {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Document {
        pub fn new() -> Self {
            let id = LayerId::new(format!("{LAYER_ID_PREFIX}1"));
            Self {
                layers: vec![Layer::new(id.clone(), "Layer 1")],
                elements: Vec::new(),
                active_layer: id,
                next_element_id: 1,
                next_layer_id: 2,
            }
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.iter()
        }

        #[inline]
        pub fn layer_count(&self) -> usize {
            self.layers.len()
        }

        pub fn layer(&self, id: &LayerId) -> Option<&Layer> {
            self.layers.iter().find(|layer| &layer.id == id)
        }

        pub fn layer_mut(&mut self, id: &LayerId) -> Option<&mut Layer> {
            self.layers.iter_mut().find(|layer| &layer.id == id)
        }

        pub fn layer_index(&self, id: &LayerId) -> Option<usize> {
            self.layers.iter().position(|layer| &layer.id == id)
        }

        #[inline]
        pub fn has_layer(&self, id: &LayerId) -> bool {
            self.layer_index(id).is_some()
        }

        #[inline]
        pub fn active_layer_id(&self) -> &LayerId {
            &self.active_layer
        }

        /// 切换当前图层，目标不存在时返回 `false`。
        pub fn set_active_layer(&mut self, id: &LayerId) -> bool {
            if !self.has_layer(id) {
                return false;
            }
            self.active_layer = id.clone();
            true
        }

        /// 图层锁定或不存在都视为不可编辑。
        pub fn is_layer_editable(&self, id: &LayerId) -> bool {
            self.layer(id).is_some_and(|layer| !layer.locked)
        }

        pub fn allocate_layer_id(&mut self) -> LayerId {
            let id = self.next_layer_id;
            self.next_layer_id += 1;
            LayerId::new(format!("{LAYER_ID_PREFIX}{id}"))
        }

        /// 在指定位置插入图层，ID 重复时拒绝。
        pub fn insert_layer(&mut self, index: usize, layer: Layer) -> bool {
            if self.has_layer(&layer.id) {
                return false;
            }
            let index = index.min(self.layers.len());
            self.layers.insert(index, layer);
            true
        }

        /// 移除图层本身（不处理其上的图元）。最后一个图层不能被移除；
        /// 当前图层被移除时改用相邻图层。
        pub fn take_layer(&mut self, id: &LayerId) -> Option<(usize, Layer)> {
            if self.layers.len() <= 1 {
                return None;
            }
            let index = self.layer_index(id)?;
            let layer = self.layers.remove(index);
            if self.active_layer == layer.id {
                let fallback = index.min(self.layers.len() - 1);
                self.active_layer = self.layers[fallback].id.clone();
            }
            Some((index, layer))
        }

        /// 调整图层顺序，返回原位置。
        pub fn move_layer(&mut self, id: &LayerId, new_index: usize) -> Option<usize> {
            let index = self.layer_index(id)?;
            let layer = self.layers.remove(index);
            let target = new_index.min(self.layers.len());
            self.layers.insert(target, layer);
            Some(index)
        }

        #[inline]
        pub fn elements(&self) -> &[Element] {
            &self.elements
        }

        #[inline]
        pub fn element_count(&self) -> usize {
            self.elements.len()
        }

        pub fn element(&self, id: &ElementId) -> Option<&Element> {
            self.elements.iter().find(|element| &element.id == id)
        }

        pub fn element_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
            self.elements.iter_mut().find(|element| &element.id == id)
        }

        pub fn element_index(&self, id: &ElementId) -> Option<usize> {
            self.elements.iter().position(|element| &element.id == id)
        }

        #[inline]
        pub fn contains(&self, id: &ElementId) -> bool {
            self.element_index(id).is_some()
        }

        pub fn elements_on_layer<'a>(
            &'a self,
            layer: &'a LayerId,
        ) -> impl Iterator<Item = &'a Element> + 'a {
            self.elements
                .iter()
                .filter(move |element| &element.layer_id == layer)
        }

        /// 位于可见图层上的图元，按文档顺序。
        pub fn visible_elements(&self) -> impl Iterator<Item = &Element> {
            let hidden: HashSet<&LayerId> = self
                .layers
                .iter()
                .filter(|layer| !layer.visible)
                .map(|layer| &layer.id)
                .collect();
            self.elements
                .iter()
                .filter(move |element| !hidden.contains(&element.layer_id))
        }

        /// 分配新的图元 ID。
        pub fn allocate_element_id(&mut self) -> ElementId {
            let id = self.next_element_id;
            self.next_element_id += 1;
            ElementId::new(format!("{ELEMENT_ID_PREFIX}{id}"))
        }

        /// 在指定位置插入图元。ID 重复或图层不存在时拒绝插入。
        pub fn insert_element(&mut self, index: usize, element: Element) -> bool {
            if self.contains(&element.id) || !self.has_layer(&element.layer_id) {
                return false;
            }
            self.reserve_element_id(&element.id);
            let index = index.min(self.elements.len());
            self.elements.insert(index, element);
            true
        }

        #[inline]
        pub fn push_element(&mut self, element: Element) -> bool {
            let len = self.elements.len();
            self.insert_element(len, element)
        }

        /// 以同 ID 的新值替换图元，返回旧值。
        pub fn replace_element(&mut self, element: Element) -> Option<Element> {
            let slot = self.element_mut(&element.id)?;
            Some(std::mem::replace(slot, element))
        }

        pub fn take_element(&mut self, id: &ElementId) -> Option<(usize, Element)> {
            let index = self.element_index(id)?;
            Some((index, self.elements.remove(index)))
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for element in &self.elements {
                if let Some(element_bounds) = element_bounds(element) {
                    bounds.include_bounds(&element_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        pub fn to_project_data(&self, snap_settings: Option<SnapSettings>) -> ProjectData {
            ProjectData {
                layers: self.layers.clone(),
                elements: self.elements.clone(),
                active_layer_id: self.active_layer.clone(),
                snap_settings,
            }
        }

        /// 从快照重建文档，并修复破坏不变量的数据：
        /// 保证至少一个图层、当前图层有效、图元引用存在的图层且 ID 唯一。
        pub fn from_project_data(data: ProjectData) -> (Self, LoadReport) {
            let ProjectData {
                layers,
                elements,
                active_layer_id,
                ..
            } = data;
            let mut report = LoadReport::default();
            let mut document = Self {
                layers: Vec::with_capacity(layers.len()),
                elements: Vec::with_capacity(elements.len()),
                active_layer: active_layer_id,
                next_element_id: 1,
                next_layer_id: 1,
            };

            for layer in layers {
                document.reserve_layer_id(&layer.id);
                if document.has_layer(&layer.id) {
                    report.dropped_duplicate_layers.push(layer.id);
                } else {
                    document.layers.push(layer);
                }
            }
            if document.layers.is_empty() {
                let id = document.allocate_layer_id();
                document.layers.push(Layer::new(id, "Layer 1"));
                report.created_default_layer = true;
            }
            if !document.has_layer(&document.active_layer) {
                document.active_layer = document.layers[0].id.clone();
                report.active_layer_replaced = true;
            }

            for mut element in elements {
                if document.contains(&element.id) {
                    report.dropped_duplicates.push(element.id);
                    continue;
                }
                if !document.has_layer(&element.layer_id) {
                    element.layer_id = document.active_layer.clone();
                    report.reassigned_elements.push(element.id.clone());
                }
                if element.normalize_opacity() {
                    report.clamped_opacity.push(element.id.clone());
                }
                document.reserve_element_id(&element.id);
                document.elements.push(element);
            }

            (document, report)
        }

        fn reserve_element_id(&mut self, id: &ElementId) {
            if let Some(value) = numeric_suffix(id.as_str(), ELEMENT_ID_PREFIX) {
                self.next_element_id = self.next_element_id.max(value + 1);
            }
        }

        fn reserve_layer_id(&mut self, id: &LayerId) {
            if let Some(value) = numeric_suffix(id.as_str(), LAYER_ID_PREFIX) {
                self.next_layer_id = self.next_layer_id.max(value + 1);
            }
        }
    }

    fn numeric_suffix(raw: &str, prefix: &str) -> Option<u64> {
        raw.strip_prefix(prefix)?.parse().ok()
    }

}
