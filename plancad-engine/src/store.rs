//! 文档存储：多页面、图层、图元、选中集、视图与编辑设置的聚合。
//!
//! 所有图元和图层结构的修改都包装为 [`EditCommand`] 交给当前页面的历史栈执行；
//! 图层的显示属性（名称、可见、锁定、顺序、当前图层）直接修改，不进入历史。
//! 对不存在或锁定的目标的操作一律静默返回 `false`。

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use plancad_core::collision::{self, element_bounds};
use plancad_core::document::{
    DEFAULT_STROKE, DEFAULT_STROKE_WIDTH, DEFAULT_WALL_THICKNESS, Document, Element, ElementId,
    ElementPatch, Layer, LayerId, LoadReport, PageData, ProjectBundle, ProjectData, Shape,
    SnapSettings,
};
use plancad_core::geometry::{Bounds2D, Point2, Vector2};
use plancad_core::simplify::{DEFAULT_MIN_DISTANCE, FREEHAND_TOLERANCE, POLYLINE_TOLERANCE};
use plancad_core::walls::{LINK_THRESHOLD, WallEndpoint, WallLinker, wall_endpoints};

use crate::catalog::FurnitureCatalog;
use crate::edit::{EditCommand, ElementChange, PlacedElement, Sheet};
use crate::history::{Command, CommandStack, DEFAULT_HISTORY_CAPACITY};
use crate::interaction::Tool;
use crate::view::ViewTransform;

const PAGE_ID_PREFIX: &str = "page-";

/// 编辑器行为参数，通常由配置文件映射而来。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorSettings {
    pub history_capacity: usize,
    pub link_threshold: f64,
    pub link_mode: bool,
    pub freehand_min_distance: f64,
    pub freehand_tolerance: f64,
    pub polyline_tolerance: f64,
    pub avoid_overlap: bool,
    /// 像素到实际长度的线性换算系数。
    pub units_per_pixel: f64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            link_threshold: LINK_THRESHOLD,
            link_mode: false,
            freehand_min_distance: DEFAULT_MIN_DISTANCE,
            freehand_tolerance: FREEHAND_TOLERANCE,
            polyline_tolerance: POLYLINE_TOLERANCE,
            avoid_overlap: false,
            units_per_pixel: 1.0,
        }
    }
}

/// 新建图元时使用的样式。
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingSettings {
    pub stroke: String,
    pub stroke_width: f64,
    pub dash: Option<Vec<f64>>,
    pub wall_thickness: f64,
    pub font_size: f64,
}

impl Default for DrawingSettings {
    fn default() -> Self {
        Self {
            stroke: DEFAULT_STROKE.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            dash: None,
            wall_thickness: DEFAULT_WALL_THICKNESS,
            font_size: 14.0,
        }
    }
}

impl DrawingSettings {
    fn apply(&self, element: &mut Element) {
        element.stroke = self.stroke.clone();
        element.stroke_width = self.stroke_width;
        element.dash = self.dash.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    #[inline]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 页面：独立的文档内容与历史。
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    name: String,
    sheet: Sheet,
    history: CommandStack<EditCommand>,
}

impl Page {
    fn new(id: PageId, name: String, document: Document, capacity: usize) -> Self {
        Self {
            id,
            name,
            sheet: Sheet::new(document),
            history: CommandStack::new(capacity),
        }
    }

    #[inline]
    pub fn id(&self) -> &PageId {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn document(&self) -> &Document {
        self.sheet.document()
    }

    #[inline]
    pub fn history(&self) -> &CommandStack<EditCommand> {
        &self.history
    }
}

#[derive(Debug)]
pub struct DocumentStore {
    pages: Vec<Page>,
    active: usize,
    next_page_id: u64,
    tool: Tool,
    view: ViewTransform,
    snap: SnapSettings,
    drawing: DrawingSettings,
    settings: EditorSettings,
    link_mode: bool,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::with_settings(EditorSettings::default())
    }

    pub fn with_settings(settings: EditorSettings) -> Self {
        let first = Page::new(
            PageId::new(format!("{PAGE_ID_PREFIX}1")),
            "Page 1".to_string(),
            Document::new(),
            settings.history_capacity,
        );
        Self {
            pages: vec![first],
            active: 0,
            next_page_id: 2,
            tool: Tool::default(),
            view: ViewTransform::default(),
            snap: SnapSettings::default(),
            drawing: DrawingSettings::default(),
            settings,
            link_mode: settings.link_mode,
        }
    }

    #[inline]
    fn page(&self) -> &Page {
        &self.pages[self.active]
    }

    #[inline]
    fn page_mut(&mut self) -> &mut Page {
        &mut self.pages[self.active]
    }

    #[inline]
    fn sheet_mut(&mut self) -> &mut Sheet {
        &mut self.page_mut().sheet
    }

    #[inline]
    pub fn document(&self) -> &Document {
        self.page().sheet.document()
    }

    #[inline]
    pub fn elements(&self) -> &[Element] {
        self.document().elements()
    }

    #[inline]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.document().element(id)
    }

    #[inline]
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.document().layers()
    }

    #[inline]
    pub fn active_layer_id(&self) -> &LayerId {
        self.document().active_layer_id()
    }

    pub fn visible_elements(&self) -> impl Iterator<Item = &Element> {
        self.document().visible_elements()
    }

    #[inline]
    pub fn catalog(&self) -> &FurnitureCatalog {
        self.page().sheet.catalog()
    }

    fn is_editable(&self, element: &Element) -> bool {
        self.document().is_layer_editable(&element.layer_id)
    }

    #[inline]
    pub fn linker(&self) -> WallLinker {
        WallLinker::new(self.settings.link_threshold)
    }

    fn execute(&mut self, command: EditCommand) {
        debug!(command = %<EditCommand as Command<Sheet>>::description(&command), "执行编辑命令");
        let page = self.page_mut();
        page.history.execute(command, &mut page.sheet);
    }

    // ---- 图元 ----

    pub fn allocate_element_id(&mut self) -> ElementId {
        self.sheet_mut().document.allocate_element_id()
    }

    /// 以当前绘图样式在当前图层上创建图元，返回新 ID。当前图层锁定时返回 `None`。
    pub fn create_element(&mut self, position: Point2, shape: Shape) -> Option<ElementId> {
        let layer_id = self.active_layer_id().clone();
        if !self.document().is_layer_editable(&layer_id) {
            debug!(layer = %layer_id, "当前图层已锁定，忽略新建图元");
            return None;
        }
        let id = self.allocate_element_id();
        let mut element = Element::new(id.clone(), layer_id, position, shape);
        self.drawing.apply(&mut element);
        self.add_element(element).then_some(id)
    }

    /// 添加图元并自动选中。ID 重复、图层不存在或锁定时返回 `false`。
    pub fn add_element(&mut self, mut element: Element) -> bool {
        if element.normalize_opacity() {
            debug!(id = %element.id, opacity = element.opacity, "不透明度超出范围，已修正");
        }
        let document = self.document();
        if document.contains(&element.id) {
            debug!(id = %element.id, "图元 ID 已存在，忽略添加");
            return false;
        }
        if !document.is_layer_editable(&element.layer_id) {
            debug!(id = %element.id, layer = %element.layer_id, "目标图层不存在或已锁定");
            return false;
        }
        let label = format!("添加 {}", element.kind());
        self.commit_additions(label, vec![element])
    }

    /// 将新图元与因墙体连接变化而需要刷新的已有图元合成一条命令。
    fn commit_additions(&mut self, label: String, additions: Vec<Element>) -> bool {
        if additions.is_empty() {
            return false;
        }
        let existing = self.elements();
        let count = existing.len();
        let has_wall = additions.iter().any(Element::is_wall);
        let mut working: Vec<Element> = existing.iter().cloned().chain(additions).collect();
        if has_wall {
            self.refresh_connections(&mut working);
        }
        let updates = diff_elements(existing, &working[..count]);
        let added = working.split_off(count);

        let mut commands = vec![EditCommand::AddElements { elements: added }];
        commands.extend(EditCommand::updates(updates));
        match EditCommand::batch(label, commands) {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    /// 局部更新图元属性。图元不存在、所在图层锁定、目标图层不可用或没有实际变化时返回 `false`。
    pub fn update_element(&mut self, id: &ElementId, patch: &ElementPatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        let document = self.document();
        let Some(index) = document.element_index(id) else {
            debug!(%id, "更新的图元不存在");
            return false;
        };
        let current = &document.elements()[index];
        if !self.is_editable(current) {
            debug!(%id, "图元所在图层已锁定，忽略更新");
            return false;
        }
        if let Some(target) = &patch.layer_id {
            if !document.is_layer_editable(target) {
                debug!(%id, layer = %target, "目标图层不存在或已锁定");
                return false;
            }
        }

        let mut working = document.elements().to_vec();
        working[index].apply_patch(patch);
        if working[index].is_wall() {
            self.refresh_connections(&mut working);
        }
        let changes = diff_elements(document.elements(), &working);
        match EditCommand::updates(changes) {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    pub fn remove_element(&mut self, id: &ElementId) -> bool {
        self.remove_elements(std::slice::from_ref(id)) == 1
    }

    /// 删除多个图元，作为一条命令记录。返回实际删除的数量。
    pub fn remove_elements(&mut self, ids: &[ElementId]) -> usize {
        let document = self.document();
        let removed: Vec<PlacedElement> = document
            .elements()
            .iter()
            .enumerate()
            .filter(|(_, element)| ids.contains(&element.id) && self.is_editable(element))
            .map(|(index, element)| PlacedElement {
                index,
                element: element.clone(),
            })
            .collect();
        if removed.is_empty() {
            debug!(requested = ids.len(), "没有可删除的图元");
            return 0;
        }

        let mut updates = Vec::new();
        if removed.iter().any(|placed| placed.element.is_wall()) {
            let survivors: Vec<Element> = document
                .elements()
                .iter()
                .filter(|element| !removed.iter().any(|placed| placed.element.id == element.id))
                .cloned()
                .collect();
            let mut working = survivors.clone();
            self.refresh_connections(&mut working);
            updates = diff_elements(&survivors, &working);
        }

        let count = removed.len();
        let mut commands = vec![EditCommand::RemoveElements { removed }];
        commands.extend(EditCommand::updates(updates));
        if let Some(command) = EditCommand::batch(format!("删除 {count} 个图元"), commands) {
            self.execute(command);
        }
        count
    }

    /// 平移图元。连接模式下，移动的墙体会带动直接相连墙体的对应端点。
    pub fn move_elements(&mut self, ids: &[ElementId], dx: f64, dy: f64) -> bool {
        if (dx == 0.0 && dy == 0.0) || !dx.is_finite() || !dy.is_finite() {
            return false;
        }
        let document = self.document();
        let moving: Vec<usize> = document
            .elements()
            .iter()
            .enumerate()
            .filter(|(_, element)| ids.contains(&element.id) && self.is_editable(element))
            .map(|(index, _)| index)
            .collect();
        if moving.is_empty() {
            debug!(requested = ids.len(), "没有可移动的图元");
            return false;
        }

        let mut working = document.elements().to_vec();
        let moved_walls: Vec<ElementId> = moving
            .iter()
            .filter(|&&index| working[index].is_wall())
            .map(|&index| working[index].id.clone())
            .collect();
        let touched_wall = !moved_walls.is_empty();
        // 联动按移动前的几何一次性规划，共享端点只平移一次
        let linked =
            self.linker()
                .linked_group_updates(&moved_walls, dx, dy, document.elements(), self.link_mode);
        for update in linked {
            let Some(target) = working.iter_mut().find(|e| e.id == update.id) else {
                continue;
            };
            // 锁定图层上的墙保持不动
            if !self.is_editable(target) {
                continue;
            }
            target.apply_patch(&update.patch);
        }
        for &index in &moving {
            let element = &mut working[index];
            element.x += dx;
            element.y += dy;
        }
        if touched_wall {
            self.refresh_connections(&mut working);
        }

        let changes = diff_elements(document.elements(), &working);
        match EditCommand::updates(changes) {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    /// 把墙体的一个端点拉伸到绝对坐标 `target`，连接模式下同步相邻墙体。
    pub fn stretch_wall(&mut self, id: &ElementId, which: WallEndpoint, target: Point2) -> bool {
        let document = self.document();
        let Some(index) = document.element_index(id) else {
            debug!(%id, "拉伸的墙体不存在");
            return false;
        };
        let wall = &document.elements()[index];
        if wall_endpoints(wall).is_none() || !self.is_editable(wall) {
            debug!(%id, "图元不是可编辑的墙体");
            return false;
        }

        let mut working = document.elements().to_vec();
        let linked =
            self.linker()
                .linked_wall_stretch_updates(id, which, target, document.elements(), self.link_mode);
        for update in linked {
            let Some(neighbour) = working.iter().position(|e| e.id == update.id) else {
                continue;
            };
            if self.is_editable(&working[neighbour]) {
                working[neighbour].apply_patch(&update.patch);
            }
        }

        let element = &mut working[index];
        let origin = element.position();
        if let Some(points) = element.shape.points_mut() {
            let pairs = points.len() / 2;
            let slot = match which {
                WallEndpoint::Start => 0,
                WallEndpoint::End => (pairs - 1) * 2,
            };
            points[slot] = target.x() - origin.x();
            points[slot + 1] = target.y() - origin.y();
        }
        self.refresh_connections(&mut working);

        let changes = diff_elements(document.elements(), &working);
        match EditCommand::updates(changes) {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    /// 复制选中图元（分配新 ID 并偏移），新副本成为选中集。
    pub fn duplicate_selection(&mut self, offset: Vector2) -> Vec<ElementId> {
        let sources: Vec<Element> = self
            .elements()
            .iter()
            .filter(|element| self.is_selected(&element.id) && self.is_editable(element))
            .cloned()
            .collect();
        if sources.is_empty() {
            return Vec::new();
        }
        let mut copies = Vec::with_capacity(sources.len());
        for mut element in sources {
            element.id = self.allocate_element_id();
            element.x += offset.x();
            element.y += offset.y();
            if let Shape::Wall(wall) = &mut element.shape {
                wall.connected_walls.clear();
            }
            copies.push(element);
        }
        let ids: Vec<ElementId> = copies.iter().map(|element| element.id.clone()).collect();
        let label = format!("复制 {} 个图元", copies.len());
        if self.commit_additions(label, copies) {
            ids
        } else {
            Vec::new()
        }
    }

    /// 重新计算墙体连接快照，跳过锁定图层上的墙。
    fn refresh_connections(&self, working: &mut [Element]) {
        for update in self.linker().connection_snapshot(working) {
            if let Some(element) = working.iter_mut().find(|e| e.id == update.id) {
                if self.document().is_layer_editable(&element.layer_id) {
                    element.apply_patch(&update.patch);
                }
            }
        }
    }

    // ---- 历史 ----

    pub fn undo(&mut self) -> bool {
        let page = self.page_mut();
        let undone = page.history.undo(&mut page.sheet);
        if !undone {
            debug!("没有可撤销的操作");
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let page = self.page_mut();
        let redone = page.history.redo(&mut page.sheet);
        if !redone {
            debug!("没有可重做的操作");
        }
        redone
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        self.page().history.can_undo()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        self.page().history.can_redo()
    }

    #[inline]
    pub fn history(&self) -> &CommandStack<EditCommand> {
        &self.page().history
    }

    // ---- 图层 ----

    /// 新建图层（置于最上层）并设为当前图层，进入历史。
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let id = self.sheet_mut().document.allocate_layer_id();
        let command = EditCommand::AddLayer {
            index: self.document().layer_count(),
            layer: Layer::new(id.clone(), name),
            previous_active: self.active_layer_id().clone(),
        };
        self.execute(command);
        id
    }

    /// 删除图层及其上的图元，进入历史。最后一个图层不能删除。
    pub fn remove_layer(&mut self, id: &LayerId) -> bool {
        let document = self.document();
        if document.layer_count() <= 1 {
            debug!(layer = %id, "不能删除最后一个图层");
            return false;
        }
        let (Some(index), Some(layer)) = (document.layer_index(id), document.layer(id)) else {
            debug!(layer = %id, "图层不存在");
            return false;
        };
        let elements: Vec<PlacedElement> = document
            .elements()
            .iter()
            .enumerate()
            .filter(|(_, element)| &element.layer_id == id)
            .map(|(index, element)| PlacedElement {
                index,
                element: element.clone(),
            })
            .collect();
        let mut updates = Vec::new();
        if elements.iter().any(|placed| placed.element.is_wall()) {
            let survivors: Vec<Element> = document
                .elements()
                .iter()
                .filter(|element| &element.layer_id != id)
                .cloned()
                .collect();
            let mut working = survivors.clone();
            self.refresh_connections(&mut working);
            updates = diff_elements(&survivors, &working);
        }

        let label = format!("删除图层 {}", layer.name);
        let mut commands = vec![EditCommand::RemoveLayer {
            index,
            layer: layer.clone(),
            elements,
            was_active: document.active_layer_id() == id,
        }];
        commands.extend(EditCommand::updates(updates));
        if let Some(command) = EditCommand::batch(label, commands) {
            self.execute(command);
        }
        true
    }

    fn with_layer(&mut self, id: &LayerId, apply: impl FnOnce(&mut Layer)) -> bool {
        match self.sheet_mut().document.layer_mut(id) {
            Some(layer) => {
                apply(layer);
                true
            }
            None => {
                debug!(layer = %id, "图层不存在");
                false
            }
        }
    }

    pub fn rename_layer(&mut self, id: &LayerId, name: impl Into<String>) -> bool {
        let name = name.into();
        self.with_layer(id, |layer| layer.name = name)
    }

    pub fn set_layer_visible(&mut self, id: &LayerId, visible: bool) -> bool {
        self.with_layer(id, |layer| layer.visible = visible)
    }

    pub fn set_layer_locked(&mut self, id: &LayerId, locked: bool) -> bool {
        self.with_layer(id, |layer| layer.locked = locked)
    }

    pub fn set_layer_color(&mut self, id: &LayerId, color: Option<String>) -> bool {
        self.with_layer(id, |layer| layer.color = color)
    }

    pub fn move_layer(&mut self, id: &LayerId, index: usize) -> bool {
        self.sheet_mut().document.move_layer(id, index).is_some()
    }

    pub fn set_active_layer(&mut self, id: &LayerId) -> bool {
        self.sheet_mut().document.set_active_layer(id)
    }

    // ---- 选中集 ----

    #[inline]
    pub fn selection(&self) -> &[ElementId] {
        self.page().sheet.selection()
    }

    #[inline]
    pub fn selection_len(&self) -> usize {
        self.selection().len()
    }

    #[inline]
    pub fn is_selected(&self, id: &ElementId) -> bool {
        self.selection().contains(id)
    }

    /// 替换选中集，不存在的 ID 会被丢弃。
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        let mut selection: Vec<ElementId> = Vec::new();
        for id in ids {
            if self.document().contains(&id) && !selection.contains(&id) {
                selection.push(id);
            }
        }
        self.sheet_mut().selection = selection;
    }

    pub fn select(&mut self, id: &ElementId) -> bool {
        if !self.document().contains(id) {
            debug!(%id, "选中的图元不存在");
            return false;
        }
        if !self.is_selected(id) {
            self.sheet_mut().selection.push(id.clone());
        }
        true
    }

    pub fn deselect(&mut self, id: &ElementId) -> bool {
        let selection = &mut self.sheet_mut().selection;
        let before = selection.len();
        selection.retain(|selected| selected != id);
        selection.len() != before
    }

    /// 切换选中状态，返回切换后的状态；图元不存在时返回 `false`。
    pub fn toggle_selection(&mut self, id: &ElementId) -> bool {
        if self.deselect(id) {
            false
        } else {
            self.select(id)
        }
    }

    #[inline]
    pub fn clear_selection(&mut self) {
        self.sheet_mut().selection.clear();
    }

    /// 选中可见且未锁定图层上的全部图元。
    pub fn select_all(&mut self) -> usize {
        let ids: Vec<ElementId> = self
            .visible_elements()
            .filter(|element| self.is_editable(element))
            .map(|element| element.id.clone())
            .collect();
        let count = ids.len();
        self.sheet_mut().selection = ids;
        count
    }

    pub fn selection_bounds(&self) -> Option<Bounds2D> {
        union_bounds(
            self.selection()
                .iter()
                .filter_map(|id| self.element(id))
                .filter_map(element_bounds),
        )
    }

    // ---- 工具、视图与设置 ----

    #[inline]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[inline]
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    #[inline]
    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    #[inline]
    pub fn view_mut(&mut self) -> &mut ViewTransform {
        &mut self.view
    }

    /// 视图聚焦选中集，选中集为空时聚焦全部图元。没有可聚焦的范围时返回 `false`。
    pub fn focus_selection(&mut self) -> bool {
        let target = self.selection_bounds().or_else(|| self.document().bounds());
        match target {
            Some(bounds) => {
                self.view.fit_bounds(&bounds);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn snap_settings(&self) -> SnapSettings {
        self.snap
    }

    #[inline]
    pub fn set_snap_settings(&mut self, snap: SnapSettings) {
        self.snap = snap;
    }

    #[inline]
    pub fn snap_point(&self, point: Point2) -> Point2 {
        self.snap.snap(point)
    }

    #[inline]
    pub fn drawing_settings(&self) -> &DrawingSettings {
        &self.drawing
    }

    #[inline]
    pub fn drawing_settings_mut(&mut self) -> &mut DrawingSettings {
        &mut self.drawing
    }

    #[inline]
    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// 替换编辑器设置；历史容量同步到所有页面，连接模式重置为设置中的值。
    pub fn apply_settings(&mut self, settings: EditorSettings) {
        for page in &mut self.pages {
            page.history.set_capacity(settings.history_capacity);
        }
        self.link_mode = settings.link_mode;
        self.settings = settings;
    }

    #[inline]
    pub fn link_mode(&self) -> bool {
        self.link_mode
    }

    #[inline]
    pub fn set_link_mode(&mut self, enabled: bool) {
        self.link_mode = enabled;
    }

    pub fn toggle_link_mode(&mut self) -> bool {
        self.link_mode = !self.link_mode;
        self.link_mode
    }

    // ---- 碰撞与测量 ----

    /// 与指定图元包围盒重叠的其他图元。
    pub fn collisions_for(&self, id: &ElementId) -> Vec<ElementId> {
        let Some(element) = self.element(id) else {
            return Vec::new();
        };
        collision::check_collision(element, self.elements(), &[])
            .into_iter()
            .map(|other| other.id.clone())
            .collect()
    }

    /// 可见图元之间所有重叠的图元对，按文档顺序。
    pub fn colliding_pairs(&self) -> Vec<(ElementId, ElementId)> {
        let boxed: Vec<(&ElementId, Bounds2D)> = self
            .visible_elements()
            .filter_map(|element| element_bounds(element).map(|bounds| (&element.id, bounds)))
            .collect();
        let mut pairs = Vec::new();
        for (i, (a, a_bounds)) in boxed.iter().enumerate() {
            for (b, b_bounds) in &boxed[i + 1..] {
                if collision::boxes_overlap(a_bounds, b_bounds) {
                    pairs.push(((*a).clone(), (*b).clone()));
                }
            }
        }
        pairs
    }

    pub fn collision_free_position(&self, id: &ElementId) -> Option<Point2> {
        let element = self.element(id)?;
        collision::collision_free_position(element, self.elements(), &[])
    }

    /// 尺寸标注的实际长度（像素长度乘以换算系数）。
    pub fn measure_dimension(&self, id: &ElementId) -> Option<f64> {
        match &self.element(id)?.shape {
            Shape::Dimension(dimension) => {
                Some(dimension.pixel_length()? * self.settings.units_per_pixel)
            }
            _ => None,
        }
    }

    pub fn dimension_label(&self, id: &ElementId) -> Option<String> {
        self.measure_dimension(id).map(format_length)
    }

    // ---- 页面 ----

    #[inline]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    #[inline]
    pub fn active_page(&self) -> &Page {
        self.page()
    }

    #[inline]
    pub fn active_page_id(&self) -> &PageId {
        &self.page().id
    }

    fn page_index(&self, id: &PageId) -> Option<usize> {
        self.pages.iter().position(|page| &page.id == id)
    }

    fn allocate_page_id(&mut self) -> PageId {
        loop {
            let id = PageId::new(format!("{PAGE_ID_PREFIX}{}", self.next_page_id));
            self.next_page_id += 1;
            if self.page_index(&id).is_none() {
                return id;
            }
        }
    }

    /// 追加一个空白页面，不切换当前页面。
    pub fn add_page(&mut self, name: impl Into<String>) -> PageId {
        let id = self.allocate_page_id();
        let page = Page::new(
            id.clone(),
            name.into(),
            Document::new(),
            self.settings.history_capacity,
        );
        self.pages.push(page);
        info!(page = %id, "已新建页面");
        id
    }

    /// 切换当前页面：清空目标页面的选中集并重建家具索引。
    pub fn switch_page(&mut self, id: &PageId) -> bool {
        let Some(index) = self.page_index(id) else {
            debug!(page = %id, "页面不存在");
            return false;
        };
        self.active = index;
        self.reset_active_sheet();
        debug!(page = %id, "已切换页面");
        true
    }

    fn reset_active_sheet(&mut self) {
        let sheet = self.sheet_mut();
        sheet.selection.clear();
        let Sheet {
            document, catalog, ..
        } = sheet;
        catalog.rebuild(document.elements());
    }

    /// 删除页面，最后一个页面不能删除。
    pub fn remove_page(&mut self, id: &PageId) -> bool {
        if self.pages.len() <= 1 {
            debug!(page = %id, "不能删除最后一个页面");
            return false;
        }
        let Some(index) = self.page_index(id) else {
            return false;
        };
        self.pages.remove(index);
        if index < self.active {
            self.active -= 1;
        } else if index == self.active {
            self.active = index.min(self.pages.len() - 1);
            self.reset_active_sheet();
        }
        info!(page = %id, "已删除页面");
        true
    }

    pub fn rename_page(&mut self, id: &PageId, name: impl Into<String>) -> bool {
        match self.page_index(id) {
            Some(index) => {
                self.pages[index].name = name.into();
                true
            }
            None => false,
        }
    }

    // ---- 持久化 ----

    /// 当前页面的持久化快照。
    pub fn to_project_data(&self) -> ProjectData {
        self.document().to_project_data(Some(self.snap))
    }

    /// 用快照替换当前页面内容：清空历史和选中集，修复不变量并记录修复结果。
    pub fn load_from_project_data(&mut self, data: ProjectData) -> LoadReport {
        if let Some(snap) = data.snap_settings {
            self.snap = snap;
        }
        let (document, report) = Document::from_project_data(data);
        log_load_report(self.active_page_id(), &report);
        info!(
            page = %self.active_page_id(),
            layers = document.layer_count(),
            elements = document.element_count(),
            "已载入项目数据"
        );
        let page = self.page_mut();
        page.sheet = Sheet::new(document);
        page.history.clear();
        report
    }

    pub fn to_bundle(&self) -> ProjectBundle {
        ProjectBundle {
            pages: self
                .pages
                .iter()
                .map(|page| PageData {
                    id: page.id.to_string(),
                    name: page.name.clone(),
                    project: page.document().to_project_data(Some(self.snap)),
                })
                .collect(),
            active_page_id: self.active_page_id().to_string(),
        }
    }

    /// 载入多页面快照，替换全部页面。空快照得到一个空白页面；
    /// 当前页面 ID 无效时回退到第一页。
    pub fn load_bundle(&mut self, bundle: ProjectBundle) -> Vec<LoadReport> {
        let capacity = self.settings.history_capacity;
        let mut pages: Vec<Page> = Vec::with_capacity(bundle.pages.len());
        let mut reports = Vec::with_capacity(bundle.pages.len());
        let mut snap = None;

        for data in bundle.pages {
            let mut id = PageId::new(data.id);
            if pages.iter().any(|page| page.id == id) {
                warn!(page = %id, "页面 ID 重复，已重新分配");
                id = PageId::new(format!("{id}-{}", pages.len() + 1));
            }
            if id.as_str() == bundle.active_page_id || snap.is_none() {
                snap = data.project.snap_settings.or(snap);
            }
            let (document, report) = Document::from_project_data(data.project);
            log_load_report(&id, &report);
            pages.push(Page::new(id, data.name, document, capacity));
            reports.push(report);
        }
        if pages.is_empty() {
            warn!("项目中没有页面，已创建空白页面");
            pages.push(Page::new(
                PageId::new(format!("{PAGE_ID_PREFIX}1")),
                "Page 1".to_string(),
                Document::new(),
                capacity,
            ));
        }

        self.active = pages
            .iter()
            .position(|page| page.id.as_str() == bundle.active_page_id)
            .unwrap_or(0);
        self.next_page_id = pages
            .iter()
            .filter_map(|page| page.id.as_str().strip_prefix(PAGE_ID_PREFIX)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        self.pages = pages;
        if let Some(snap) = snap {
            self.snap = snap;
        }
        info!(pages = self.pages.len(), active = %self.active_page_id(), "已载入多页面项目");
        reports
    }
}

fn log_load_report(page: &PageId, report: &LoadReport) {
    if report.is_clean() {
        return;
    }
    warn!(
        %page,
        created_default_layer = report.created_default_layer,
        active_layer_replaced = report.active_layer_replaced,
        reassigned = report.reassigned_elements.len(),
        dropped_duplicates = report.dropped_duplicates.len(),
        dropped_duplicate_layers = report.dropped_duplicate_layers.len(),
        clamped_opacity = report.clamped_opacity.len(),
        "项目数据存在不一致，已自动修复"
    );
}

/// 逐项比较两份等长、同序的图元列表，返回有变化的前后快照。
fn diff_elements(before: &[Element], after: &[Element]) -> Vec<ElementChange> {
    before
        .iter()
        .zip(after)
        .filter(|(old, new)| old != new)
        .map(|(old, new)| ElementChange {
            before: old.clone(),
            after: new.clone(),
        })
        .collect()
}

fn union_bounds(boxes: impl Iterator<Item = Bounds2D>) -> Option<Bounds2D> {
    let mut bounds = Bounds2D::empty();
    let mut has = false;
    for item in boxes {
        bounds.include_bounds(&item);
        has = true;
    }
    if has { Some(bounds) } else { None }
}

/// 长度标注文本，保留两位小数。
pub fn format_length(length: f64) -> String {
    format!("{length:.2}")
}
