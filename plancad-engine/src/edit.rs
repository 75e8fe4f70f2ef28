//! 编辑命令与其作用对象。
//!
//! 每条命令都捕获完整的图元副本（或图层连同其上的图元），撤销时直接写回，
//! 不依赖实时状态重新推导。

use serde::{Deserialize, Serialize};

use plancad_core::document::{Document, Element, ElementId, Layer, LayerId};

use crate::catalog::FurnitureCatalog;
use crate::history::Command;

/// 单个页面的可编辑内容：文档、选中集和家具目录索引。
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub(crate) document: Document,
    pub(crate) selection: Vec<ElementId>,
    pub(crate) catalog: FurnitureCatalog,
}

impl Sheet {
    pub fn new(document: Document) -> Self {
        let mut catalog = FurnitureCatalog::new();
        catalog.rebuild(document.elements());
        Self {
            document,
            selection: Vec::new(),
            catalog,
        }
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[inline]
    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    #[inline]
    pub fn catalog(&self) -> &FurnitureCatalog {
        &self.catalog
    }

    fn prune_selection(&mut self, id: &ElementId) {
        self.selection.retain(|selected| selected != id);
    }

    fn insert(&mut self, index: usize, element: &Element) {
        if self.document.insert_element(index, element.clone()) {
            self.catalog.sync(element);
        }
    }

    fn take(&mut self, id: &ElementId) {
        if self.document.take_element(id).is_some() {
            self.catalog.remove(id);
            self.prune_selection(id);
        }
    }

    fn replace(&mut self, element: &Element) {
        if self.document.replace_element(element.clone()).is_some() {
            self.catalog.sync(element);
        }
    }
}

/// 一次属性修改的前后快照。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementChange {
    pub before: Element,
    pub after: Element,
}

/// 记录原位置的图元，按原下标升序保存。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedElement {
    pub index: usize,
    pub element: Element,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum EditCommand {
    /// 追加图元并将其设为选中集。
    AddElements { elements: Vec<Element> },
    UpdateElements { changes: Vec<ElementChange> },
    RemoveElements { removed: Vec<PlacedElement> },
    /// 插入图层并设为当前图层。
    AddLayer {
        index: usize,
        layer: Layer,
        previous_active: LayerId,
    },
    /// 移除图层及其上的全部图元。
    RemoveLayer {
        index: usize,
        layer: Layer,
        elements: Vec<PlacedElement>,
        was_active: bool,
    },
    /// 按顺序执行、逆序撤销的一组命令。
    Batch {
        label: String,
        commands: Vec<EditCommand>,
    },
}

impl EditCommand {
    /// 把 `(before, after)` 对转换为更新命令，丢弃没有变化的项。
    pub fn updates(changes: impl IntoIterator<Item = ElementChange>) -> Option<Self> {
        let changes: Vec<ElementChange> = changes
            .into_iter()
            .filter(|change| change.before != change.after)
            .collect();
        if changes.is_empty() {
            None
        } else {
            Some(EditCommand::UpdateElements { changes })
        }
    }

    /// 组合命令；只有一条时直接返回该命令。
    pub fn batch(label: impl Into<String>, mut commands: Vec<EditCommand>) -> Option<Self> {
        match commands.len() {
            0 => None,
            1 => commands.pop(),
            _ => Some(EditCommand::Batch {
                label: label.into(),
                commands,
            }),
        }
    }

    /// 命令涉及的图元 ID。
    pub fn touched_elements(&self) -> Vec<ElementId> {
        match self {
            EditCommand::AddElements { elements } => elements.iter().map(|e| e.id.clone()).collect(),
            EditCommand::UpdateElements { changes } => {
                changes.iter().map(|change| change.after.id.clone()).collect()
            }
            EditCommand::RemoveElements { removed }
            | EditCommand::RemoveLayer {
                elements: removed, ..
            } => removed.iter().map(|placed| placed.element.id.clone()).collect(),
            EditCommand::AddLayer { .. } => Vec::new(),
            EditCommand::Batch { commands, .. } => {
                commands.iter().flat_map(EditCommand::touched_elements).collect()
            }
        }
    }
}

impl Command<Sheet> for EditCommand {
    fn execute(&self, sheet: &mut Sheet) {
        match self {
            EditCommand::AddElements { elements } => {
                for element in elements {
                    let end = sheet.document.element_count();
                    sheet.insert(end, element);
                }
                sheet.selection = elements
                    .iter()
                    .map(|element| element.id.clone())
                    .filter(|id| sheet.document.contains(id))
                    .collect();
            }
            EditCommand::UpdateElements { changes } => {
                for change in changes {
                    sheet.replace(&change.after);
                }
            }
            EditCommand::RemoveElements { removed } => {
                for placed in removed.iter().rev() {
                    sheet.take(&placed.element.id);
                }
            }
            EditCommand::AddLayer { index, layer, .. } => {
                if sheet.document.insert_layer(*index, layer.clone()) {
                    sheet.document.set_active_layer(&layer.id);
                }
            }
            EditCommand::RemoveLayer {
                layer, elements, ..
            } => {
                for placed in elements.iter().rev() {
                    sheet.take(&placed.element.id);
                }
                sheet.document.take_layer(&layer.id);
            }
            EditCommand::Batch { commands, .. } => {
                for command in commands {
                    command.execute(sheet);
                }
            }
        }
    }

    fn undo(&self, sheet: &mut Sheet) {
        match self {
            EditCommand::AddElements { elements } => {
                for element in elements.iter().rev() {
                    sheet.take(&element.id);
                }
            }
            EditCommand::UpdateElements { changes } => {
                for change in changes.iter().rev() {
                    sheet.replace(&change.before);
                }
            }
            EditCommand::RemoveElements { removed } => {
                for placed in removed {
                    sheet.insert(placed.index, &placed.element);
                }
            }
            EditCommand::AddLayer {
                layer,
                previous_active,
                ..
            } => {
                sheet.document.take_layer(&layer.id);
                sheet.document.set_active_layer(previous_active);
            }
            EditCommand::RemoveLayer {
                index,
                layer,
                elements,
                was_active,
            } => {
                sheet.document.insert_layer(*index, layer.clone());
                if *was_active {
                    sheet.document.set_active_layer(&layer.id);
                }
                for placed in elements {
                    sheet.insert(placed.index, &placed.element);
                }
            }
            EditCommand::Batch { commands, .. } => {
                for command in commands.iter().rev() {
                    command.undo(sheet);
                }
            }
        }
    }

    fn description(&self) -> String {
        match self {
            EditCommand::AddElements { elements } => match elements.as_slice() {
                [single] => format!("添加 {}", single.kind()),
                many => format!("添加 {} 个图元", many.len()),
            },
            EditCommand::UpdateElements { changes } => match changes.as_slice() {
                [single] => format!("修改 {}", single.after.kind()),
                many => format!("修改 {} 个图元", many.len()),
            },
            EditCommand::RemoveElements { removed } => format!("删除 {} 个图元", removed.len()),
            EditCommand::AddLayer { layer, .. } => format!("新建图层 {}", layer.name),
            EditCommand::RemoveLayer { layer, .. } => format!("删除图层 {}", layer.name),
            EditCommand::Batch { label, .. } => label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plancad_core::document::{Rectangle, Shape};
    use plancad_core::geometry::Point2;

    fn rect(sheet: &mut Sheet, x: f64) -> Element {
        let id = sheet.document.allocate_element_id();
        Element::new(
            id,
            sheet.document.active_layer_id().clone(),
            Point2::new(x, 0.0),
            Shape::Rectangle(Rectangle {
                width: 10.0,
                height: 10.0,
                fill: None,
                corner_radius: 0.0,
            }),
        )
    }

    #[test]
    fn add_selects_and_undo_prunes() {
        let mut sheet = Sheet::default();
        let element = rect(&mut sheet, 0.0);
        let command = EditCommand::AddElements {
            elements: vec![element.clone()],
        };
        command.execute(&mut sheet);
        assert_eq!(sheet.selection(), &[element.id.clone()]);

        command.undo(&mut sheet);
        assert!(sheet.selection().is_empty());
        assert_eq!(sheet.document().element_count(), 0);
    }

    #[test]
    fn remove_restores_original_order() {
        let mut sheet = Sheet::default();
        let elements: Vec<Element> = (0..4).map(|i| rect(&mut sheet, i as f64 * 20.0)).collect();
        EditCommand::AddElements {
            elements: elements.clone(),
        }
        .execute(&mut sheet);

        let remove = EditCommand::RemoveElements {
            removed: vec![
                PlacedElement {
                    index: 1,
                    element: elements[1].clone(),
                },
                PlacedElement {
                    index: 3,
                    element: elements[3].clone(),
                },
            ],
        };
        remove.execute(&mut sheet);
        assert_eq!(sheet.document().element_count(), 2);
        assert_eq!(sheet.selection().len(), 2);

        remove.undo(&mut sheet);
        assert_eq!(sheet.document().elements(), elements.as_slice());
    }

    #[test]
    fn remove_layer_round_trip() {
        let mut sheet = Sheet::default();
        let base = sheet.document.active_layer_id().clone();
        let id = sheet.document.allocate_layer_id();
        let add = EditCommand::AddLayer {
            index: 1,
            layer: Layer::new(id.clone(), "Cabinets"),
            previous_active: base.clone(),
        };
        add.execute(&mut sheet);
        assert_eq!(sheet.document().active_layer_id(), &id);

        let element = rect(&mut sheet, 0.0);
        let place = EditCommand::AddElements {
            elements: vec![element.clone()],
        };
        place.execute(&mut sheet);

        let remove = EditCommand::RemoveLayer {
            index: 1,
            layer: Layer::new(id.clone(), "Cabinets"),
            elements: vec![PlacedElement {
                index: 0,
                element: element.clone(),
            }],
            was_active: true,
        };
        remove.execute(&mut sheet);
        assert_eq!(sheet.document().layer_count(), 1);
        assert_eq!(sheet.document().active_layer_id(), &base);
        assert_eq!(sheet.document().element_count(), 0);

        remove.undo(&mut sheet);
        assert_eq!(sheet.document().active_layer_id(), &id);
        assert_eq!(sheet.document().element(&element.id), Some(&element));

        place.undo(&mut sheet);
        add.undo(&mut sheet);
        assert_eq!(sheet.document().active_layer_id(), &base);
        assert_eq!(sheet.document().layer_count(), 1);
        assert_eq!(sheet.document().element_count(), 0);
    }

    #[test]
    fn batch_undoes_in_reverse() {
        let mut sheet = Sheet::default();
        let element = rect(&mut sheet, 0.0);
        let mut moved = element.clone();
        moved.x = 40.0;
        let command = EditCommand::batch(
            "放置",
            vec![
                EditCommand::AddElements {
                    elements: vec![element.clone()],
                },
                EditCommand::updates([ElementChange {
                    before: element.clone(),
                    after: moved.clone(),
                }])
                .expect("changed"),
            ],
        )
        .expect("non-empty");
        command.execute(&mut sheet);
        assert_eq!(sheet.document().element(&element.id), Some(&moved));
        command.undo(&mut sheet);
        assert_eq!(sheet.document().element_count(), 0);
        assert_eq!(command.description(), "放置");
    }

    #[test]
    fn commands_serialize_as_plain_data() {
        let mut sheet = Sheet::default();
        let element = rect(&mut sheet, 0.0);
        let command = EditCommand::AddElements {
            elements: vec![element],
        };
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(json["op"], "addElements");
        let back: EditCommand = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, command);
    }
}
