//! 家具目录索引。
//!
//! 以图元 ID 为键镜像家具图元的目录属性，目录查询无需扫描全部图元。
//! 索引由编辑命令在增删改与撤销/重做时同步，加载和切换页面时整体重建。

use std::collections::BTreeMap;

use plancad_core::document::{Element, ElementId, ModuleClass};

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub module_class: ModuleClass,
    pub width: f64,
    pub height: f64,
    pub label: Option<String>,
    pub finish: Option<String>,
    pub manufacturer: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub metadata: BTreeMap<String, String>,
}

impl CatalogEntry {
    fn from_element(element: &Element) -> Option<Self> {
        let furniture = element.as_furniture()?;
        Some(Self {
            module_class: furniture.module_class,
            width: furniture.width,
            height: furniture.height,
            label: furniture.label.clone(),
            finish: furniture.finish.clone(),
            manufacturer: furniture.manufacturer.clone(),
            sku: furniture.sku.clone(),
            price: furniture.price,
            metadata: furniture.metadata.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FurnitureCatalog {
    entries: BTreeMap<ElementId, CatalogEntry>,
}

impl FurnitureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由图元列表整体重建。
    pub fn rebuild<'a>(&mut self, elements: impl IntoIterator<Item = &'a Element>) {
        self.entries.clear();
        for element in elements {
            self.sync(element);
        }
    }

    /// 按图元当前状态写入或移除条目；非家具图元不会留在索引里。
    pub fn sync(&mut self, element: &Element) {
        match CatalogEntry::from_element(element) {
            Some(entry) => {
                self.entries.insert(element.id.clone(), entry);
            }
            None => {
                self.entries.remove(&element.id);
            }
        }
    }

    pub fn remove(&mut self, id: &ElementId) -> Option<CatalogEntry> {
        self.entries.remove(id)
    }

    #[inline]
    pub fn get(&self, id: &ElementId) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, &CatalogEntry)> {
        self.entries.iter()
    }

    pub fn by_module_class(
        &self,
        module_class: ModuleClass,
    ) -> impl Iterator<Item = (&ElementId, &CatalogEntry)> {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.module_class == module_class)
    }

    pub fn find_by_sku<'a>(&'a self, sku: &'a str) -> impl Iterator<Item = &'a ElementId> + 'a {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.sku.as_deref() == Some(sku))
            .map(|(id, _)| id)
    }

    /// 已标价条目的价格合计。
    pub fn total_price(&self) -> f64 {
        self.entries.values().filter_map(|entry| entry.price).sum()
    }
}
