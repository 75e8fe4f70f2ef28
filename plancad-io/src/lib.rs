use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use plancad_core::document::{PageData, ProjectBundle, ProjectData};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

/// 磁盘上的项目文件：单页快照或多页面包。
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectFile {
    Single(ProjectData),
    Bundle(ProjectBundle),
}

impl ProjectFile {
    pub fn page_count(&self) -> usize {
        match self {
            ProjectFile::Single(_) => 1,
            ProjectFile::Bundle(bundle) => bundle.pages.len(),
        }
    }

    pub fn element_count(&self) -> usize {
        match self {
            ProjectFile::Single(data) => data.elements.len(),
            ProjectFile::Bundle(bundle) => bundle
                .pages
                .iter()
                .map(|page| page.project.elements.len())
                .sum(),
        }
    }
}

pub trait ProjectLoader {
    fn load(&self, path: &Path) -> Result<ProjectFile, IoError>;
}

pub trait ProjectSaver {
    fn save(&self, project: &ProjectFile, path: &Path) -> Result<(), IoError>;
}

/// camelCase JSON 项目文件的读写入口。
#[derive(Debug, Clone, Copy)]
pub struct JsonProjectFacade {
    pretty: bool,
}

impl Default for JsonProjectFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonProjectFacade {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// 输出紧凑 JSON。
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    /// 解析 JSON 文本。带 `pages` 字段的视为多页面包，否则视为单页快照。
    pub fn parse(&self, text: &str) -> Result<ProjectFile, IoError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|err| IoError::InvalidDocument(format!("JSON 语法错误: {err}")))?;
        let Value::Object(map) = &value else {
            return Err(IoError::InvalidDocument(
                "项目文件顶层必须是对象".to_string(),
            ));
        };

        if map.contains_key("pages") {
            let bundle: ProjectBundle = serde_json::from_value(value)
                .map_err(|err| IoError::InvalidDocument(format!("页面包结构无效: {err}")))?;
            validate_bundle(&bundle)?;
            Ok(ProjectFile::Bundle(bundle))
        } else {
            let data: ProjectData = serde_json::from_value(value)
                .map_err(|err| IoError::InvalidDocument(format!("项目结构无效: {err}")))?;
            Ok(ProjectFile::Single(data))
        }
    }

    pub fn to_json(&self, project: &ProjectFile) -> Result<String, IoError> {
        match project {
            ProjectFile::Single(data) => self.encode(data),
            ProjectFile::Bundle(bundle) => {
                validate_bundle(bundle)?;
                self.encode(bundle)
            }
        }
    }

    pub fn load_project(&self, path: &Path) -> Result<ProjectData, IoError> {
        match self.load(path)? {
            ProjectFile::Single(data) => Ok(data),
            ProjectFile::Bundle(_) => Err(IoError::UnsupportedFeature(format!(
                "{path:?} 是多页面包，请使用 load_bundle"
            ))),
        }
    }

    /// 读取多页面包；单页快照会被包装为只有一个页面的包。
    pub fn load_bundle(&self, path: &Path) -> Result<ProjectBundle, IoError> {
        match self.load(path)? {
            ProjectFile::Bundle(bundle) => Ok(bundle),
            ProjectFile::Single(data) => Ok(ProjectBundle {
                pages: vec![PageData {
                    id: "page-1".to_string(),
                    name: "Page 1".to_string(),
                    project: data,
                }],
                active_page_id: "page-1".to_string(),
            }),
        }
    }

    pub fn save_project(&self, data: &ProjectData, path: &Path) -> Result<(), IoError> {
        let text = self.encode(data)?;
        write_text(path, &text)
    }

    pub fn save_bundle(&self, bundle: &ProjectBundle, path: &Path) -> Result<(), IoError> {
        validate_bundle(bundle)?;
        let text = self.encode(bundle)?;
        write_text(path, &text)
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<String, IoError> {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.map_err(|err| IoError::InvalidDocument(format!("序列化失败: {err}")))
    }
}

impl ProjectLoader for JsonProjectFacade {
    fn load(&self, path: &Path) -> Result<ProjectFile, IoError> {
        let text = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let project = self.parse(&text)?;
        info!(
            path = %path.display(),
            pages = project.page_count(),
            elements = project.element_count(),
            "项目已读取"
        );
        Ok(project)
    }
}

impl ProjectSaver for JsonProjectFacade {
    fn save(&self, project: &ProjectFile, path: &Path) -> Result<(), IoError> {
        let text = self.to_json(project)?;
        write_text(path, &text)?;
        info!(
            path = %path.display(),
            pages = project.page_count(),
            elements = project.element_count(),
            "项目已保存"
        );
        Ok(())
    }
}

fn validate_bundle(bundle: &ProjectBundle) -> Result<(), IoError> {
    if bundle.pages.is_empty() {
        return Err(IoError::InvalidDocument("页面包至少需要一个页面".to_string()));
    }
    let mut seen = HashSet::new();
    for page in &bundle.pages {
        if !seen.insert(page.id.as_str()) {
            return Err(IoError::InvalidDocument(format!(
                "页面 ID 重复: {}",
                page.id
            )));
        }
    }
    if !seen.contains(bundle.active_page_id.as_str()) {
        // 由存储在加载时回退到第一个页面
        debug!(active = %bundle.active_page_id, "当前页面不存在");
    }
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<(), IoError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| IoError::WriteError {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, text).map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}
