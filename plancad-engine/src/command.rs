use std::collections::HashMap;

use plancad_core::geometry::Vector2;
use tracing::debug;

use crate::errors::EngineError;
use crate::store::DocumentStore;

/// 以名称加参数描述的命令请求，例如 `nudge_selection 10 0`。
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// 按空白拆分一行文本，空行返回 `None`。
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        Some(Self::with_args(name, parts))
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError>;
}

pub struct CommandContext<'a> {
    pub store: &'a mut DocumentStore,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(UndoCommand);
        bus.register(RedoCommand);
        bus.register(ClearSelectionCommand);
        bus.register(SelectAllCommand);
        bus.register(DeleteSelectionCommand);
        bus.register(FocusSelectionCommand);
        bus.register(ToggleLinkModeCommand);
        bus.register(NudgeSelectionCommand);
        bus.register(DuplicateSelectionCommand);
        bus.register(CheckCollisionsCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn try_dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let handler = self
            .handlers
            .get(request.name.as_str())
            .ok_or_else(|| EngineError::UnknownCommand(request.name.clone()))?;
        debug!(command = %request.name, args = ?request.args, "分发命令");
        handler.execute(request, context)
    }

    /// 分发命令，错误转换为失败响应。
    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        self.try_dispatch(request, context)
            .unwrap_or_else(|err| CommandResponse::err(err.to_string()))
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

fn parse_number(request: &CommandRequest, index: usize) -> Result<f64, EngineError> {
    let raw = request
        .args
        .get(index)
        .ok_or_else(|| EngineError::InvalidArguments {
            command: request.name.clone(),
            reason: format!("缺少第 {} 个参数", index + 1),
        })?;
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| EngineError::InvalidArguments {
            command: request.name.clone(),
            reason: format!("无法解析数值: {raw}"),
        })
}

struct UndoCommand;

impl CommandHandler for UndoCommand {
    fn name(&self) -> &'static str {
        "undo"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        Ok(if context.store.undo() {
            CommandResponse::ok("已撤销")
        } else {
            CommandResponse::err("没有可撤销的操作")
        })
    }
}

struct RedoCommand;

impl CommandHandler for RedoCommand {
    fn name(&self) -> &'static str {
        "redo"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        Ok(if context.store.redo() {
            CommandResponse::ok("已重做")
        } else {
            CommandResponse::err("没有可重做的操作")
        })
    }
}

struct ClearSelectionCommand;

impl CommandHandler for ClearSelectionCommand {
    fn name(&self) -> &'static str {
        "clear_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        context.store.clear_selection();
        Ok(CommandResponse::ok("选中集已清空"))
    }
}

struct SelectAllCommand;

impl CommandHandler for SelectAllCommand {
    fn name(&self) -> &'static str {
        "select_all"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let count = context.store.select_all();
        Ok(CommandResponse::ok(format!("已选中 {count} 个图元")))
    }
}

struct DeleteSelectionCommand;

impl CommandHandler for DeleteSelectionCommand {
    fn name(&self) -> &'static str {
        "delete_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let ids = context.store.selection().to_vec();
        let removed = context.store.remove_elements(&ids);
        Ok(if removed > 0 {
            CommandResponse::ok(format!("已删除 {removed} 个图元"))
        } else {
            CommandResponse::err("没有可删除的图元")
        })
    }
}

struct FocusSelectionCommand;

impl CommandHandler for FocusSelectionCommand {
    fn name(&self) -> &'static str {
        "focus_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        Ok(if context.store.focus_selection() {
            CommandResponse::ok("视图已聚焦当前选中图元")
        } else {
            CommandResponse::err("没有可聚焦的图元")
        })
    }
}

struct ToggleLinkModeCommand;

impl CommandHandler for ToggleLinkModeCommand {
    fn name(&self) -> &'static str {
        "toggle_link_mode"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let enabled = context.store.toggle_link_mode();
        Ok(CommandResponse::ok(if enabled {
            "墙体连接模式已开启"
        } else {
            "墙体连接模式已关闭"
        }))
    }
}

struct NudgeSelectionCommand;

impl CommandHandler for NudgeSelectionCommand {
    fn name(&self) -> &'static str {
        "nudge_selection"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let dx = parse_number(request, 0)?;
        let dy = parse_number(request, 1)?;
        let ids = context.store.selection().to_vec();
        Ok(if context.store.move_elements(&ids, dx, dy) {
            CommandResponse::ok(format!("已平移 {} 个图元", ids.len()))
        } else {
            CommandResponse::err("没有可平移的图元")
        })
    }
}

struct DuplicateSelectionCommand;

impl CommandHandler for DuplicateSelectionCommand {
    fn name(&self) -> &'static str {
        "duplicate_selection"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let offset = if request.args.is_empty() {
            Vector2::new(10.0, 10.0)
        } else {
            Vector2::new(parse_number(request, 0)?, parse_number(request, 1)?)
        };
        let copies = context.store.duplicate_selection(offset);
        Ok(if copies.is_empty() {
            CommandResponse::err("没有可复制的图元")
        } else {
            CommandResponse::ok(format!("已复制 {} 个图元", copies.len()))
        })
    }
}

struct CheckCollisionsCommand;

impl CommandHandler for CheckCollisionsCommand {
    fn name(&self) -> &'static str {
        "check_collisions"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let pairs = context.store.colliding_pairs();
        if pairs.is_empty() {
            return Ok(CommandResponse::ok("没有重叠的图元"));
        }
        let listing: Vec<String> = pairs.iter().map(|(a, b)| format!("{a}↔{b}")).collect();
        Ok(CommandResponse::ok(format!(
            "{} 组图元重叠: {}",
            pairs.len(),
            listing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plancad_core::document::{Rectangle, Shape};
    use plancad_core::geometry::Point2;

    fn rect(store: &mut DocumentStore, x: f64, y: f64) {
        store
            .create_element(
                Point2::new(x, y),
                Shape::Rectangle(Rectangle {
                    width: 100.0,
                    height: 100.0,
                    fill: None,
                    corner_radius: 0.0,
                }),
            )
            .expect("rectangle");
    }

    #[test]
    fn selection_commands_work() {
        let mut store = DocumentStore::new();
        rect(&mut store, 0.0, 0.0);
        rect(&mut store, 50.0, 50.0);

        let bus = CommandBus::new();
        let mut context = CommandContext { store: &mut store };

        let response = bus.dispatch(&CommandRequest::new("select_all"), &mut context);
        assert!(response.success);
        assert_eq!(context.store.selection_len(), 2);

        let response = bus.dispatch(&CommandRequest::new("focus_selection"), &mut context);
        assert!(response.success);

        let response = bus.dispatch(&CommandRequest::new("clear_selection"), &mut context);
        assert!(response.success);
        assert_eq!(context.store.selection_len(), 0);
    }

    #[test]
    fn nudge_validates_arguments() {
        let mut store = DocumentStore::new();
        rect(&mut store, 0.0, 0.0);
        let bus = CommandBus::new();
        let mut context = CommandContext { store: &mut store };

        let bad = CommandRequest::with_args("nudge_selection", ["x"]);
        let err = bus.try_dispatch(&bad, &mut context).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArguments { .. }));

        let nudge = CommandRequest::parse("nudge_selection 5 -5").expect("request");
        assert!(bus.dispatch(&nudge, &mut context).success);
        let moved = &context.store.elements()[0];
        assert_eq!((moved.x, moved.y), (5.0, -5.0));

        let response = bus.dispatch(&CommandRequest::new("undo"), &mut context);
        assert!(response.success);
        assert_eq!(context.store.elements()[0].x, 0.0);
    }

    #[test]
    fn unknown_commands_are_reported() {
        let mut store = DocumentStore::new();
        let bus = CommandBus::new();
        let mut context = CommandContext { store: &mut store };
        let err = bus
            .try_dispatch(&CommandRequest::new("explode"), &mut context)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownCommand(name) if name == "explode"));
        assert!(!bus.dispatch(&CommandRequest::new("redo"), &mut context).success);
        assert!(CommandRequest::parse("   ").is_none());
    }

    #[test]
    fn collisions_and_delete() {
        let mut store = DocumentStore::new();
        rect(&mut store, 0.0, 0.0);
        rect(&mut store, 50.0, 50.0);
        let bus = CommandBus::new();
        let mut context = CommandContext { store: &mut store };

        let report = bus.dispatch(&CommandRequest::new("check_collisions"), &mut context);
        assert_eq!(report.message.as_deref(), Some("1 组图元重叠: el-1↔el-2"));

        let response = bus.dispatch(&CommandRequest::new("delete_selection"), &mut context);
        assert!(response.success);
        assert_eq!(context.store.elements().len(), 1);

        let link = bus.dispatch(&CommandRequest::new("toggle_link_mode"), &mut context);
        assert!(link.success);
        assert!(context.store.link_mode());
    }
}
