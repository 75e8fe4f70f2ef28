pub mod catalog;
pub mod command;
pub mod edit;
pub mod history;
pub mod interaction;
pub mod store;
pub mod view;

pub mod errors {
    use thiserror::Error;

    /// 命名命令总线的错误。文档存储本身的无效操作不会报错，只返回 `false`。
    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("未知命令: {0}")]
        UnknownCommand(String),
        #[error("命令 {command} 参数无效: {reason}")]
        InvalidArguments { command: String, reason: String },
    }
}

pub use command::{CommandBus, CommandContext, CommandRequest, CommandResponse};
pub use interaction::{InteractionController, Key, Tool};
pub use store::{DocumentStore, DrawingSettings, EditorSettings, PageId};
