use plancad_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("项目读写失败: {0}")]
    Io(#[from] IoError),
}
