// src/error.rs

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("等待页面条件超时 ({what}，{timeout:?})")]
    UiTimeout { what: String, timeout: Duration },
    #[error("在 {0:?} 内未检测到下载开始")]
    DownloadStartTimeout(Duration),
    #[error("下载超时 ({timeout:?} 内未完成: {marker})")]
    DownloadTimeout { marker: String, timeout: Duration },
    #[error("文件校验失败: {0}")]
    Validation(String),
    #[error("文件已完成重命名，不再重复处理: {0}")]
    AlreadyFinalized(String),
    #[error("无法为 '{base}' 分配唯一文件名 (已尝试 {attempts} 次)")]
    NameAllocationExhausted { base: String, attempts: usize },
    #[error("浏览器自动化错误: {0}")]
    Browser(String),
    #[error("操作已取消")]
    Cancelled,
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("用户中断")]
    UserInterrupt,
    #[error("{0}")] // 只打印内部信息，不加任何前缀
    UserInputError(String),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;
