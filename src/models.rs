// src/models.rs

use crate::{error::AppError, symbols};
use colored::{ColoredString, Colorize};
use std::path::PathBuf;

/// 完成重命名并校验通过的压缩包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DownloadStatus {
    Success,
    UiTimeout,
    StartTimeout,
    DownloadTimeout,
    ValidationFailed,
    AlreadyFinalized,
    NameExhausted,
    BrowserError,
    IoError,
    Cancelled,
    UnexpectedError,
}

impl DownloadStatus {
    pub fn get_display_info(
        &self,
    ) -> (
        &'static ColoredString,
        fn(ColoredString) -> ColoredString,
        &'static str,
    ) {
        match self {
            DownloadStatus::Success => (&symbols::OK, |s| s.green(), "打包下载成功"),
            DownloadStatus::UiTimeout => (&symbols::WARN, |s| s.yellow(), "页面未在限定时间内响应"),
            DownloadStatus::StartTimeout => (&symbols::WARN, |s| s.yellow(), "未检测到下载开始"),
            DownloadStatus::DownloadTimeout => (&symbols::WARN, |s| s.yellow(), "下载未在限定时间内完成"),
            DownloadStatus::ValidationFailed => (&symbols::ERROR, |s| s.red(), "文件校验失败 (缺失或为空)"),
            DownloadStatus::AlreadyFinalized => (&symbols::ERROR, |s| s.red(), "文件已处理过"),
            DownloadStatus::NameExhausted => (&symbols::ERROR, |s| s.red(), "无法分配唯一文件名"),
            DownloadStatus::BrowserError => (&symbols::ERROR, |s| s.red(), "浏览器操作失败"),
            DownloadStatus::IoError => (&symbols::ERROR, |s| s.red(), "本地文件读写错误"),
            DownloadStatus::Cancelled => (&symbols::WARN, |s| s.yellow(), "任务已取消"),
            DownloadStatus::UnexpectedError => {
                (&symbols::ERROR, |s| s.red(), "发生未预期的程序错误")
            }
        }
    }
}

impl From<&AppError> for DownloadStatus {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::UiTimeout { .. } => DownloadStatus::UiTimeout,
            AppError::DownloadStartTimeout(_) => DownloadStatus::StartTimeout,
            AppError::DownloadTimeout { .. } => DownloadStatus::DownloadTimeout,
            AppError::Validation(_) => DownloadStatus::ValidationFailed,
            AppError::AlreadyFinalized(_) => DownloadStatus::AlreadyFinalized,
            AppError::NameAllocationExhausted { .. } => DownloadStatus::NameExhausted,
            AppError::Browser(_) => DownloadStatus::BrowserError,
            AppError::Io(_) => DownloadStatus::IoError,
            AppError::Cancelled | AppError::UserInterrupt => DownloadStatus::Cancelled,
            _ => DownloadStatus::UnexpectedError,
        }
    }
}

/// 单个链接的处理结果
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub url: String,
    pub status: DownloadStatus,
    pub file: Option<FinalizedFile>,
    pub message: Option<String>,
}

impl DownloadResult {
    pub fn success(url: &str, file: FinalizedFile) -> Self {
        Self {
            url: url.to_string(),
            status: DownloadStatus::Success,
            file: Some(file),
            message: None,
        }
    }

    pub fn failure(url: &str, error: &AppError) -> Self {
        Self {
            url: url.to_string(),
            status: DownloadStatus::from(error),
            file: None,
            message: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DownloadStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_classification() {
        let cases = [
            (
                AppError::UiTimeout { what: "下载按钮".into(), timeout: Duration::from_secs(30) },
                DownloadStatus::UiTimeout,
            ),
            (AppError::DownloadStartTimeout(Duration::from_secs(1)), DownloadStatus::StartTimeout),
            (
                AppError::DownloadTimeout { marker: "a.zip.crdownload".into(), timeout: Duration::from_secs(1) },
                DownloadStatus::DownloadTimeout,
            ),
            (AppError::Validation("empty".into()), DownloadStatus::ValidationFailed),
            (AppError::AlreadyFinalized("a.zip".into()), DownloadStatus::AlreadyFinalized),
            (
                AppError::NameAllocationExhausted { base: "index".into(), attempts: 50 },
                DownloadStatus::NameExhausted,
            ),
            (AppError::Cancelled, DownloadStatus::Cancelled),
            (AppError::UserInputError("x".into()), DownloadStatus::UnexpectedError),
        ];
        for (error, expected) in cases {
            assert_eq!(DownloadStatus::from(&error), expected, "{}", error);
        }
    }

    #[test]
    fn test_failure_result_keeps_error_message() {
        let result = DownloadResult::failure("https://example.com/", &AppError::Validation("目标文件为空".into()));
        assert!(!result.is_success());
        assert!(result.file.is_none());
        assert!(result.message.unwrap().contains("目标文件为空"));
    }
}
