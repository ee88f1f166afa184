// src/downloader/finalizer.rs

use crate::{config::FinalizeSettings, error::*, models::FinalizedFile};
use indicatif::HumanBytes;
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 将下载完成的文件移动到最终名称，并校验结果非空。
pub struct FileFinalizer {
    dir: PathBuf,
    settings: FinalizeSettings,
}

impl FileFinalizer {
    pub fn new(dir: &Path, settings: FinalizeSettings) -> Self {
        Self {
            dir: dir.to_path_buf(),
            settings,
        }
    }

    /// 失败时记录原因并返回错误；源文件保持原样。
    pub async fn finalize(&self, source: &str, destination: &str) -> AppResult<FinalizedFile> {
        match self.try_finalize(source, destination).await {
            Ok(file) => {
                info!(
                    "文件已保存为: {} ({} 字节)",
                    file.name, file.size
                );
                Ok(file)
            }
            Err(e) => {
                error!("保存文件 '{}' -> '{}' 失败: {}", source, destination, e);
                Err(e)
            }
        }
    }

    async fn try_finalize(&self, source: &str, destination: &str) -> AppResult<FinalizedFile> {
        let source_path = self.dir.join(source);
        let dest_path = self.dir.join(destination);

        if source != destination
            && !fs::try_exists(&source_path).await?
            && file_size(&dest_path).await.is_some_and(|size| size > 0)
        {
            return Err(AppError::AlreadyFinalized(destination.to_string()));
        }

        // 源文件可能尚未出现或仍为空，两种情况都在这里重试
        self.wait_until_non_empty(&source_path).await?;

        if source != destination {
            if fs::try_exists(&dest_path).await? {
                return Err(AppError::Validation(format!(
                    "目标文件 '{}' 已存在，拒绝覆盖",
                    destination
                )));
            }
            fs::rename(&source_path, &dest_path).await?;
            debug!("已重命名: {} -> {}", source, destination);
        }

        match file_size(&dest_path).await {
            Some(size) if size > 0 => Ok(FinalizedFile {
                name: destination.to_string(),
                path: dest_path,
                size,
            }),
            Some(_) => Err(AppError::Validation(format!("文件 '{}' 为空 (0 字节)", destination))),
            None => Err(AppError::Validation(format!("文件 '{}' 重命名后不存在", destination))),
        }
    }

    /// 文件可能还在写入，不存在或大小为 0 时按固定间隔重试。
    async fn wait_until_non_empty(&self, path: &Path) -> AppResult<u64> {
        for attempt in 1..=self.settings.retries.max(1) {
            if let Some(size) = file_size(path).await.filter(|size| *size > 0) {
                return Ok(size);
            }
            debug!(
                "文件 '{}' 尚不可用 (第 {}/{} 次检查)",
                path.display(),
                attempt,
                self.settings.retries
            );
            tokio::time::sleep(self.settings.retry_delay).await;
        }
        Err(AppError::Validation(format!(
            "文件 '{}' 在 {} 次检查后仍为空或不可访问",
            path.display(),
            self.settings.retries
        )))
    }
}

async fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).await.ok().map(|meta| meta.len())
}

/// 供界面显示的文件大小
pub fn describe_size(size: u64) -> String {
    format!("{} ({} 字节)", HumanBytes(size), size)
}
