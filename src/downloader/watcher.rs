// src/downloader/watcher.rs

use crate::{
    config::WatchSettings,
    constants::download::UNCONFIRMED_PREFIX,
    error::*,
};
use anyhow::anyhow;
use indicatif::{HumanBytes, ProgressBar};
use log::{debug, info, warn};
use std::{
    collections::HashSet,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// 监视器的状态只能向前推进。
/// `TimedOut` 同时涵盖超时、取消和读取目录失败等未完成的结局。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WatchState {
    Idle,
    AwaitingStart,
    AwaitingCompletion,
    Completed,
    TimedOut,
}

impl WatchState {
    fn is_terminal(self) -> bool {
        matches!(self, WatchState::Completed | WatchState::TimedOut)
    }
}

/// 读取目录当前的文件名集合，每次调用都重新读取。
pub(crate) async fn list_directory(dir: &Path) -> AppResult<HashSet<String>> {
    let mut names = HashSet::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Ok(name) = entry.file_name().into_string() {
            names.insert(name);
        }
    }
    Ok(names)
}

/// 按固定间隔调用 `probe`，直到其返回 `Some`、超时 (`Ok(None)`) 或被取消。
pub(crate) async fn poll_until<T, F, Fut>(
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
    mut probe: F,
) -> AppResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<Option<T>>>,
{
    if interval.is_zero() {
        return Err(AppError::Other(anyhow!("轮询间隔不能为 0")));
    }
    let deadline = Instant::now()
        .checked_add(timeout)
        .ok_or_else(|| AppError::Other(anyhow!("等待时间 {:?} 超出范围", timeout)))?;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            _ = ticker.tick() => {
                if let Some(found) = probe().await? {
                    return Ok(Some(found));
                }
            }
            _ = tokio::time::sleep_until(deadline) => return Ok(None),
        }
    }
}

/// 通过轮询下载目录判断一次浏览器下载的开始与结束。
///
/// 创建时会记录目录中已有的文件，之后只关注新出现的文件，
/// 因此必须在触发下载之前创建。
pub struct DownloadWatcher {
    dir: PathBuf,
    settings: WatchSettings,
    archive_extension: String,
    cancel: CancellationToken,
    baseline: HashSet<String>,
    state: WatchState,
    progress: Option<ProgressBar>,
}

impl DownloadWatcher {
    pub async fn new(
        dir: &Path,
        settings: WatchSettings,
        archive_extension: &str,
        cancel: CancellationToken,
    ) -> AppResult<Self> {
        let baseline = list_directory(dir).await?;
        debug!("下载目录中已有 {} 个文件", baseline.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            settings,
            archive_extension: archive_extension.to_string(),
            cancel,
            baseline,
            state: WatchState::Idle,
            progress: None,
        })
    }

    /// 等待下载期间在进度条上显示已下载的字节数。
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    fn advance(&mut self, next: WatchState) -> AppResult<()> {
        if self.state.is_terminal() || next <= self.state {
            return Err(AppError::Other(anyhow!(
                "下载监视器状态不能从 {:?} 变为 {:?}",
                self.state,
                next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// 等待新的下载出现，返回下载中的文件名。
    ///
    /// 下载过快而未观察到临时文件时，直接返回新出现的压缩包文件名。
    pub async fn await_start(&mut self) -> AppResult<String> {
        self.advance(WatchState::AwaitingStart)?;
        let (interval, timeout) = (self.settings.poll_interval, self.settings.start_timeout);
        let cancel = self.cancel.clone();

        let this = &*self;
        let outcome = poll_until(interval, timeout, &cancel, move || this.detect_start()).await;
        match outcome {
            Ok(Some(name)) => {
                info!("检测到下载: {}", name);
                self.advance(WatchState::AwaitingCompletion)?;
                Ok(name)
            }
            Ok(None) => {
                warn!("{:?} 内未在 {} 中检测到新的下载", timeout, self.dir.display());
                self.state = WatchState::TimedOut;
                Err(AppError::DownloadStartTimeout(timeout))
            }
            Err(e) => {
                self.state = WatchState::TimedOut;
                Err(e)
            }
        }
    }

    /// 等待 `marker` 对应的最终文件出现，返回完成后的文件名。
    pub async fn await_completion(&mut self, marker: &str) -> AppResult<String> {
        if self.state != WatchState::AwaitingCompletion {
            self.advance(WatchState::AwaitingCompletion)?;
        }
        let candidate = self.completed_name(marker);
        let (interval, timeout) = (self.settings.poll_interval, self.settings.completion_timeout);
        let cancel = self.cancel.clone();

        let (this, expected) = (&*self, candidate.as_str());
        let outcome = poll_until(interval, timeout, &cancel, move || {
            this.detect_completion(marker, expected)
        })
        .await;

        let completed = match outcome {
            Ok(Some(name)) => name,
            Ok(None) => {
                warn!("下载 '{}' 在 {:?} 内未完成", marker, timeout);
                self.state = WatchState::TimedOut;
                return Err(AppError::DownloadTimeout {
                    marker: marker.to_string(),
                    timeout,
                });
            }
            Err(e) => {
                self.state = WatchState::TimedOut;
                return Err(e);
            }
        };

        // 写入方可能还没有完全刷新文件内容
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.state = WatchState::TimedOut;
                return Err(AppError::Cancelled);
            }
            _ = tokio::time::sleep(self.settings.settle_delay) => {}
        }

        self.advance(WatchState::Completed)?;
        info!("下载完成: {}", completed);
        Ok(completed)
    }

    fn completed_name(&self, marker: &str) -> String {
        marker
            .strip_suffix(self.settings.in_progress_suffix.as_str())
            .unwrap_or(marker)
            .to_string()
    }

    async fn detect_start(&self) -> AppResult<Option<String>> {
        let suffix = self.settings.in_progress_suffix.as_str();
        let listing = list_directory(&self.dir).await?;
        let mut fresh: Vec<String> = listing
            .into_iter()
            .filter(|name| !self.baseline.contains(name))
            .collect();
        fresh.sort();

        if let Some(marker) = fresh
            .iter()
            .find(|name| name.ends_with(suffix) && !name.starts_with(UNCONFIRMED_PREFIX))
        {
            return Ok(Some(marker.clone()));
        }

        let finished = fresh.into_iter().find(|name| {
            !name.ends_with(suffix)
                && Path::new(name)
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(self.archive_extension.as_str()))
        });
        if let Some(name) = &finished {
            debug!("未观察到临时文件，新文件 '{}' 已直接下载完成", name);
        }
        Ok(finished)
    }

    async fn detect_completion(&self, marker: &str, candidate: &str) -> AppResult<Option<String>> {
        let listing = list_directory(&self.dir).await?;
        let marker_gone = marker == candidate || !listing.contains(marker);
        if marker_gone && listing.contains(candidate) {
            return Ok(Some(candidate.to_string()));
        }

        if let Some(progress) = &self.progress
            && let Ok(meta) = fs::metadata(self.dir.join(marker)).await
        {
            progress.set_message(format!("{} 已下载 {}", marker, HumanBytes(meta.len())));
        }
        Ok(None)
    }
}
