// src/lib.rs

pub mod browser;
pub mod cli;
pub mod config;
pub mod constants;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod models;
pub mod symbols;
pub mod ui;
pub mod utils;
pub mod workflows;

use crate::{
    browser::BrowserSession,
    cli::Cli,
    config::{
        AppConfig,
        urls::{load_source_urls, validate_source_url},
    },
    downloader::DownloadManager,
    error::AppResult,
};
use anyhow::Context;
use log::{debug, info};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;

/// 同一时间只允许一个下载占用浏览器会话
pub type SharedSession = Arc<TokioMutex<Box<dyn BrowserSession>>>;

/// 核心的执行上下文，包含所有任务所需的状态和工具
#[derive(Clone)]
pub struct DownloadJobContext {
    pub manager: DownloadManager,
    pub config: Arc<AppConfig>,
    pub session: SharedSession,
    pub cancellation_token: CancellationToken,
}

impl DownloadJobContext {
    pub fn new(
        config: Arc<AppConfig>,
        session: Box<dyn BrowserSession>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            manager: DownloadManager::new(),
            config,
            session: Arc::new(TokioMutex::new(session)),
            cancellation_token,
        }
    }
}

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: CancellationToken) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);

    let mut config = AppConfig::new(&args)?;

    // 链接列表在启动浏览器之前读取，格式错误直接退出
    let urls = match (&args.batch_file, &args.url) {
        (Some(batch_file), _) => Some(load_source_urls(batch_file)?),
        (None, Some(url)) => Some(vec![validate_source_url(url)?]),
        (None, None) => None,
    };
    if urls.as_ref().is_some_and(|urls| urls.is_empty()) {
        ui::warn("链接列表为空，没有需要处理的网站。");
        return Ok(());
    }

    config.output_dir = prepare_output_dir(&config.output_dir)?;
    ui::info(&format!("压缩包将保存到: {}", config.output_dir.display()));
    debug!("加载的应用配置: {:?}", config);

    let session = browser::launch_session(&config.browser).await?;
    info!("浏览器已启动 (headless: {})", config.browser.headless);
    let context = DownloadJobContext::new(Arc::new(config), session, cancellation_token);

    match urls {
        Some(urls) => workflows::run_batch(&context, &urls).await?,
        None => workflows::run_interactive(&context).await?,
    };
    Ok(())
}

/// 创建输出目录并转换为绝对路径，浏览器的下载目录需要绝对路径。
fn prepare_output_dir(dir: &Path) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("创建输出目录 '{}' 失败", dir.display()))?;
    let absolute = dunce::canonicalize(dir)
        .with_context(|| format!("无法解析输出目录 '{}'", dir.display()))?;
    info!("输出目录: {}", absolute.display());
    Ok(absolute)
}
