// src/workflows.rs

use crate::{
    DownloadJobContext,
    config::urls::validate_source_url,
    constants,
    downloader::{ArchiveDownloader, DownloadStats},
    error::{AppError, AppResult},
    symbols, ui, utils,
};
use colored::*;
use log::{info, warn};

/// 按顺序处理链接列表。单个链接失败不影响后续链接，结束后总会关闭浏览器。
pub async fn run_batch(context: &DownloadJobContext, urls: &[String]) -> AppResult<DownloadStats> {
    let outcome = process_urls(context, urls).await;
    close_session(context).await;
    outcome
}

async fn process_urls(context: &DownloadJobContext, urls: &[String]) -> AppResult<DownloadStats> {
    if urls.is_empty() {
        ui::warn("链接列表为空，没有需要处理的网站。");
        return Ok(DownloadStats::default());
    }

    context.manager.start_batch(urls.len());
    ui::print_header(&format!(
        "开始打包下载 {} 个网站 (按 {} 可中止)",
        urls.len(),
        *symbols::CTRL_C
    ));

    let downloader = ArchiveDownloader::new(context.clone());
    for (index, url) in urls.iter().enumerate() {
        if context.cancellation_token.is_cancelled() {
            warn!("任务已取消，剩余 {} 个链接未处理", urls.len() - index);
            break;
        }
        ui::print_sub_header(&format!(
            "[{}/{}] {}",
            index + 1,
            urls.len(),
            utils::truncate_text(url, constants::URL_TRUNCATE_LENGTH)
        ));
        downloader.process(url).await;
    }

    context.manager.print_report();
    if context.cancellation_token.is_cancelled() {
        return Err(AppError::UserInterrupt);
    }
    Ok(context.manager.get_stats())
}

/// 逐个读取用户输入的链接并下载，输入空行退出。
pub async fn run_interactive(context: &DownloadJobContext) -> AppResult<DownloadStats> {
    let outcome = interactive_loop(context).await;
    close_session(context).await;
    outcome
}

async fn interactive_loop(context: &DownloadJobContext) -> AppResult<DownloadStats> {
    ui::print_header("交互模式");
    ui::plain(&format!(
        "逐一输入网站链接进行打包下载，输入空行结束。按 {} 可随时退出。",
        *symbols::CTRL_C
    ));

    context.manager.start_batch(0);
    let downloader = ArchiveDownloader::new(context.clone());
    loop {
        if context.cancellation_token.is_cancelled() {
            break;
        }
        let input = match ui::prompt("请输入网站链接", None) {
            Ok(input) if !input.is_empty() => input,
            Ok(_) => break,
            Err(_) => return Err(AppError::UserInterrupt),
        };
        match validate_source_url(&input) {
            Ok(url) => {
                context.manager.add_task();
                downloader.process(&url).await;
            }
            Err(e) => {
                info!("交互输入无效: {}", e);
                eprintln!("{} {}", *symbols::WARN, e.to_string().yellow());
            }
        }
    }

    ui::plain("");
    ui::info("退出交互模式。");
    if context.manager.get_stats().total > 0 {
        context.manager.print_report();
    }
    Ok(context.manager.get_stats())
}

pub async fn close_session(context: &DownloadJobContext) {
    let mut session = context.session.lock().await;
    match session.close().await {
        Ok(()) => info!("浏览器已关闭"),
        Err(e) => {
            warn!("关闭浏览器失败: {}", e);
            ui::warn(&format!("关闭浏览器失败: {}", e));
        }
    }
}
