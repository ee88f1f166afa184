// src/downloader/job.rs

use super::{finalizer::FileFinalizer, watcher::DownloadWatcher};
use crate::{
    DownloadJobContext,
    browser::BrowserPage,
    config::ServiceProfile,
    constants,
    error::*,
    models::{DownloadResult, FinalizedFile},
    symbols, ui, utils,
};
use colored::*;
use indicatif::ProgressBar;
use log::{debug, error, info, warn};

/// 负责一个网站从提交表单到保存压缩包的完整流程。
pub struct ArchiveDownloader {
    context: DownloadJobContext,
}

impl ArchiveDownloader {
    pub fn new(context: DownloadJobContext) -> Self {
        Self { context }
    }

    /// 处理单个链接。所有错误都在这里被捕获、记录，不会向上传递。
    pub async fn process(&self, url: &str) -> DownloadResult {
        info!("开始处理链接: {}", url);
        let result = match self.run(url).await {
            Ok(file) => DownloadResult::success(url, file),
            Err(e) => {
                error!("处理链接 '{}' 时发生错误: {}", url, e);
                DownloadResult::failure(url, &e)
            }
        };
        self.context.manager.record(&result);
        print_result(&result);
        result
    }

    /// 在共享会话上执行一次下载，页面在任何情况下都会被关闭。
    pub async fn run(&self, url: &str) -> AppResult<FinalizedFile> {
        // 持有会话锁直到本次下载结束，同一时间只允许一个下载
        let mut session = self.context.session.lock().await;
        let page = session.new_page().await?;
        let outcome = self.drive(page.as_ref(), url).await;
        if let Err(e) = page.close().await {
            warn!("关闭页面失败: {}", e);
        }
        outcome
    }

    async fn drive(&self, page: &dyn BrowserPage, url: &str) -> AppResult<FinalizedFile> {
        let config = &self.context.config;
        let service = &config.service;
        let dir = config.output_dir.as_path();

        page.allow_downloads(dir).await?;
        page.goto(&service.entry_url, config.navigation_timeout).await?;
        page.type_into(&service.url_input_selector, url).await?;

        // 复选框无法可靠地接收模拟点击，直接在页面中切换
        let toggled = page.evaluate(&toggle_options_script(&service.option_checkboxes)?).await?;
        if toggled.as_u64() != Some(service.option_checkboxes.len() as u64) {
            warn!("选项复选框未全部找到 (脚本返回 {})", toggled);
        }

        // 必须在提交之前记录目录状态
        let watcher = DownloadWatcher::new(
            dir,
            config.watch.clone(),
            &config.archive_extension,
            self.context.cancellation_token.clone(),
        )
        .await?;
        page.click(&service.submit_selector).await?;

        let spinner = ui::new_spinner(&format!(
            "等待服务器打包 {}",
            utils::truncate_text(url, constants::URL_TRUNCATE_LENGTH)
        ));
        let downloaded = self.await_download(page, url, watcher, &spinner).await;
        spinner.finish_and_clear();
        let completed = downloaded?;

        let base = utils::derive_base_name(url);
        let canonical = format!("{}.{}", base, config.archive_extension);
        let destination = if completed == canonical {
            debug!("下载文件已是目标名称: {}", canonical);
            canonical
        } else {
            utils::allocate_unique_name(dir, &base, &config.archive_extension, config.max_name_attempts)?
        };

        let file = FileFinalizer::new(dir, config.finalize.clone())
            .finalize(&completed, &destination)
            .await?;

        if !file.path.try_exists()? {
            return Err(AppError::Validation(format!(
                "最终文件 '{}' 不在输出目录中",
                file.name
            )));
        }
        Ok(file)
    }

    async fn await_download(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        watcher: DownloadWatcher,
        spinner: &ProgressBar,
    ) -> AppResult<String> {
        let config = &self.context.config;
        let cancel = &self.context.cancellation_token;

        let ready = ready_expression(&config.service)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            waited = page.wait_for_condition(&ready, config.ready_timeout, "下载按钮就绪") => waited?,
        }
        info!("已开始下载: {}", url);
        spinner.println(format!("{} 已开始下载: {}", *symbols::INFO, url));

        let mut watcher = watcher.with_progress(spinner.clone());
        let marker = watcher.await_start().await?;
        spinner.println(format!("{} 检测到下载: {}", *symbols::INFO, marker));
        let completed = watcher.await_completion(&marker).await?;
        spinner.println(format!("{} 下载完成: {}", *symbols::INFO, completed));
        Ok(completed)
    }
}

/// 依次点击各复选框，返回实际找到的数量。
fn toggle_options_script(selectors: &[String]) -> AppResult<String> {
    Ok(format!(
        r#"(() => {{
            let toggled = 0;
            for (const selector of {}) {{
                const el = document.querySelector(selector);
                if (el) {{ el.click(); toggled++; }}
            }}
            return toggled;
        }})()"#,
        serde_json::to_string(selectors)?
    ))
}

/// 下载按钮去掉等待样式后即表示服务器已生成压缩包。
fn ready_expression(service: &ServiceProfile) -> AppResult<String> {
    Ok(format!(
        r#"(() => {{
            const el = document.querySelector({});
            return !!el && !el.classList.contains({});
        }})()"#,
        serde_json::to_string(&service.download_button_selector)?,
        serde_json::to_string(&service.pending_class)?
    ))
}

fn print_result(result: &DownloadResult) {
    let (symbol, color_fn, label) = result.status.get_display_info();
    match (&result.file, &result.message) {
        (Some(file), _) => println!(
            "{} {} ({})",
            symbol,
            file.name.green(),
            super::describe_size(file.size)
        ),
        (None, Some(message)) => eprintln!(
            "{} {} {}",
            symbol,
            result.url,
            color_fn(format!("失败: {} (详情: {})", label, message).into())
        ),
        (None, None) => eprintln!("{} {} {}", symbol, result.url, color_fn(label.into())),
    }
}
