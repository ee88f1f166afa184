// src/browser/chrome.rs

use super::{BrowserPage, BrowserSession};
use crate::{
    config::BrowserSettings,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use chromiumoxide::{
    Browser, BrowserConfig, Page,
    cdp::browser_protocol::browser::{SetDownloadBehaviorBehavior, SetDownloadBehaviorParams},
    error::CdpError,
};
use futures::StreamExt;
use log::{debug, info, warn};
use serde_json::Value;
use std::{path::Path, time::Duration};
use tokio::task::JoinHandle;

impl From<CdpError> for AppError {
    fn from(err: CdpError) -> Self {
        AppError::Browser(err.to_string())
    }
}

/// 页面资源数量在一段时间内不再变化，即视为网络空闲。
fn network_idle_script(timeout: Duration) -> String {
    let timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
    format!(
        r#"(async () => {{
            const timeoutMs = {timeout_ms};
            const idleMs = 500;
            const interval = 100;
            const start = Date.now();
            let lastCount = performance.getEntriesByType('resource').length;
            let stableMs = 0;
            while (Date.now() - start < timeoutMs) {{
                await new Promise(r => setTimeout(r, interval));
                const curCount = performance.getEntriesByType('resource').length;
                if (document.readyState === 'complete' && curCount === lastCount) {{
                    stableMs += interval;
                    if (stableMs >= idleMs) return true;
                }} else {{
                    stableMs = 0;
                }}
                lastCount = curCount;
            }}
            return false;
        }})()"#
    )
}

/// 基于 chromiumoxide 的浏览器会话。
pub struct ChromeSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch(settings: &BrowserSettings) -> AppResult<Self> {
        info!("启动浏览器 (headless={})", settings.headless);

        // 不固定视口大小，与普通窗口一致
        let mut builder = BrowserConfig::builder().viewport(None);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chrome_path {
            debug!("使用指定的浏览器: {}", path.display());
            builder = builder.chrome_executable(path);
        }
        builder = builder
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-dev-shm-usage");
        for arg in &settings.extra_args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder
            .build()
            .map_err(|e| AppError::Browser(format!("浏览器配置无效: {}", e)))?;
        let (browser, mut handler) = Browser::launch(config).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&mut self) -> AppResult<Box<dyn BrowserPage>> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(Box::new(ChromePage { page }))
    }

    async fn close(&mut self) -> AppResult<()> {
        info!("关闭浏览器");
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!("等待浏览器进程退出失败: {}", e);
        }
        self.handler_task.abort();
        closed.map(drop).map_err(AppError::from)
    }
}

struct ChromePage {
    page: Page,
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn allow_downloads(&self, dir: &Path) -> AppResult<()> {
        let absolute = dunce::canonicalize(dir)?;
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(absolute.to_string_lossy())
            .build()
            .map_err(AppError::Browser)?;
        self.page.execute(params).await?;
        debug!("下载目录已设置为: {}", absolute.display());
        Ok(())
    }

    async fn goto(&self, url: &str, idle_timeout: Duration) -> AppResult<()> {
        debug!("打开页面: {}", url);
        let navigate = async {
            self.page.goto(url).await?;
            let idle = self
                .page
                .evaluate(network_idle_script(idle_timeout))
                .await?
                .into_value::<bool>()
                .unwrap_or(false);
            Ok::<bool, AppError>(idle)
        };
        match tokio::time::timeout(idle_timeout, navigate).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) | Err(_) => Err(AppError::UiTimeout {
                what: format!("页面网络空闲 ({})", url),
                timeout: idle_timeout,
            }),
            Ok(Err(e)) => Err(e),
        }
    }

    async fn type_into(&self, selector: &str, text: &str) -> AppResult<()> {
        // type_str 需要元素先获得焦点
        self.page
            .find_element(selector)
            .await?
            .click()
            .await?
            .type_str(text)
            .await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> AppResult<()> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> AppResult<Value> {
        let result = self.page.evaluate(script).await?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.page.close().await?;
        Ok(())
    }
}
