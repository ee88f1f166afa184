// src/browser/mod.rs

//! 浏览器自动化能力的抽象。
//!
//! 下载流程只依赖这里的两个 trait；默认的实现基于 chromiumoxide (CDP)，
//! 测试中可以用内存实现替换。

#[cfg(feature = "browser")]
mod chrome;

#[cfg(feature = "browser")]
pub use chrome::ChromeSession;

use crate::{
    config::BrowserSettings,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use serde_json::Value;
use std::{path::Path, time::Duration};

/// 条件轮询的间隔
const CONDITION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 一个浏览器会话，整个批次共用一个。
#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> AppResult<Box<dyn BrowserPage>>;
    async fn close(&mut self) -> AppResult<()>;
}

/// 会话中的单个页面 (标签页)。
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// 允许下载，并将下载文件保存到指定目录。
    async fn allow_downloads(&self, dir: &Path) -> AppResult<()>;
    /// 打开页面并等待网络空闲。
    async fn goto(&self, url: &str, idle_timeout: Duration) -> AppResult<()>;
    async fn type_into(&self, selector: &str, text: &str) -> AppResult<()>;
    async fn click(&self, selector: &str) -> AppResult<()>;
    /// 在页面中执行脚本，返回值无法序列化时得到 `Value::Null`。
    async fn evaluate(&self, script: &str) -> AppResult<Value>;
    async fn close(self: Box<Self>) -> AppResult<()>;

    /// 反复求值布尔表达式，直到其为真或超时。
    async fn wait_for_condition(
        &self,
        expression: &str,
        timeout: Duration,
        what: &str,
    ) -> AppResult<()> {
        let poll = async {
            loop {
                if self.evaluate(expression).await?.as_bool() == Some(true) {
                    return Ok::<(), AppError>(());
                }
                tokio::time::sleep(CONDITION_POLL_INTERVAL).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(AppError::UiTimeout {
                what: what.to_string(),
                timeout,
            }),
        }
    }
}

/// 按配置启动浏览器会话。
#[cfg(feature = "browser")]
pub async fn launch_session(settings: &BrowserSettings) -> AppResult<Box<dyn BrowserSession>> {
    Ok(Box::new(ChromeSession::launch(settings).await?))
}

#[cfg(not(feature = "browser"))]
pub async fn launch_session(_settings: &BrowserSettings) -> AppResult<Box<dyn BrowserSession>> {
    Err(AppError::Browser(
        "未编译浏览器支持，请使用 `cargo build --features browser` 重新构建".to_string(),
    ))
}
