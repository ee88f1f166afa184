// src/config/urls.rs

use crate::error::{AppError, AppResult};
use anyhow::Context;
use log::{debug, info};
use std::{fs, path::Path};

/// 读取待处理的网站列表。
///
/// `.json` 文件必须是字符串数组 (例如 `["https://example.com/"]`)；
/// 其他文件按行读取，忽略空行和以 `#` 开头的注释行。
pub fn load_source_urls(path: &Path) -> AppResult<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取链接列表 '{}' 失败", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let urls = if is_json {
        debug!("以 JSON 数组格式解析链接列表: {}", path.display());
        let entries: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("解析链接列表 '{}' 失败 (需要 JSON 字符串数组)", path.display()))?;
        entries
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    } else {
        debug!("以纯文本格式解析链接列表: {}", path.display());
        parse_url_lines(&content)
    };

    info!("从 '{}' 读取到 {} 个链接", path.display(), urls.len());
    Ok(urls)
}

fn parse_url_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// 校验交互模式下用户输入的单个链接。
pub fn validate_source_url(input: &str) -> AppResult<String> {
    let trimmed = input.trim();
    url::Url::parse(trimmed)
        .map(|_| trimmed.to_string())
        .map_err(|e| AppError::UserInputError(format!("输入 '{}' 不是有效链接: {}", trimmed, e)))
}
