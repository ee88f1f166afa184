// src/utils.rs

use crate::{
    constants::{self, naming},
    error::*,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::{path::Path, sync::LazyLock};
use url::Url;

static ILLEGAL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|\x00-\x1f]"#).unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const WINDOWS_RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// 将任意文本清理为可安全用作文件名主干的字符串，结果可能为空。
pub fn sanitize_filename(name: &str) -> String {
    let trimmed = name.trim();
    let mut name = if WINDOWS_RESERVED.contains(&trimmed.to_uppercase().as_str()) {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    };

    name = ILLEGAL_CHARS_RE.replace_all(&name, " ").into_owned();
    name = WHITESPACE_RE.replace_all(&name, " ").trim().to_string();
    name = name.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string();
    safe_truncate_utf8(&name, constants::MAX_FILENAME_BYTES).to_string()
}

fn safe_truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes { return s; }
    let mut i = max_bytes;
    while i > 0 && !s.is_char_boundary(i) { i -= 1; }
    &s[..i]
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

/// 根据网站链接推导压缩包的基础名称。
///
/// 取路径的最后一段 (忽略末尾的 `/`)，解码并去掉扩展名。根路径得到 `index`，
/// 无法解析的链接得到 `unknown`。此函数不会失败，结果非空且不含路径分隔符。
pub fn derive_base_name(source_url: &str) -> String {
    let url = match Url::parse(source_url.trim()) {
        Ok(url) => url,
        Err(e) => {
            warn!(
                "解析链接 '{}' 失败，使用默认名称 '{}': {}",
                source_url,
                naming::UNKNOWN_BASE_NAME,
                e
            );
            return naming::UNKNOWN_BASE_NAME.to_string();
        }
    };

    let last_segment = url
        .path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let decoded = percent_decode_str(last_segment).decode_utf8_lossy();
    let stem = match decoded.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => decoded.as_ref(),
    };

    if stem.is_empty() {
        return naming::INDEX_BASE_NAME.to_string();
    }
    let sanitized = sanitize_filename(stem);
    if sanitized.is_empty() {
        debug!("路径段 '{}' 清理后为空，使用默认名称", stem);
        naming::UNKNOWN_BASE_NAME.to_string()
    } else {
        sanitized
    }
}

/// 可排序、不含冒号和句点的时间戳，例如 `2024-05-01T08-30-12-045Z`。
pub fn archive_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// 在目录中为 `<base>.<ext>` 分配一个当前不存在的文件名，冲突时追加时间戳。
pub fn allocate_unique_name(
    dir: &Path,
    base: &str,
    ext: &str,
    max_attempts: usize,
) -> AppResult<String> {
    allocate_unique_name_with_clock(dir, base, ext, max_attempts, Utc::now)
}

pub fn allocate_unique_name_with_clock<F>(
    dir: &Path,
    base: &str,
    ext: &str,
    max_attempts: usize,
    mut clock: F,
) -> AppResult<String>
where
    F: FnMut() -> DateTime<Utc>,
{
    let mut candidate = format!("{}.{}", base, ext);
    for _ in 0..max_attempts {
        if !dir.join(&candidate).try_exists()? {
            return Ok(candidate);
        }
        debug!("文件名 '{}' 已存在，改用带时间戳的名称", candidate);
        candidate = format!("{}_{}.{}", base, archive_timestamp(clock()), ext);
    }
    Err(AppError::NameAllocationExhausted {
        base: base.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::fs;

    #[test]
    fn test_derive_base_name() {
        // 去掉页面扩展名
        assert_eq!(derive_base_name("https://example.com/about.html"), "about");
        assert_eq!(derive_base_name("https://example.com/docs/guide.php?x=1#top"), "guide");
        // 没有扩展名的路径段保持不变
        assert_eq!(derive_base_name("https://example.com/blog/post-1"), "post-1");
        // 末尾的斜杠不影响最后一段
        assert_eq!(derive_base_name("https://example.com/docs/"), "docs");

        // 根路径
        assert_eq!(derive_base_name("https://example.com/"), "index");
        assert_eq!(derive_base_name("https://example.com"), "index");

        // 无法解析的链接
        assert_eq!(derive_base_name("not a url"), "unknown");
        assert_eq!(derive_base_name(""), "unknown");
    }

    #[test]
    fn test_derive_base_name_never_contains_separators() {
        assert_eq!(derive_base_name("https://example.com/a%2Fb.html"), "a b");
        assert_eq!(derive_base_name("https://example.com/caf%C3%A9.html"), "café");
        assert_eq!(derive_base_name("https://example.com/%3C%3E.html"), "unknown");
        assert_eq!(derive_base_name("https://example.com/con.html"), "_con");
        for url in ["https://e.com/x%5Cy", "https://e.com/..%2F..%2Fetc", "https://e.com/a:b"] {
            let name = derive_base_name(url);
            assert!(!name.is_empty());
            assert!(!name.contains('/') && !name.contains('\\'), "{} -> {}", url, name);
        }
    }

    #[test]
    fn test_archive_timestamp_is_sortable_and_filesystem_safe() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 12).unwrap() + ChronoDuration::milliseconds(45);
        let stamp = archive_timestamp(t);
        assert_eq!(stamp, "2024-05-01T08-30-12-045Z");
        assert!(!stamp.contains(':') && !stamp.contains('.'));
        assert!(archive_timestamp(t) < archive_timestamp(t + ChronoDuration::milliseconds(1)));
    }

    #[test]
    fn test_allocate_unique_name_without_collision() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other.zip"), b"x").unwrap();
        fs::write(dir.path().join("about.zip.crdownload"), b"x").unwrap();

        let name = allocate_unique_name(dir.path(), "about", "zip", 50).unwrap();
        assert_eq!(name, "about.zip");
    }

    #[test]
    fn test_allocate_unique_name_with_repeated_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        fs::write(dir.path().join("index.zip"), b"x").unwrap();
        // 预先占用前两个时间戳
        for ms in 0..2 {
            let stamp = archive_timestamp(start + ChronoDuration::milliseconds(ms));
            fs::write(dir.path().join(format!("index_{}.zip", stamp)), b"x").unwrap();
        }

        let mut tick = 0;
        let clock = || {
            let t = start + ChronoDuration::milliseconds(tick);
            tick += 1;
            t
        };
        let name = allocate_unique_name_with_clock(dir.path(), "index", "zip", 50, clock).unwrap();

        assert!(name.starts_with("index_"));
        assert!(name.ends_with(".zip"));
        assert_eq!(name, format!("index_{}.zip", archive_timestamp(start + ChronoDuration::milliseconds(2))));
        assert!(!dir.path().join(&name).exists());
    }

    #[test]
    fn test_allocate_unique_name_gives_up_after_bound() {
        let dir = tempfile::tempdir().unwrap();
        let frozen = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        fs::write(dir.path().join("index.zip"), b"x").unwrap();
        fs::write(dir.path().join(format!("index_{}.zip", archive_timestamp(frozen))), b"x").unwrap();

        let result = allocate_unique_name_with_clock(dir.path(), "index", "zip", 5, || frozen);
        assert!(matches!(
            result,
            Err(AppError::NameAllocationExhausted { attempts: 5, .. })
        ));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a\\b/c:d*e?f\"g<h>i|j"), "a b c d e f g h i j");
        assert_eq!(sanitize_filename(" . my page. "), "my page");
        assert_eq!(sanitize_filename("aux"), "_aux");
        assert_eq!(sanitize_filename("<>|"), "");

        let long_name = "页".repeat(100); // 300 bytes
        let truncated = sanitize_filename(&long_name);
        assert!(truncated.len() <= constants::MAX_FILENAME_BYTES);
        assert!(truncated.chars().all(|c| c == '页'));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("https://example.com/", 60), "https://example.com/");
        assert_eq!(truncate_text("abcdefghij", 8), "abcde...");
    }
}
