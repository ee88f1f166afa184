// src/downloader/mod.rs

mod finalizer;
mod job;
mod watcher;

pub use finalizer::{FileFinalizer, describe_size};
pub use job::ArchiveDownloader;
pub use watcher::{DownloadWatcher, WatchState};

use crate::{models::DownloadResult, symbols, ui};
use colored::*;
use log::info;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct DownloadStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

impl DownloadStats {
    /// 因取消而未处理的任务数
    pub fn not_attempted(&self) -> usize {
        self.total.saturating_sub(self.success + self.failed)
    }
}

/// 记录一批任务的结果，并在结束时打印报告。
#[derive(Clone)]
pub struct DownloadManager {
    stats: Arc<Mutex<DownloadStats>>,
    saved_files: Arc<Mutex<Vec<(String, String, u64)>>>,
    failed_downloads: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadManager {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(Mutex::new(DownloadStats::default())),
            saved_files: Arc::new(Mutex::new(Vec::new())),
            failed_downloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn start_batch(&self, total_tasks: usize) {
        info!("开始新一批任务，总数: {}", total_tasks);
        *self.stats.lock().unwrap() = DownloadStats {
            total: total_tasks,
            ..Default::default()
        };
        self.saved_files.lock().unwrap().clear();
        self.failed_downloads.lock().unwrap().clear();
    }

    /// 交互模式下任务数量事先未知，逐个追加。
    pub fn add_task(&self) {
        self.stats.lock().unwrap().total += 1;
    }

    pub fn record(&self, result: &DownloadResult) {
        match &result.file {
            Some(file) if result.is_success() => {
                self.stats.lock().unwrap().success += 1;
                self.saved_files.lock().unwrap().push((
                    result.url.clone(),
                    file.name.clone(),
                    file.size,
                ));
            }
            _ => {
                log::error!("链接 '{}' 处理失败，状态: {:?}", result.url, result.status);
                self.stats.lock().unwrap().failed += 1;
                let (_, _, label) = result.status.get_display_info();
                self.failed_downloads
                    .lock()
                    .unwrap()
                    .push((result.url.clone(), label.to_string()));
            }
        }
    }

    pub fn get_stats(&self) -> DownloadStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn did_all_succeed(&self) -> bool {
        let stats = self.get_stats();
        stats.failed == 0 && stats.success == stats.total
    }

    pub fn print_report(&self) {
        let stats = self.get_stats();
        let saved = self.saved_files.lock().unwrap();
        let failed = self.failed_downloads.lock().unwrap();
        info!(
            "任务报告: Total={}, Success={}, Failed={}",
            stats.total, stats.success, stats.failed
        );

        if !saved.is_empty() || !failed.is_empty() {
            ui::print_sub_header("任务详情报告");
            if !saved.is_empty() {
                println!("\n{} 已保存的压缩包 ({}个):", *symbols::OK, saved.len());
                for (url, name, size) in saved.iter() {
                    println!("  - {} <- {} ({})", name.green(), url, describe_size(*size));
                }
            }
            if !failed.is_empty() {
                println!("\n{} 失败的链接 ({}个):", *symbols::ERROR, stats.failed);
                print_grouped_report(&failed, |s| s.red());
            }
        }

        ui::print_sub_header("任务总结");
        if self.did_all_succeed() {
            println!("{} 所有 {} 个网站均已打包下载。", *symbols::OK, stats.total);
        } else {
            let summary = format!(
                "{} | {} | {}",
                format!("成功: {}", stats.success).green(),
                format!("失败: {}", stats.failed).red(),
                format!("未处理: {}", stats.not_attempted()).yellow()
            );
            println!("{}", summary);
        }
    }
}

fn print_grouped_report(items: &[(String, String)], color_fn: fn(ColoredString) -> ColoredString) {
    let mut grouped: HashMap<&String, Vec<&String>> = HashMap::new();
    for (url, reason) in items {
        grouped.entry(reason).or_default().push(url);
    }
    let mut sorted_reasons: Vec<_> = grouped.keys().copied().collect();
    sorted_reasons.sort();
    for reason in sorted_reasons {
        println!("  - {}", color_fn(format!("原因: {}", reason).into()));
        // 保持链接在批次中的原始顺序
        for url in &grouped[reason] {
            println!("    - {}", url);
        }
    }
}
