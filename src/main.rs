// src/main.rs

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use std::{env, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use webzip_dl::{cli::Cli, error::AppError, logging::init_logger, run_from_cli};

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持。
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let cancellation_token = CancellationToken::new();
    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        // 第一次中断：停止后续任务并关闭浏览器
        println!("\n{} 正在中止，等待当前任务清理... (再次按 Ctrl+C 强制退出)", "[!]".yellow());
        log::warn!("收到中断信号，取消剩余任务");
        signal_token.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} 用户强制中断程序。", "[!]".yellow());
            tokio::time::sleep(Duration::from_millis(100)).await;
            std::process::exit(130);
        }
    });

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| clap::crate_name!().to_string());
    let after_help = format!(
        "示例:\n  # 启动交互模式\n  {bin} -i\n\n  # 打包下载单个网站\n  {bin} --url \"https://example.com/about.html\"\n\n  # 批量下载 (JSON 数组或每行一个链接)\n  {bin} -b urls.json -o zip",
        bin = bin_name
    );
    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };

    init_logger(args.log_level);
    log::info!("{} v{} 启动", clap::crate_name!(), clap::crate_version!());

    if let Err(e) = run_from_cli(args, cancellation_token).await {
        if matches!(e, AppError::UserInterrupt) {
            println!("\n{} 用户中断，程序已退出。", "[!]".yellow());
            std::process::exit(130);
        }
        log::error!("程序执行出错: {}", e);
        eprintln!("\n{} {}", "[X]".red(), format!("程序执行出错: {}", e).red());
        std::process::exit(1);
    }
}
