// tests/cli_dispatch_test.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::File;
use std::io::Write;
use tempfile::{TempDir, tempdir};

// 配置文件和日志写入临时主目录，不污染真实环境
fn main_command(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("HOME", home.path())
        .env("USERPROFILE", home.path())
        .current_dir(home.path());
    cmd
}

// --- 测试基本 CLI 行为 ---

#[test]
fn test_help_flag() {
    let home = tempdir().unwrap();
    main_command(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("显示此帮助信息并退出"))
        .stdout(predicate::str::contains("--batch-file"));
}

#[test]
fn test_missing_mode_shows_help() {
    let home = tempdir().unwrap();
    main_command(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: webzip-dl"));
}

#[test]
fn test_modes_are_mutually_exclusive() {
    let home = tempdir().unwrap();
    main_command(&home)
        .args(["-i", "--url", "https://example.com/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

// --- 测试启动浏览器之前的输入校验 ---

#[test]
fn test_malformed_json_list_fails_before_launch() {
    let home = tempdir().unwrap();
    let list = home.path().join("urls.json");
    let mut file = File::create(&list).unwrap();
    writeln!(file, r#"{{ "urls": "https://example.com/" }}"#).unwrap();

    main_command(&home)
        .arg("-b")
        .arg(&list)
        .assert()
        .failure()
        .stderr(predicate::str::contains("解析链接列表"));
}

#[test]
fn test_missing_batch_file_fails() {
    let home = tempdir().unwrap();
    main_command(&home)
        .args(["-b", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("读取链接列表"));
}

#[test]
fn test_invalid_single_url_is_rejected() {
    let home = tempdir().unwrap();
    main_command(&home)
        .args(["--url", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("不是有效链接"));
}

#[test]
fn test_empty_list_exits_without_launching_browser() {
    let home = tempdir().unwrap();
    let list = home.path().join("urls.txt");
    let mut file = File::create(&list).unwrap();
    writeln!(file, "# 暂时没有链接").unwrap();

    main_command(&home)
        .arg("-b")
        .arg(&list)
        .assert()
        .success()
        .stdout(predicate::str::contains("链接列表为空"));

    // 默认配置在首次运行时生成
    assert!(home.path().join(".webzip-dl").join("config.json").is_file());
}

#[test]
fn test_explicit_config_must_exist() {
    let home = tempdir().unwrap();
    main_command(&home)
        .args(["--url", "https://example.com/", "--config", "missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("读取配置文件"));
}

#[test]
fn test_invalid_timing_in_config_is_a_startup_error() {
    let home = tempdir().unwrap();
    let config = home.path().join("bad.json");
    let mut file = File::create(&config).unwrap();
    writeln!(file, r#"{{ "timing": {{ "poll_interval_ms": 0 }} }}"#).unwrap();

    main_command(&home)
        .args(["--url", "https://example.com/", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("poll_interval_ms"));
}
