// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const URL_TRUNCATE_LENGTH: usize = 60;
pub const MAX_FILENAME_BYTES: usize = 200;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DEFAULT_OUTPUT_DIR: &str = "zip";

pub mod naming {
    pub const INDEX_BASE_NAME: &str = "index";
    pub const UNKNOWN_BASE_NAME: &str = "unknown";
    pub const ARCHIVE_EXTENSION: &str = "zip";
    pub const MAX_NAME_ATTEMPTS: usize = 50;
}

pub mod download {
    /// Chromium 下载中的临时文件后缀
    pub const IN_PROGRESS_SUFFIX: &str = ".crdownload";
    /// Chromium 在确定最终文件名之前使用的占位名
    pub const UNCONFIRMED_PREFIX: &str = "Unconfirmed ";
    pub const POLL_INTERVAL_MS: u64 = 100;
    pub const START_TIMEOUT_SECS: u64 = 120;
    pub const COMPLETION_TIMEOUT_SECS: u64 = 300;
    pub const SETTLE_DELAY_MS: u64 = 1000;
    pub const FINALIZE_RETRIES: u32 = 10;
    pub const FINALIZE_RETRY_DELAY_MS: u64 = 1000;
    /// 配置文件中任一时间值的上限 (一天)
    pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;
}

pub mod service {
    pub const ENTRY_URL: &str = "https://saveweb2zip.com/en";
    pub const URL_INPUT_SELECTOR: &str = r#"input[name="websiteLink"]"#;
    pub const DEFAULT_DOWNLOAD_CHECKBOX: &str = r#"input[name="isDefaultDownload"]"#;
    pub const SAVE_STRUCTURE_CHECKBOX: &str = r#"input[name="isSaveStructure"]"#;
    pub const SUBMIT_SELECTOR: &str = ".main-form__btn";
    pub const DOWNLOAD_BUTTON_SELECTOR: &str = ".main-form__btn-download";
    pub const PENDING_CLASS: &str = "d-none";
    pub const READY_TIMEOUT_SECS: u64 = 30;
    pub const NAVIGATION_TIMEOUT_SECS: u64 = 60;
}
