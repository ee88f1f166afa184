// src/config.rs

pub mod file;
pub mod urls;

use self::file::{load_external_config, load_or_create_external_config};
use crate::{
    cli::Cli,
    constants::{download, naming, service},
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// 远程打包服务的页面结构。字段缺省时使用内置值。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    pub entry_url: Option<String>,
    pub url_input_selector: Option<String>,
    pub option_checkboxes: Option<Vec<String>>,
    pub submit_selector: Option<String>,
    pub download_button_selector: Option<String>,
    pub pending_class: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimingConfig {
    pub poll_interval_ms: Option<u64>,
    pub start_timeout_secs: Option<u64>,
    pub completion_timeout_secs: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub ready_timeout_secs: Option<u64>,
    pub navigation_timeout_secs: Option<u64>,
    pub finalize_retries: Option<u32>,
    pub finalize_retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrowserFileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExternalConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub browser: BrowserFileConfig,
}

impl ExternalConfig {
    /// 首次运行时写入磁盘的完整默认配置，方便用户按需修改。
    pub(crate) fn default_app_config() -> Self {
        let service = ServiceConfig {
            entry_url: Some(service::ENTRY_URL.into()),
            url_input_selector: Some(service::URL_INPUT_SELECTOR.into()),
            option_checkboxes: Some(vec![
                service::DEFAULT_DOWNLOAD_CHECKBOX.into(),
                service::SAVE_STRUCTURE_CHECKBOX.into(),
            ]),
            submit_selector: Some(service::SUBMIT_SELECTOR.into()),
            download_button_selector: Some(service::DOWNLOAD_BUTTON_SELECTOR.into()),
            pending_class: Some(service::PENDING_CLASS.into()),
        };

        let timing = TimingConfig {
            poll_interval_ms: Some(download::POLL_INTERVAL_MS),
            start_timeout_secs: Some(download::START_TIMEOUT_SECS),
            completion_timeout_secs: Some(download::COMPLETION_TIMEOUT_SECS),
            settle_delay_ms: Some(download::SETTLE_DELAY_MS),
            ready_timeout_secs: Some(service::READY_TIMEOUT_SECS),
            navigation_timeout_secs: Some(service::NAVIGATION_TIMEOUT_SECS),
            finalize_retries: Some(download::FINALIZE_RETRIES),
            finalize_retry_delay_ms: Some(download::FINALIZE_RETRY_DELAY_MS),
        };

        Self {
            service,
            timing,
            browser: BrowserFileConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceProfile {
    pub entry_url: String,
    pub url_input_selector: String,
    pub option_checkboxes: Vec<String>,
    pub submit_selector: String,
    pub download_button_selector: String,
    pub pending_class: String,
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub in_progress_suffix: String,
    pub poll_interval: Duration,
    pub start_timeout: Duration,
    pub completion_timeout: Duration,
    pub settle_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct FinalizeSettings {
    pub retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub archive_extension: String,
    pub max_name_attempts: usize,
    pub ready_timeout: Duration,
    pub navigation_timeout: Duration,
    pub service: ServiceProfile,
    pub watch: WatchSettings,
    pub finalize: FinalizeSettings,
    pub browser: BrowserSettings,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = match &args.config {
            Some(path) => load_external_config(path)?,
            None => load_or_create_external_config()?,
        };

        let mut config = Self::from_external(args.output.clone(), external_config)?;
        config.browser.headless = args.headless;
        if let Some(path) = &args.chrome_path {
            config.browser.chrome_path = Some(path.clone());
        }
        Ok(config)
    }

    /// 解析配置文件的内容，取值超出范围时报错。
    pub fn from_external(output_dir: PathBuf, external: ExternalConfig) -> AppResult<Self> {
        let config = Self::resolve(output_dir, external);
        config.validate()?;
        Ok(config)
    }

    fn resolve(output_dir: PathBuf, external: ExternalConfig) -> Self {
        let ExternalConfig {
            service: svc,
            timing,
            browser,
        } = external;

        let service = ServiceProfile {
            entry_url: svc.entry_url.unwrap_or_else(|| service::ENTRY_URL.into()),
            url_input_selector: svc
                .url_input_selector
                .unwrap_or_else(|| service::URL_INPUT_SELECTOR.into()),
            option_checkboxes: svc.option_checkboxes.unwrap_or_else(|| {
                vec![
                    service::DEFAULT_DOWNLOAD_CHECKBOX.into(),
                    service::SAVE_STRUCTURE_CHECKBOX.into(),
                ]
            }),
            submit_selector: svc
                .submit_selector
                .unwrap_or_else(|| service::SUBMIT_SELECTOR.into()),
            download_button_selector: svc
                .download_button_selector
                .unwrap_or_else(|| service::DOWNLOAD_BUTTON_SELECTOR.into()),
            pending_class: svc
                .pending_class
                .unwrap_or_else(|| service::PENDING_CLASS.into()),
        };

        let watch = WatchSettings {
            in_progress_suffix: download::IN_PROGRESS_SUFFIX.into(),
            poll_interval: Duration::from_millis(
                timing.poll_interval_ms.unwrap_or(download::POLL_INTERVAL_MS),
            ),
            start_timeout: Duration::from_secs(
                timing.start_timeout_secs.unwrap_or(download::START_TIMEOUT_SECS),
            ),
            completion_timeout: Duration::from_secs(
                timing
                    .completion_timeout_secs
                    .unwrap_or(download::COMPLETION_TIMEOUT_SECS),
            ),
            settle_delay: Duration::from_millis(
                timing.settle_delay_ms.unwrap_or(download::SETTLE_DELAY_MS),
            ),
        };

        let finalize = FinalizeSettings {
            retries: timing.finalize_retries.unwrap_or(download::FINALIZE_RETRIES),
            retry_delay: Duration::from_millis(
                timing
                    .finalize_retry_delay_ms
                    .unwrap_or(download::FINALIZE_RETRY_DELAY_MS),
            ),
        };

        Self {
            output_dir,
            archive_extension: naming::ARCHIVE_EXTENSION.into(),
            max_name_attempts: naming::MAX_NAME_ATTEMPTS,
            ready_timeout: Duration::from_secs(
                timing.ready_timeout_secs.unwrap_or(service::READY_TIMEOUT_SECS),
            ),
            navigation_timeout: Duration::from_secs(
                timing
                    .navigation_timeout_secs
                    .unwrap_or(service::NAVIGATION_TIMEOUT_SECS),
            ),
            service,
            watch,
            finalize,
            browser: BrowserSettings {
                headless: false,
                chrome_path: browser.chrome_path,
                extra_args: browser.extra_args,
            },
        }
    }
}

impl AppConfig {
    fn validate(&self) -> AppResult<()> {
        if self.watch.poll_interval.is_zero() {
            return Err(AppError::UserInputError(
                "配置错误: timing.poll_interval_ms 必须大于 0".to_string(),
            ));
        }
        let max = Duration::from_secs(download::MAX_TIMEOUT_SECS);
        let limits = [
            ("timing.start_timeout_secs", self.watch.start_timeout),
            ("timing.completion_timeout_secs", self.watch.completion_timeout),
            ("timing.ready_timeout_secs", self.ready_timeout),
            ("timing.navigation_timeout_secs", self.navigation_timeout),
            ("timing.poll_interval_ms", self.watch.poll_interval),
            ("timing.settle_delay_ms", self.watch.settle_delay),
            ("timing.finalize_retry_delay_ms", self.finalize.retry_delay),
        ];
        for (key, value) in limits {
            if value > max {
                return Err(AppError::UserInputError(format!(
                    "配置错误: {} 超出允许范围 (最大 {} 秒)",
                    key,
                    download::MAX_TIMEOUT_SECS
                )));
            }
        }
        Ok(())
    }
}

#[cfg(feature = "testing")]
impl Default for AppConfig {
    fn default() -> Self {
        Self::resolve(
            PathBuf::from(crate::constants::DEFAULT_OUTPUT_DIR),
            ExternalConfig::default(),
        )
    }
}
