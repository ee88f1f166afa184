// src/config/file.rs

use crate::{
    config::ExternalConfig,
    constants,
    error::{AppError, AppResult},
};
use anyhow::{Context, anyhow};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub(crate) fn app_home_dir() -> AppResult<PathBuf> {
    let dir = dirs::home_dir()
        .ok_or_else(|| AppError::Other(anyhow!("无法获取用户主目录")))?
        .join(constants::CONFIG_DIR_NAME);
    Ok(dir)
}

pub(super) fn get_config_path() -> AppResult<PathBuf> {
    Ok(app_home_dir()?.join(constants::CONFIG_FILE_NAME))
}

/// 读取用户显式指定的配置文件，文件必须存在且格式正确。
pub(crate) fn load_external_config(path: &Path) -> AppResult<ExternalConfig> {
    debug!("读取指定的配置文件: {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取配置文件 '{}' 失败", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("解析配置文件 '{}' 失败", path.display()))
        .map_err(AppError::from)
}

pub(crate) fn load_or_create_external_config() -> AppResult<ExternalConfig> {
    let config_path = get_config_path()?;
    if config_path.is_file() {
        return load_external_config(&config_path);
    }

    info!("配置文件 {:?} 不存在，将创建默认配置。", config_path);
    let config = ExternalConfig::default_app_config();

    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir)?;
    }

    let json_content = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, json_content)
        .with_context(|| format!("写入默认配置 '{}' 失败", config_path.display()))?;

    Ok(config)
}
