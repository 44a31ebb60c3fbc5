use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// 服务端地址的环境变量覆盖
pub const SERVER_ENV: &str = "PACKAGE_AUDIT_SERVER";

/// 应用级配置：API 服务在哪里、设置和导出文件放在哪里。
/// 用户偏好（主题、确认卸载等）不在这里，见 `store`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub state_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = home_dir().join(".package-audit");
        Self {
            server_url: "http://localhost:8000".to_string(),
            export_dir: base.join("exports"),
            state_dir: base,
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        home_dir().join(".config/package-audit/config.toml")
    }

    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::path();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("读取配置失败: {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("解析配置失败: {}", config_path.display()))?
        } else {
            Self::default()
        };

        // 环境变量优先于配置文件
        if let Ok(server) = std::env::var(SERVER_ENV) {
            if !server.trim().is_empty() {
                config.server_url = server.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("无法创建目录: {}", self.state_dir.display()))?;
        Ok(())
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}
