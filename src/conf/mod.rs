use crate::common::AppResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

// 全局配置实例
static CONFIG: OnceLock<Settings> = OnceLock::new();

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,      // 后端地址
    pub client_id: String,     // OAuth2 客户端 ID
    pub client_secret: String, // OAuth2 客户端密钥
    pub timeout_secs: u64,     // 请求超时（秒）
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub enabled: bool, // 关闭时会话只保存在内存中
    pub path: PathBuf, // 会话文件路径
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                client_id: "myclientid".to_string(),
                client_secret: "myclientsecret".to_string(),
                timeout_secs: 5,
            },
            storage: StorageConfig {
                enabled: true,
                path: PathBuf::from(".insumos-session.json"),
            },
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// 使用指定路径初始化全局配置；已初始化时返回现有实例
    pub fn init_global(path: impl AsRef<Path>) -> AppResult<&'static Settings> {
        if let Some(config) = CONFIG.get() {
            return Ok(config);
        }
        let config = Self::load(path)?;
        Ok(CONFIG.get_or_init(|| config))
    }

    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();

        // 尝试读取配置文件
        let config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Settings>(&content)?,
            Err(_) => {
                // 如果配置文件不存在，使用默认配置并创建配置文件
                let default_config = Settings::default();
                let content = toml::to_string_pretty(&default_config)?;
                fs::write(path, content)?;
                default_config
            }
        };

        Ok(config)
    }

    /// 令牌端点
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.api.base_url.trim_end_matches('/'))
    }

    /// REST 资源地址
    pub fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/lanchonete/api/{}",
            self.api.base_url.trim_end_matches('/'),
            resource
        )
    }
}
