use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub draw: DrawConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 本地持久化目录（每个键一个 JSON 文件）
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// 试算表后端 (Apps Script Web App) 的 URL
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawConfig {
    /// 中奖记录的 admin 归属字段
    pub admin: String,
}

impl Default for DrawConfig {
    fn default() -> Self {
        DrawConfig {
            admin: "system".to_string(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                // 有配置文件：先解析再用环境变量覆盖
                toml::from_str(&config_str)
                    .map_err(|e| AppError::ConfigError(format!("解析配置文件失败: {e}")))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 无配置文件：使用环境变量与默认值构建
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 远端 URL 在无配置文件时必须提供
                let base_url = get_env("REMOTE_BASE_URL").ok_or_else(|| {
                    AppError::ConfigError(
                        "缺少 REMOTE_BASE_URL 环境变量，且未找到配置文件 config.toml".to_string(),
                    )
                })?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    storage: StorageConfig {
                        dir: get_env("STORAGE_DIR").unwrap_or_else(|| "./data".to_string()),
                    },
                    remote: RemoteConfig {
                        base_url,
                        timeout_secs: get_env_parse("REMOTE_TIMEOUT_SECS", 30u64),
                        max_retries: get_env_parse("REMOTE_MAX_RETRIES", 2u32),
                    },
                    draw: DrawConfig {
                        admin: get_env("DRAW_ADMIN").unwrap_or_else(|| "system".to_string()),
                    },
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "无法读取配置文件 {config_path}: {e}"
                )));
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("STORAGE_DIR") {
            config.storage.dir = v;
        }
        if let Ok(v) = env::var("REMOTE_BASE_URL") {
            config.remote.base_url = v;
        }
        if let Ok(v) = env::var("REMOTE_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.remote.timeout_secs = n;
        }
        if let Ok(v) = env::var("REMOTE_MAX_RETRIES")
            && let Ok(n) = v.parse()
        {
            config.remote.max_retries = n;
        }
        if let Ok(v) = env::var("DRAW_ADMIN") {
            config.draw.admin = v;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unparseable_config_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = 1").unwrap();

        unsafe { env::set_var("CONFIG_PATH", &path) };
        let result = Config::from_toml();
        unsafe { env::remove_var("CONFIG_PATH") };

        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
