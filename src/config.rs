//! 服务配置
//!
//! 按以下优先级加载（从低到高）:
//! 1. `config/default.toml`
//! 2. `config/user.toml`（可选，本地覆盖）
//! 3. 环境变量 `PIE_SECTION__KEY`，例如 `PIE_SERVER__PORT=9090`

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// 服务总配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ServerConfig {
    /// 从默认目录 `config/` 加载
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// 从指定目录加载
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        // 编译期默认值打底，文件缺失时也能启动
        let mut figment = Figment::from(Serialized::defaults(ServerConfig::default()));

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // PIE_LIMITS__MAX_VOXELS=1000 -> limits.max_voxels = 1000
        figment = figment.merge(Env::prefixed("PIE_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// HTTP 监听配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// actix worker 数量，0 表示按 CPU 核数
    pub workers: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: 0,
        }
    }
}

/// 请求限制，防止体素数量随分辨率立方增长耗尽内存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_resolution: u32,
    /// 单个任务允许的最大体素数 (nx * ny * nz)
    pub max_voxels: usize,
    pub max_expressions: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_resolution: 16,
            max_voxels: 8_000_000,
            max_expressions: 64,
        }
    }
}

/// 任务存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// 任务过期时间（秒）
    pub ttl_secs: u64,
    /// 清理周期（秒）
    pub cleanup_interval_secs: u64,
    /// 请求未指定 chunk_size 时使用的分块大小（体素个数）
    pub default_chunk_size: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            cleanup_interval_secs: 5 * 60,
            default_chunk_size: 1_000_000,
        }
    }
}

impl TaskConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// error, warn, info, debug, trace；RUST_LOG 优先
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// 配置错误
#[derive(Debug, thiserror::Error)]
#[error("配置错误: {message}")]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_files() {
        Jail::expect_with(|_jail| {
            let config = ServerConfig::load_from("missing-dir").expect("defaults");
            assert_eq!(config, ServerConfig::default());
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.tasks.ttl(), Duration::from_secs(1800));
            Ok(())
        });
    }

    #[test]
    fn user_file_overrides_default_file() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/default.toml",
                r#"
                [server]
                host = "0.0.0.0"
                port = 9000
                workers = 2

                [limits]
                max_resolution = 4
                max_voxels = 1000
                max_expressions = 8
                "#,
            )?;
            jail.create_file(
                "config/user.toml",
                r#"
                [server]
                host = "0.0.0.0"
                port = 9100
                workers = 2
                "#,
            )?;

            let config = ServerConfig::load().expect("config");
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.limits.max_voxels, 1000);
            assert_eq!(config.log.level, "info");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_everything() {
        Jail::expect_with(|jail| {
            jail.set_env("PIE_LIMITS__MAX_VOXELS", "42");
            jail.set_env("PIE_LOG__LEVEL", "debug");
            let config = ServerConfig::load_from("config").expect("config");
            assert_eq!(config.limits.max_voxels, 42);
            assert_eq!(config.log.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn invalid_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("PIE_SERVER__PORT", "not-a-port");
            let err = ServerConfig::load().unwrap_err();
            assert!(err.to_string().starts_with("配置错误"));
            Ok(())
        });
    }
}
