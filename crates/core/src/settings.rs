use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Prefix for environment overrides of the client's own settings,
/// e.g. `CONFIG_CLIENT__SERVER__BIND_ADDRESS=127.0.0.1:9090`.
pub const ENV_PREFIX: &str = "CONFIG_CLIENT";

/// Settings of the configuration client process itself
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub application: ApplicationConfig,
    pub server: ServerConfig,
    pub config_service: ConfigServiceConfig,
    pub properties: PropertiesConfig,
    pub binding: BindingConfig,
    /// Static `defaultProperties`, lowest precedence
    pub defaults: BTreeMap<String, serde_json::Value>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub profile: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "configuration-client".to_string(),
            profile: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Remote configuration service the client pulls from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigServiceConfig {
    pub enabled: bool,
    pub uri: String,
    pub label: Option<String>,
    pub timeout_seconds: u64,
    /// Refuse to start when the service cannot be reached at startup
    pub fail_fast: bool,
}

impl Default for ConfigServiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: "http://localhost:8888".to_string(),
            label: None,
            timeout_seconds: 5,
            fail_fast: false,
        }
    }
}

impl ConfigServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Local property sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertiesConfig {
    pub file: Option<PathBuf>,
    pub required: bool,
    pub env_prefixes: Vec<String>,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("config/application.toml")),
            required: false,
            env_prefixes: vec!["APP".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub prefix: String,
    pub keys: Vec<String>,
    pub defaults: BTreeMap<String, String>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            prefix: "app".to_string(),
            keys: vec!["app.message".to_string()],
            defaults: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load settings from an optional TOML file and environment variables
    ///
    /// Load order:
    /// 1. Built-in defaults
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: CONFIG_CLIENT, separator: `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            for path in ["config/client.toml", "client.toml"] {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Parse settings from a TOML string, without environment overrides
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = ConfigBuilder::builder()
            .add_source(File::from_str(toml_str, FileFormat::Toml))
            .build()
            .context("解析TOML配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.application.name.trim().is_empty() {
            anyhow::bail!("application.name 不能为空");
        }
        if self.application.profile.trim().is_empty() {
            anyhow::bail!("application.profile 不能为空");
        }

        self.server
            .bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("无效的监听地址: {}", self.server.bind_address))?;

        if self.config_service.enabled {
            let uri = self.config_service.uri.trim();
            if !(uri.starts_with("http://") || uri.starts_with("https://")) {
                anyhow::bail!("config_service.uri 必须以 http:// 或 https:// 开头: {}", uri);
            }
            if self.config_service.timeout_seconds == 0 {
                anyhow::bail!("config_service.timeout_seconds 必须大于0");
            }
        }

        if self.binding.prefix.trim().is_empty() {
            anyhow::bail!("binding.prefix 不能为空");
        }
        let scope = format!("{}.", self.binding.prefix);
        for key in &self.binding.keys {
            if !key.starts_with(&scope) {
                anyhow::bail!("绑定键 {} 不在前缀 {} 下", key, self.binding.prefix);
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => anyhow::bail!("不支持的日志格式: {}", other),
        }
    }
}
