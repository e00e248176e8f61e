use thiserror::Error;

/// Errors raised while resolving, binding or refreshing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key absent from every property source.
    #[error("配置项未找到: {key}")]
    NotFound { key: String },

    /// A property source could not be queried (unreachable, bad status, undecodable body).
    #[error("配置源不可用: {source_name} - {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A value could not be bound into a snapshot.
    #[error("配置绑定失败: {key} - {reason}")]
    Binding { key: String, reason: String },

    #[error("配置错误: {0}")]
    Configuration(String),
}

impl ConfigError {
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn binding(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Binding {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, used by the HTTP layer and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::NotFound { .. } => "NOT_FOUND",
            ConfigError::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            ConfigError::Binding { .. } => "BINDING_ERROR",
            ConfigError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Configuration(err.to_string())
    }
}

/// 统一的Result类型
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
