use std::path::{Path, PathBuf};

use async_trait::async_trait;
use config::{Config as ConfigBuilder, File, FileFormat};
use serde_json::Value;
use tracing::debug;

use super::{flatten, priority, PropertyMap, PropertySource};
use crate::{ConfigError, ConfigResult};

/// Local properties file (TOML, JSON, YAML or INI, chosen by extension)
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }

    /// A required file that is missing fails the load instead of yielding nothing.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> FileFormat {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => FileFormat::Json,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("ini") => FileFormat::Ini,
            _ => FileFormat::Toml,
        }
    }

    fn read(&self) -> ConfigResult<PropertyMap> {
        if !self.path.exists() {
            if self.required {
                return Err(ConfigError::source_unavailable(
                    self.name(),
                    "file does not exist",
                ));
            }
            debug!(path = %self.path.display(), "optional properties file not found");
            return Ok(PropertyMap::new());
        }

        let value: Value = ConfigBuilder::builder()
            .add_source(File::from(self.path.as_path()).format(self.format()))
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ConfigError::source_unavailable(self.name(), e))?;

        Ok(flatten(&value))
    }
}

#[async_trait]
impl PropertySource for FileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        priority::FILE
    }

    fn is_optional(&self) -> bool {
        !self.required
    }

    async fn load(&self) -> ConfigResult<PropertyMap> {
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_nested_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.toml");
        std::fs::write(
            &path,
            r#"
            [app]
            message = "Hello from file"
            retries = 3
            "#,
        )
        .unwrap();

        let loaded = FileSource::new(&path).load().await.unwrap();
        assert_eq!(loaded["app.message"], "Hello from file");
        assert_eq!(loaded["app.retries"], 3);
    }

    #[tokio::test]
    async fn test_load_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.json");
        std::fs::write(&path, r#"{ "app": { "message": "json" } }"#).unwrap();

        let loaded = FileSource::new(&path).load().await.unwrap();
        assert_eq!(loaded["app.message"], "json");
    }

    #[tokio::test]
    async fn test_missing_optional_file_is_empty() {
        let source = FileSource::new("/no/such/application.toml");
        assert!(source.is_optional());
        assert!(source.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_file_is_unavailable() {
        let source = FileSource::new("/no/such/application.toml").required(true);
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.toml");
        std::fs::write(&path, "[app\nmessage = ").unwrap();

        let err = FileSource::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
    }
}
