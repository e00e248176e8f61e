use async_trait::async_trait;
use serde_json::Value;

use super::{priority, PropertyMap, PropertySource};
use crate::ConfigResult;

/// Process environment variables
///
/// For every configured prefix, `APP_MESSAGE=hi` becomes `app.message = "hi"`.
/// Values are kept as strings; binding converts them anyway.
pub struct EnvVarSource {
    prefixes: Vec<String>,
}

impl EnvVarSource {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.trim_end_matches('_').to_uppercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    fn collect<I>(&self, vars: I) -> PropertyMap
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut properties = PropertyMap::new();
        for (name, value) in vars {
            let matched = self.prefixes.iter().any(|prefix| {
                name.len() > prefix.len() + 1
                    && name.starts_with(prefix.as_str())
                    && name.as_bytes()[prefix.len()] == b'_'
            });
            if matched {
                let key = name.to_lowercase().replace('_', ".");
                properties.insert(key, Value::String(value));
            }
        }
        properties
    }
}

#[async_trait]
impl PropertySource for EnvVarSource {
    fn name(&self) -> String {
        "systemEnvironment".to_string()
    }

    fn priority(&self) -> i32 {
        priority::ENVIRONMENT
    }

    async fn load(&self) -> ConfigResult<PropertyMap> {
        Ok(self.collect(std::env::vars()))
    }
}
