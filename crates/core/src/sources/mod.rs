//! Property sources
//!
//! A property source supplies flat, dot-separated keys (`app.message`) mapped to
//! scalar JSON values. Sources are queried by the [`ConfigAccessor`](crate::accessor::ConfigAccessor)
//! in descending [`PropertySource::priority`] order; the first source defining a
//! key wins.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::ConfigResult;

pub mod env;
pub mod file;
pub mod memory;
pub mod remote;

pub use env::EnvVarSource;
pub use file::FileSource;
pub use memory::MemorySource;
pub use remote::{EnvironmentResponse, RemotePropertySource, RemoteSource};

/// Flat key/value view of one source
pub type PropertyMap = BTreeMap<String, Value>;

/// Well-known priorities, higher wins.
pub mod priority {
    pub const OVERRIDES: i32 = 400;
    pub const REMOTE: i32 = 300;
    pub const ENVIRONMENT: i32 = 200;
    pub const FILE: i32 = 100;
    pub const DEFAULTS: i32 = 0;
}

/// A provider of configuration properties
#[async_trait]
pub trait PropertySource: Send + Sync {
    /// Human-readable name, reported as the origin of resolved values.
    fn name(&self) -> String;

    fn priority(&self) -> i32 {
        priority::FILE
    }

    /// Optional sources may be skipped when they fail during a lenient load.
    fn is_optional(&self) -> bool {
        false
    }

    /// Load every property this source currently defines.
    async fn load(&self) -> ConfigResult<PropertyMap>;
}

/// Flatten nested objects into dotted keys and arrays into `key[i]`.
pub fn flatten(value: &Value) -> PropertyMap {
    let mut out = PropertyMap::new();
    flatten_into("", value, &mut out);
    out
}

/// Flatten `value` under `prefix` into `out`.
pub fn flatten_into(prefix: &str, value: &Value, out: &mut PropertyMap) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&full, nested, out);
            }
        }
        Value::Array(items) if !prefix.is_empty() => {
            for (index, nested) in items.iter().enumerate() {
                flatten_into(&format!("{prefix}[{index}]"), nested, out);
            }
        }
        scalar => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), scalar.clone());
            }
        }
    }
}
