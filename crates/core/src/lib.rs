//! # Config Client Core
//!
//! 可刷新配置客户端的核心库：从多个配置源解析 `app.*` 配置，并以原子快照的方式
//! 在运行时按需刷新。
//!
//! - **sources**: 配置源（内存覆盖、环境变量、本地文件、远程配置服务）
//! - **accessor**: 按优先级解析配置键
//! - **binding**: 可刷新的配置绑定，基于 `ArcSwap` 的快照交换
//! - **refresh**: 外部触发的刷新操作
//! - **settings**: 客户端自身的配置

pub mod accessor;
pub mod binding;
pub mod errors;
pub mod refresh;
pub mod settings;
pub mod sources;

pub use accessor::{ConfigAccessor, LoadMode, ResolvedEnvironment, Resolution};
pub use binding::{BindingSpec, ConfigValue, ConfigurationSnapshot, RefreshOutcome, RefreshableBinding};
pub use errors::{ConfigError, ConfigResult};
pub use refresh::{RefreshReport, RefreshStats, RefreshTrigger};
pub use settings::AppConfig;
pub use sources::{MemorySource, PropertyMap, PropertySource};
