use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use config_client_api::create_app;
use config_client_core::{
    AppConfig, BindingSpec, ConfigAccessor, LoadMode, MemorySource, RefreshTrigger,
    RefreshableBinding,
};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

/// 主应用程序
pub struct Application {
    config: AppConfig,
    trigger: Arc<RefreshTrigger>,
    overrides: Arc<MemorySource>,
}

impl Application {
    /// 解析初始配置并绑定第0代快照
    pub async fn build(config: AppConfig) -> Result<Self> {
        info!(
            "初始化配置客户端: {}/{}",
            config.application.name, config.application.profile
        );

        let overrides = Arc::new(MemorySource::overrides());
        let accessor = Arc::new(
            ConfigAccessor::from_settings(&config, overrides.clone())
                .context("创建配置源失败")?,
        );
        for (name, priority) in accessor.describe() {
            info!("配置源: {name} (优先级 {priority})");
        }

        // fail_fast时启动阶段不允许跳过不可用的配置源
        let mode = if config.config_service.fail_fast {
            LoadMode::Strict
        } else {
            LoadMode::Lenient
        };
        let binding = RefreshableBinding::initialize(
            accessor,
            BindingSpec::from(&config.binding),
            mode,
        )
        .await
        .context("初始配置绑定失败")?;
        info!("初始配置已绑定，共 {} 个值", binding.snapshot().len());

        Ok(Self {
            config,
            trigger: Arc::new(RefreshTrigger::new(Arc::new(binding))),
            overrides,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn trigger(&self) -> &Arc<RefreshTrigger> {
        &self.trigger
    }

    pub fn router(&self) -> Router {
        create_app(self.trigger.clone(), self.overrides.clone())
    }

    /// 绑定配置的地址并运行，直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = &self.config.server.bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {bind_address}"))?;

        self.serve(listener, shutdown_rx).await
    }

    /// 在已绑定的监听器上提供HTTP服务
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let local_addr = listener.local_addr().context("获取监听地址失败")?;
        info!("API服务器启动在: {local_addr}");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .context("API服务器运行失败")?;

        info!("API服务器已停止");
        Ok(())
    }
}
