use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config_client::{wait_for_shutdown_signal, Application, ShutdownManager};
use config_client_core::AppConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("config-client")
        .version("1.0.0")
        .about("可刷新的集中式配置客户端")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("客户端配置文件路径 (默认查找 config/client.toml)"),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("PROFILE")
                .help("覆盖 application.profile"),
        )
        .arg(
            Arg::new("config-service-uri")
                .long("config-service-uri")
                .value_name("URI")
                .help("配置服务地址，指定后自动启用远程配置源"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);

    // 加载配置
    let config = AppConfig::load(config_path)
        .with_context(|| format!("加载配置文件失败: {}", config_path.unwrap_or("<默认>")))?;
    let config = apply_cli_overrides(config, &matches)?;

    // 初始化日志系统
    init_logging(&config.logging.level, &config.logging.format)?;

    info!("启动配置客户端");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }
    info!(
        "应用: {}, 环境: {}",
        config.application.name, config.application.profile
    );
    if config.config_service.enabled {
        info!("配置服务: {}", config.config_service.uri);
    }

    // 创建应用实例
    let app = Arc::new(Application::build(config).await?);

    // 创建优雅关闭管理器
    let shutdown_manager = ShutdownManager::new();

    // 启动应用
    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);

        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    // 等待关闭信号
    wait_for_shutdown_signal().await;

    info!("收到关闭信号，开始优雅关闭...");

    // 触发关闭
    shutdown_manager.shutdown().await;

    // 等待应用关闭，设置超时
    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("配置客户端已退出");
    Ok(())
}

/// 命令行参数优先于配置文件
fn apply_cli_overrides(mut config: AppConfig, matches: &ArgMatches) -> Result<AppConfig> {
    if let Some(profile) = matches.get_one::<String>("profile") {
        config.application.profile = profile.clone();
    }
    if let Some(uri) = matches.get_one::<String>("config-service-uri") {
        config.config_service.uri = uri.clone();
        config.config_service.enabled = true;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.clone();
    }

    config.validate().context("命令行参数校验失败")?;
    Ok(config)
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}
