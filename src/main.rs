use clap::Parser;
use insumos_admin::{cli, conf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // 初始化配置
    let config = conf::Settings::init_global(&cli.config)?;

    // 初始化日志
    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run(cli, config).await
}
