mod cache;
mod config;
mod gateway;
mod store;
mod tui;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 加载配置
    let config = config::Config::load_or_default()?;
    config.ensure_dirs()?;
    log::info!("服务端: {}", config.server_url);

    tui::run(config).await?;

    Ok(())
}
