use anyhow::Result;
use clap::Parser;
use survey_bank::cli::{dispatch, Cli};
use survey_bank::utils::logging;
use survey_bank::Config;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    let cli = Cli::parse();

    // 加载配置
    let config = Config::from_env()?;

    if let Err(e) = dispatch(cli, &config).await {
        error!("❌ 执行失败: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
