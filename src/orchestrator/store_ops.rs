//! 数据库连接参数与运维命令 - 编排层

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::infrastructure::{StoreSettings, TidbStore};

/// 连接参数；未指定的项取配置
#[derive(Debug, Clone, Default, Args, Deserialize)]
pub struct StoreArgs {
    #[arg(long)]
    #[serde(default)]
    pub host: Option<String>,
    #[arg(long)]
    #[serde(default)]
    pub port: Option<u16>,
    #[arg(long)]
    #[serde(default)]
    pub user: Option<String>,
    #[arg(long)]
    #[serde(default)]
    pub database: Option<String>,
    /// 存放密码的环境变量名
    #[arg(long = "password_env")]
    #[serde(default)]
    pub password_env: Option<String>,
    /// 存放 CA 证书路径的环境变量名
    #[arg(long = "ca_env")]
    #[serde(default)]
    pub ca_env: Option<String>,
    /// 问卷锁有效期（秒），默认取 `LOCK_TTL_SECONDS`
    #[arg(long = "lock_ttl_seconds")]
    #[serde(default)]
    pub lock_ttl_seconds: Option<u64>,
}

impl StoreArgs {
    pub fn resolve(&self, config: &Config) -> StoreSettings {
        let mut settings = StoreSettings::from_config(config);
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(user) = &self.user {
            settings.user = user.clone();
        }
        if let Some(database) = &self.database {
            settings.database = database.clone();
        }
        if let Some(env) = &self.password_env {
            settings.password_env = env.clone();
        }
        if let Some(env) = &self.ca_env {
            settings.ca_env = env.clone();
        }
        if let Some(ttl) = self.lock_ttl_seconds {
            settings.lock_ttl_seconds = ttl.max(1);
        }
        settings
    }

    pub async fn connect(&self, config: &Config) -> Result<TidbStore> {
        let settings = self.resolve(config);
        TidbStore::connect(&settings)
            .await
            .with_context(|| format!("连接数据库失败: {}:{}", settings.host, settings.port))
    }
}

/// `reclaim` 参数
#[derive(Debug, Clone, Args)]
pub struct ReclaimArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

/// 回收过期的 in_progress 问卷
pub async fn run_reclaim(config: &Config, args: &ReclaimArgs) -> Result<u64> {
    let store = args.store.connect(config).await?;
    let reclaimed = store.reclaim_expired().await.context("回收过期问卷失败")?;
    info!(
        "♻️ 已回收 {} 份过期问卷 (锁有效期 {} 秒)",
        reclaimed,
        store.lock_ttl_seconds()
    );
    Ok(reclaimed)
}
