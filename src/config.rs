use crate::error::{AppResult, ConfigError};

/// 程序配置
///
/// 命令行参数优先于这里的值；数据库密码和 CA 路径只从环境变量读取。
#[derive(Clone, Debug)]
pub struct Config {
    // --- 翻译后端（OpenAI 兼容接口）---
    pub translate_api_key: String,
    pub translate_api_base_url: String,
    pub translate_model: String,
    /// 单条文本最多尝试次数
    pub translate_max_attempts: usize,
    /// 单次调用超时（秒）
    pub translate_timeout_secs: u64,
    // --- 数据库（TiDB / MySQL 协议）---
    pub store_host: String,
    pub store_port: u16,
    pub store_user: String,
    pub store_database: String,
    /// 存放密码的环境变量名
    pub store_password_env: String,
    /// 存放 CA 证书路径的环境变量名
    pub store_ca_env: String,
    /// 问卷锁的有效期（秒），过期后可被回收
    pub lock_ttl_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            translate_api_key: "EMPTY".to_string(),
            translate_api_base_url: "http://127.0.0.1:11723/v1".to_string(),
            translate_model: "gpt-4o-mini".to_string(),
            translate_max_attempts: 3,
            translate_timeout_secs: 60,
            store_host: "127.0.0.1".to_string(),
            store_port: 4000,
            store_user: "root".to_string(),
            store_database: "survey".to_string(),
            store_password_env: "TIDB_PASSWORD".to_string(),
            store_ca_env: "TIDB_CA".to_string(),
            lock_ttl_seconds: 2 * 60 * 60,
        }
    }
}

impl Config {
    /// 从环境变量加载，缺失的项使用默认值
    pub fn from_env() -> AppResult<Self> {
        let default = Self::default();
        Ok(Self {
            translate_api_key: std::env::var("TRANSLATE_API_KEY").unwrap_or(default.translate_api_key),
            translate_api_base_url: std::env::var("TRANSLATE_API_BASE_URL").unwrap_or(default.translate_api_base_url),
            translate_model: std::env::var("OPENAI_MODEL").unwrap_or(default.translate_model),
            translate_max_attempts: parse_env("TRANSLATE_MAX_ATTEMPTS", "usize")?.unwrap_or(default.translate_max_attempts),
            translate_timeout_secs: parse_env("TRANSLATE_TIMEOUT_SECS", "u64")?.unwrap_or(default.translate_timeout_secs),
            store_host: std::env::var("TIDB_HOST").unwrap_or(default.store_host),
            store_port: parse_env("TIDB_PORT", "u16")?.unwrap_or(default.store_port),
            store_user: std::env::var("TIDB_USER").unwrap_or(default.store_user),
            store_database: std::env::var("TIDB_DATABASE").unwrap_or(default.store_database),
            store_password_env: default.store_password_env,
            store_ca_env: default.store_ca_env,
            lock_ttl_seconds: parse_env("LOCK_TTL_SECONDS", "u64")?.unwrap_or(default.lock_ttl_seconds),
        })
    }
}

/// 读取并解析环境变量；未设置返回 None，设置了但无法解析则报错
fn parse_env<T: std::str::FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("SURVEY_BANK_TEST_PORT", "not-a-port");
        let result: AppResult<Option<u16>> = parse_env("SURVEY_BANK_TEST_PORT", "u16");
        assert!(result.is_err());
        std::env::remove_var("SURVEY_BANK_TEST_PORT");
    }

    #[test]
    fn test_parse_env_missing_is_none() {
        let result: Option<u64> = parse_env("SURVEY_BANK_TEST_UNSET_VAR", "u64").unwrap();
        assert!(result.is_none());
    }
}
