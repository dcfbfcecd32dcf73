use crate::error::ConfigError;
use crate::interceptor::PayloadPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub interceptor: InterceptorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String, // EnvFilter 指令，例如 "info" 或 "flare_rpc_logging=debug"
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterceptorConfig {
    /// 是否在 DEBUG 级别事件中附带载荷摘要
    #[serde(default = "default_log_payloads")]
    pub log_payloads: bool,
    /// 载荷摘要的最大字节数，0 表示不限制
    #[serde(default = "default_payload_limit")]
    pub payload_limit: usize,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            log_payloads: default_log_payloads(),
            payload_limit: default_payload_limit(),
        }
    }
}

fn default_log_payloads() -> bool {
    true
}

fn default_payload_limit() -> usize {
    4096
}

impl InterceptorConfig {
    pub fn payload_policy(&self) -> PayloadPolicy {
        if !self.log_payloads {
            return PayloadPolicy::disabled();
        }
        match self.payload_limit {
            0 => PayloadPolicy::unbounded(),
            limit => PayloadPolicy::bounded(limit),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
