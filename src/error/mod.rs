//! Flare RPC 日志拦截器错误处理模块
//!
//! 提供统一的 RPC 错误类型、状态码分类以及与 gRPC 状态之间的转换

pub mod classify;
pub mod code;
pub mod grpc;
pub mod rpc_error;

pub use classify::{ReceiveOutcome, classify, classify_error, classify_receive};
pub use code::OutcomeCode;
pub use rpc_error::{Result, RpcError};

use thiserror::Error;

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析配置失败: {0}")]
    Parse(#[from] toml::de::Error),
}
