//! RPC 调用错误类型
//!
//! 穿过拦截器边界的唯一错误类型。拦截器只观察它，从不替换或改写。

use super::code::OutcomeCode;
use thiserror::Error;

/// RPC 调用错误
#[derive(Error, Debug)]
pub enum RpcError {
    /// 已携带 RPC 状态码的错误
    #[error("{code}: {message}")]
    Status { code: OutcomeCode, message: String },

    /// 任意其它错误，状态码由分类器推断
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl RpcError {
    /// 创建携带状态码的错误
    pub fn new(code: OutcomeCode, message: impl Into<String>) -> Self {
        RpcError::Status {
            code,
            message: message.into(),
        }
    }

    /// 包装任意错误
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RpcError::Other(Box::new(err))
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Canceled, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Unknown, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::InvalidArgument, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::DeadlineExceeded, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::NotFound, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::FailedPrecondition, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Unavailable, message)
    }

    /// 状态码（若错误本身携带）
    ///
    /// `Other` 变体返回 `None`，需要时使用 [`crate::error::classify`] 推断。
    pub fn code(&self) -> Option<OutcomeCode> {
        match self {
            RpcError::Status { code, .. } => Some(*code),
            RpcError::Other(_) => None,
        }
    }

    /// 错误描述，不含状态码前缀
    pub fn message(&self) -> String {
        match self {
            RpcError::Status { message, .. } => message.clone(),
            RpcError::Other(err) => err.to_string(),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, RpcError>;
