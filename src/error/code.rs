//! 调用结果状态码定义
//!
//! 与 gRPC / Connect 协议的状态码一一对应，数值沿用 gRPC 编号

use serde::{Deserialize, Serialize};
use std::fmt;

/// 调用结果状态码
///
/// 封闭枚举：任何不属于以下取值的终止错误都归类为 [`OutcomeCode::Unknown`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum OutcomeCode {
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutcomeCode {
    /// 获取状态码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建状态码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0 => Some(OutcomeCode::Ok),
            1 => Some(OutcomeCode::Canceled),
            2 => Some(OutcomeCode::Unknown),
            3 => Some(OutcomeCode::InvalidArgument),
            4 => Some(OutcomeCode::DeadlineExceeded),
            5 => Some(OutcomeCode::NotFound),
            6 => Some(OutcomeCode::AlreadyExists),
            7 => Some(OutcomeCode::PermissionDenied),
            8 => Some(OutcomeCode::ResourceExhausted),
            9 => Some(OutcomeCode::FailedPrecondition),
            10 => Some(OutcomeCode::Aborted),
            11 => Some(OutcomeCode::OutOfRange),
            12 => Some(OutcomeCode::Unimplemented),
            13 => Some(OutcomeCode::Internal),
            14 => Some(OutcomeCode::Unavailable),
            15 => Some(OutcomeCode::DataLoss),
            16 => Some(OutcomeCode::Unauthenticated),
            _ => None,
        }
    }

    /// 协议中使用的字符串形式（snake_case）
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCode::Ok => "ok",
            OutcomeCode::Canceled => "canceled",
            OutcomeCode::Unknown => "unknown",
            OutcomeCode::InvalidArgument => "invalid_argument",
            OutcomeCode::DeadlineExceeded => "deadline_exceeded",
            OutcomeCode::NotFound => "not_found",
            OutcomeCode::AlreadyExists => "already_exists",
            OutcomeCode::PermissionDenied => "permission_denied",
            OutcomeCode::ResourceExhausted => "resource_exhausted",
            OutcomeCode::FailedPrecondition => "failed_precondition",
            OutcomeCode::Aborted => "aborted",
            OutcomeCode::OutOfRange => "out_of_range",
            OutcomeCode::Unimplemented => "unimplemented",
            OutcomeCode::Internal => "internal",
            OutcomeCode::Unavailable => "unavailable",
            OutcomeCode::DataLoss => "data_loss",
            OutcomeCode::Unauthenticated => "unauthenticated",
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, OutcomeCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_follow_grpc() {
        assert_eq!(OutcomeCode::NotFound.as_u32(), 5);
        assert_eq!(OutcomeCode::from_u32(1), Some(OutcomeCode::Canceled));
        assert_eq!(OutcomeCode::from_u32(17), None);
        for n in 0..=16 {
            let code = OutcomeCode::from_u32(n).unwrap();
            assert_eq!(code.as_u32(), n);
        }
    }

    #[test]
    fn display_uses_snake_case() {
        assert_eq!(OutcomeCode::NotFound.to_string(), "not_found");
        assert_eq!(
            serde_json::to_string(&OutcomeCode::DeadlineExceeded).unwrap(),
            "\"deadline_exceeded\""
        );
    }
}
