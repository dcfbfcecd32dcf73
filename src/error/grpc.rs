//! gRPC 状态转换
//!
//! 提供 `tonic::Status` / `tonic::Code` 与 [`RpcError`] / [`OutcomeCode`] 之间的转换

use super::{OutcomeCode, RpcError};
use tonic::{Code, Status};

impl From<Code> for OutcomeCode {
    fn from(code: Code) -> Self {
        match code {
            Code::Ok => OutcomeCode::Ok,
            Code::Cancelled => OutcomeCode::Canceled,
            Code::Unknown => OutcomeCode::Unknown,
            Code::InvalidArgument => OutcomeCode::InvalidArgument,
            Code::DeadlineExceeded => OutcomeCode::DeadlineExceeded,
            Code::NotFound => OutcomeCode::NotFound,
            Code::AlreadyExists => OutcomeCode::AlreadyExists,
            Code::PermissionDenied => OutcomeCode::PermissionDenied,
            Code::ResourceExhausted => OutcomeCode::ResourceExhausted,
            Code::FailedPrecondition => OutcomeCode::FailedPrecondition,
            Code::Aborted => OutcomeCode::Aborted,
            Code::OutOfRange => OutcomeCode::OutOfRange,
            Code::Unimplemented => OutcomeCode::Unimplemented,
            Code::Internal => OutcomeCode::Internal,
            Code::Unavailable => OutcomeCode::Unavailable,
            Code::DataLoss => OutcomeCode::DataLoss,
            Code::Unauthenticated => OutcomeCode::Unauthenticated,
            #[allow(unreachable_patterns)]
            _ => OutcomeCode::Unknown,
        }
    }
}

impl From<OutcomeCode> for Code {
    fn from(code: OutcomeCode) -> Self {
        match code {
            OutcomeCode::Ok => Code::Ok,
            OutcomeCode::Canceled => Code::Cancelled,
            OutcomeCode::Unknown => Code::Unknown,
            OutcomeCode::InvalidArgument => Code::InvalidArgument,
            OutcomeCode::DeadlineExceeded => Code::DeadlineExceeded,
            OutcomeCode::NotFound => Code::NotFound,
            OutcomeCode::AlreadyExists => Code::AlreadyExists,
            OutcomeCode::PermissionDenied => Code::PermissionDenied,
            OutcomeCode::ResourceExhausted => Code::ResourceExhausted,
            OutcomeCode::FailedPrecondition => Code::FailedPrecondition,
            OutcomeCode::Aborted => Code::Aborted,
            OutcomeCode::OutOfRange => Code::OutOfRange,
            OutcomeCode::Unimplemented => Code::Unimplemented,
            OutcomeCode::Internal => Code::Internal,
            OutcomeCode::Unavailable => Code::Unavailable,
            OutcomeCode::DataLoss => Code::DataLoss,
            OutcomeCode::Unauthenticated => Code::Unauthenticated,
        }
    }
}

impl From<Status> for RpcError {
    fn from(status: Status) -> Self {
        RpcError::Status {
            code: status.code().into(),
            message: status.message().to_string(),
        }
    }
}

impl From<RpcError> for Status {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Status { code, message } => Status::new(code.into(), message),
            RpcError::Other(err) => match err.downcast::<Status>() {
                Ok(status) => *status,
                Err(err) => Status::unknown(err.to_string()),
            },
        }
    }
}
