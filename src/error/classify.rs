//! 状态分类器
//!
//! 将任意调用结果归类为 [`OutcomeCode`]，并区分流的正常结束与失败。
//! 在一元调用结束、流结束以及每一次消息收发失败时调用。

use super::{OutcomeCode, RpcError};
use std::error::Error as StdError;

/// 对调用结果进行分类，`None` 表示成功
pub fn classify(err: Option<&RpcError>) -> OutcomeCode {
    match err {
        None => OutcomeCode::Ok,
        Some(err) => classify_error(err),
    }
}

/// 对错误进行分类
///
/// 已携带状态码的错误保留原状态码；其它错误沿 `source()` 链查找可识别的状态，
/// 找不到时归类为 [`OutcomeCode::Unknown`]。
pub fn classify_error(err: &RpcError) -> OutcomeCode {
    match err {
        RpcError::Status { code, .. } => *code,
        RpcError::Other(inner) => {
            let mut current: Option<&(dyn StdError + 'static)> = Some(inner.as_ref());
            while let Some(err) = current {
                if let Some(code) = known_status(err) {
                    return code;
                }
                current = err.source();
            }
            OutcomeCode::Unknown
        }
    }
}

fn known_status(err: &(dyn StdError + 'static)) -> Option<OutcomeCode> {
    if let Some(status) = err.downcast_ref::<tonic::Status>() {
        return Some(status.code().into());
    }
    if let Some(rpc) = err.downcast_ref::<RpcError>() {
        return rpc.code();
    }
    if err.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
        return Some(OutcomeCode::DeadlineExceeded);
    }
    if let Some(io) = err.downcast_ref::<std::io::Error>() {
        if io.kind() == std::io::ErrorKind::TimedOut {
            return Some(OutcomeCode::DeadlineExceeded);
        }
    }
    None
}

/// 单次接收的结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// 收到一条消息
    Message,
    /// 对端已结束发送，属于正常终止
    EndOfStream,
    /// 接收失败
    Failed(OutcomeCode),
}

impl ReceiveOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ReceiveOutcome::Failed(_))
    }
}

/// 对一次 `receive` 的返回值进行分类
///
/// `Ok(None)` 是流结束标记，不是错误。
pub fn classify_receive<T>(result: &Result<Option<T>, RpcError>) -> ReceiveOutcome {
    match result {
        Ok(Some(_)) => ReceiveOutcome::Message,
        Ok(None) => ReceiveOutcome::EndOfStream,
        Err(err) => ReceiveOutcome::Failed(classify_error(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("wrapped: {source}")]
    struct Wrapped {
        #[source]
        source: tonic::Status,
    }

    #[test]
    fn absent_error_is_ok() {
        assert_eq!(classify(None), OutcomeCode::Ok);
    }

    #[test]
    fn status_code_is_preserved() {
        let err = RpcError::not_found("missing");
        assert_eq!(classify(Some(&err)), OutcomeCode::NotFound);
    }

    #[test]
    fn nested_tonic_status_is_recognised() {
        let err = RpcError::from_error(Wrapped {
            source: tonic::Status::permission_denied("nope"),
        });
        assert_eq!(classify_error(&err), OutcomeCode::PermissionDenied);
    }

    #[test]
    fn io_timeout_maps_to_deadline() {
        let err = RpcError::from_error(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(classify_error(&err), OutcomeCode::DeadlineExceeded);
    }

    #[test]
    fn unrecognised_errors_are_unknown() {
        let err = RpcError::from_error(std::io::Error::other("disk on fire"));
        assert_eq!(classify_error(&err), OutcomeCode::Unknown);
    }

    #[test]
    fn end_of_stream_is_not_a_failure() {
        let eos: Result<Option<u8>, RpcError> = Ok(None);
        assert_eq!(classify_receive(&eos), ReceiveOutcome::EndOfStream);
        assert!(!classify_receive(&eos).is_failure());

        let msg: Result<Option<u8>, RpcError> = Ok(Some(1));
        assert_eq!(classify_receive(&msg), ReceiveOutcome::Message);

        let failed: Result<Option<u8>, RpcError> = Err(RpcError::canceled("gone"));
        assert_eq!(
            classify_receive(&failed),
            ReceiveOutcome::Failed(OutcomeCode::Canceled)
        );
    }
}
