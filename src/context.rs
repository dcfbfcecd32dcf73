//! 调用上下文
//!
//! 由调用方提供、随调用透传的上下文。拦截器只读取其中的关联 ID 用于日志，
//! 从不修改取消信号或截止时间。

use crate::error::RpcError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tonic::metadata::MetadataMap;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// 调用上下文
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: Arc<str>,
    trace_id: Option<Arc<str>>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// 创建新的上下文，自动生成请求 ID
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string().into(),
            trace_id: None,
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    /// 从请求元数据构建上下文
    ///
    /// 读取 `x-request-id` 与 `x-trace-id`，缺失时生成新的请求 ID。
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        let mut ctx = Self::new();
        if let Some(request_id) = header_value(metadata, REQUEST_ID_HEADER) {
            ctx.request_id = request_id.into();
        }
        ctx.trace_id = header_value(metadata, TRACE_ID_HEADER).map(Into::into);
        ctx
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into().into();
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into().into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// 取消该上下文上的所有操作
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// 等待取消信号
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// 将关联 ID 写回元数据，用于向下游透传
    pub fn to_metadata(&self) -> Result<MetadataMap, RpcError> {
        let mut metadata = MetadataMap::new();
        metadata.insert(
            REQUEST_ID_HEADER,
            self.request_id
                .parse()
                .map_err(|_| RpcError::internal("Invalid request_id"))?,
        );
        if let Some(trace_id) = &self.trace_id {
            metadata.insert(
                TRACE_ID_HEADER,
                trace_id
                    .parse()
                    .map_err(|_| RpcError::internal("Invalid trace_id"))?,
            );
        }
        Ok(metadata)
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

fn header_value(metadata: &MetadataMap, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_request_id() {
        let ctx = CallContext::new();
        assert!(!ctx.request_id().is_empty());
        assert!(ctx.trace_id().is_none());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn metadata_round_trip() {
        let ctx = CallContext::new()
            .with_request_id("req-1")
            .with_trace_id("trace-9");
        let metadata = ctx.to_metadata().unwrap();

        let restored = CallContext::from_metadata(&metadata);
        assert_eq!(restored.request_id(), "req-1");
        assert_eq!(restored.trace_id(), Some("trace-9"));
    }

    #[test]
    fn clones_share_cancellation() {
        let ctx = CallContext::new();
        let clone = ctx.clone();
        ctx.cancel();
        assert!(clone.is_cancelled());
    }
}
