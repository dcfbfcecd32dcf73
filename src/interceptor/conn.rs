//! 装饰连接
//!
//! 持有底层连接的 `Arc` 并实现完整的连接 trait：收发（以及客户端的半关闭）
//! 在委托前后写日志，其余方法直接转发。装饰连接本身没有可变状态，
//! 发送与接收可以从不同任务并发调用。

use super::event::{CallLogger, Phase};
use crate::error::{ReceiveOutcome, RpcError, classify_error, classify_receive};
use crate::message::AnyMessage;
use crate::spec::CallSpec;
use crate::stream::{StreamingClientConn, StreamingHandlerConn};
use async_trait::async_trait;
use std::sync::Arc;
use tonic::metadata::MetadataMap;

/// 逐条消息的收发钩子，服务端和客户端装饰连接共用
#[derive(Debug, Clone)]
pub(crate) struct MessageHooks {
    logger: CallLogger,
}

impl MessageHooks {
    pub(crate) fn new(logger: CallLogger) -> Self {
        Self { logger }
    }

    /// 发送前渲染载荷摘要：消息会被移交给底层连接
    pub(crate) fn before_send(&self, message: &AnyMessage) -> Option<String> {
        self.logger.summarize(message.as_ref())
    }

    pub(crate) fn after_send(&self, payload: Option<String>, result: &Result<(), RpcError>) {
        match result {
            Ok(()) => self.logger.message_sent(payload),
            Err(err) => self
                .logger
                .operation_failed(Phase::Send, classify_error(err), err),
        }
    }

    /// 流结束标记静默返回，不记录
    pub(crate) fn after_receive(&self, result: &Result<Option<AnyMessage>, RpcError>) {
        match (classify_receive(result), result) {
            (ReceiveOutcome::Message, Ok(Some(message))) => {
                self.logger.message_received(message.as_ref())
            }
            (ReceiveOutcome::Failed(code), Err(err)) => {
                self.logger.operation_failed(Phase::Receive, code, err)
            }
            _ => {}
        }
    }

    pub(crate) fn after_close(&self, phase: Phase, result: &Result<(), RpcError>) {
        match result {
            Ok(()) => self.logger.half_closed(phase),
            Err(err) => self.logger.operation_failed(phase, classify_error(err), err),
        }
    }
}

/// 服务端装饰连接
pub struct LoggingHandlerConn {
    inner: Arc<dyn StreamingHandlerConn>,
    hooks: MessageHooks,
}

impl LoggingHandlerConn {
    pub(crate) fn new(inner: Arc<dyn StreamingHandlerConn>, logger: CallLogger) -> Self {
        Self {
            inner,
            hooks: MessageHooks::new(logger),
        }
    }
}

#[async_trait]
impl StreamingHandlerConn for LoggingHandlerConn {
    fn spec(&self) -> &CallSpec {
        self.inner.spec()
    }

    fn request_header(&self) -> &MetadataMap {
        self.inner.request_header()
    }

    async fn receive(&self) -> Result<Option<AnyMessage>, RpcError> {
        let result = self.inner.receive().await;
        self.hooks.after_receive(&result);
        result
    }

    async fn send(&self, message: AnyMessage) -> Result<(), RpcError> {
        let payload = self.hooks.before_send(&message);
        let result = self.inner.send(message).await;
        self.hooks.after_send(payload, &result);
        result
    }
}

/// 客户端装饰连接
pub struct LoggingClientConn {
    inner: Arc<dyn StreamingClientConn>,
    hooks: MessageHooks,
}

impl LoggingClientConn {
    pub(crate) fn new(inner: Arc<dyn StreamingClientConn>, logger: CallLogger) -> Self {
        Self {
            inner,
            hooks: MessageHooks::new(logger),
        }
    }
}

#[async_trait]
impl StreamingClientConn for LoggingClientConn {
    fn spec(&self) -> &CallSpec {
        self.inner.spec()
    }

    async fn send(&self, message: AnyMessage) -> Result<(), RpcError> {
        let payload = self.hooks.before_send(&message);
        let result = self.inner.send(message).await;
        self.hooks.after_send(payload, &result);
        result
    }

    async fn close_request(&self) -> Result<(), RpcError> {
        let result = self.inner.close_request().await;
        self.hooks.after_close(Phase::CloseRequest, &result);
        result
    }

    async fn receive(&self) -> Result<Option<AnyMessage>, RpcError> {
        let result = self.inner.receive().await;
        self.hooks.after_receive(&result);
        result
    }

    async fn close_response(&self) -> Result<(), RpcError> {
        let result = self.inner.close_response().await;
        self.hooks.after_close(Phase::CloseResponse, &result);
        result
    }
}
