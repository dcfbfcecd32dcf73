//! 流式连接抽象
//!
//! 服务端处理器与客户端各自持有一个连接对象。方法均以 `&self` 调用，
//! 双向流中发送与接收可以在不同任务中并发进行。
//!
//! 接收返回 `Ok(None)` 表示对端已结束发送（流结束标记），这不是错误。

use crate::error::RpcError;
use crate::message::{AnyMessage, Message, boxed, downcast};
use crate::spec::CallSpec;
use async_trait::async_trait;
use std::any::Any;
use tonic::metadata::MetadataMap;

/// 服务端流式连接
#[async_trait]
pub trait StreamingHandlerConn: Send + Sync {
    fn spec(&self) -> &CallSpec;

    fn request_header(&self) -> &MetadataMap;

    async fn receive(&self) -> Result<Option<AnyMessage>, RpcError>;

    async fn send(&self, message: AnyMessage) -> Result<(), RpcError>;
}

/// 客户端流式连接
#[async_trait]
pub trait StreamingClientConn: Send + Sync {
    fn spec(&self) -> &CallSpec;

    async fn send(&self, message: AnyMessage) -> Result<(), RpcError>;

    /// 关闭发送方向，对端随后会收到流结束标记
    async fn close_request(&self) -> Result<(), RpcError>;

    async fn receive(&self) -> Result<Option<AnyMessage>, RpcError>;

    /// 关闭接收方向，之后的响应被丢弃
    async fn close_response(&self) -> Result<(), RpcError>;
}

/// 接收一条消息并还原为具体类型
pub async fn receive_as<T: Any>(conn: &dyn StreamingHandlerConn) -> Result<Option<T>, RpcError> {
    match conn.receive().await? {
        Some(message) => downcast::<T>(message).map(Some),
        None => Ok(None),
    }
}

/// 客户端版本的 [`receive_as`]
pub async fn client_receive_as<T: Any>(
    conn: &dyn StreamingClientConn,
) -> Result<Option<T>, RpcError> {
    match conn.receive().await? {
        Some(message) => downcast::<T>(message).map(Some),
        None => Ok(None),
    }
}

/// 把具体类型的消息装箱后发送
pub async fn send_message<M: Message>(
    conn: &dyn StreamingHandlerConn,
    message: M,
) -> Result<(), RpcError> {
    conn.send(boxed(message)).await
}

/// 客户端版本的 [`send_message`]
pub async fn client_send_message<M: Message>(
    conn: &dyn StreamingClientConn,
    message: M,
) -> Result<(), RpcError> {
    conn.send(boxed(message)).await
}
