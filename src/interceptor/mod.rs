//! RPC 拦截器模块
//!
//! 拦截器在协议层包装三类调用入口：一元调用、服务端流式处理器和客户端流式连接工厂。
//! 包装结果与被包装者签名相同，因此可以任意层叠。

pub mod composite;
pub mod conn;
pub mod event;
pub mod logging;
pub mod payload;

pub use composite::InterceptorChain;
pub use conn::{LoggingClientConn, LoggingHandlerConn};
pub use event::{Phase, Side};
pub use logging::LoggingInterceptor;
pub use payload::{DEFAULT_PAYLOAD_LIMIT, PayloadPolicy};

use crate::context::CallContext;
use crate::error::RpcError;
use crate::message::{AnyMessage, Message, boxed};
use crate::spec::CallSpec;
use crate::stream::{StreamingClientConn, StreamingHandlerConn};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tonic::metadata::MetadataMap;

/// 一元请求
#[derive(Debug)]
pub struct UnaryRequest {
    spec: CallSpec,
    header: MetadataMap,
    message: AnyMessage,
}

impl UnaryRequest {
    pub fn new(spec: CallSpec, message: impl Message) -> Self {
        Self {
            spec,
            header: MetadataMap::new(),
            message: boxed(message),
        }
    }

    /// 使用已经类型擦除的消息构造请求
    pub fn from_boxed(spec: CallSpec, message: AnyMessage) -> Self {
        Self {
            spec,
            header: MetadataMap::new(),
            message,
        }
    }

    pub fn with_header(mut self, header: MetadataMap) -> Self {
        self.header = header;
        self
    }

    pub fn spec(&self) -> &CallSpec {
        &self.spec
    }

    pub fn header(&self) -> &MetadataMap {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut MetadataMap {
        &mut self.header
    }

    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    pub fn into_message(self) -> AnyMessage {
        self.message
    }

    pub fn into_parts(self) -> (CallSpec, MetadataMap, AnyMessage) {
        (self.spec, self.header, self.message)
    }
}

/// 一元响应
#[derive(Debug)]
pub struct UnaryResponse {
    header: MetadataMap,
    message: AnyMessage,
}

impl UnaryResponse {
    pub fn new(message: impl Message) -> Self {
        Self::from_boxed(boxed(message))
    }

    pub fn from_boxed(message: AnyMessage) -> Self {
        Self {
            header: MetadataMap::new(),
            message,
        }
    }

    pub fn with_header(mut self, header: MetadataMap) -> Self {
        self.header = header;
        self
    }

    pub fn header(&self) -> &MetadataMap {
        &self.header
    }

    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    pub fn into_message(self) -> AnyMessage {
        self.message
    }
}

/// 一元调用入口
pub type UnaryFunc = Arc<
    dyn Fn(CallContext, UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, RpcError>>
        + Send
        + Sync,
>;

/// 服务端流式处理器入口
pub type StreamingHandlerFunc = Arc<
    dyn Fn(CallContext, Arc<dyn StreamingHandlerConn>) -> BoxFuture<'static, Result<(), RpcError>>
        + Send
        + Sync,
>;

/// 客户端流式连接工厂
///
/// 同步返回连接，之后的收发与半关闭都在连接上进行。
pub type StreamingClientFunc =
    Arc<dyn Fn(CallContext, CallSpec) -> Arc<dyn StreamingClientConn> + Send + Sync>;

/// 从异步闭包构造 [`UnaryFunc`]
pub fn unary_fn<F, Fut>(f: F) -> UnaryFunc
where
    F: Fn(CallContext, UnaryRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<UnaryResponse, RpcError>> + Send + 'static,
{
    Arc::new(move |ctx, req| f(ctx, req).boxed())
}

/// 从异步闭包构造 [`StreamingHandlerFunc`]
pub fn streaming_handler_fn<F, Fut>(f: F) -> StreamingHandlerFunc
where
    F: Fn(CallContext, Arc<dyn StreamingHandlerConn>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RpcError>> + Send + 'static,
{
    Arc::new(move |ctx, conn| f(ctx, conn).boxed())
}

/// 从闭包构造 [`StreamingClientFunc`]
pub fn streaming_client_fn<F, C>(f: F) -> StreamingClientFunc
where
    F: Fn(CallContext, CallSpec) -> C + Send + Sync + 'static,
    C: StreamingClientConn + 'static,
{
    Arc::new(move |ctx, spec| Arc::new(f(ctx, spec)) as Arc<dyn StreamingClientConn>)
}

/// 拦截器
///
/// 每个方法接收下一层入口并返回签名相同的包装。默认实现原样返回，
/// 拦截器只需覆盖关心的调用形态。
pub trait Interceptor: Send + Sync {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        next
    }

    fn wrap_streaming_handler(&self, next: StreamingHandlerFunc) -> StreamingHandlerFunc {
        next
    }

    fn wrap_streaming_client(&self, next: StreamingClientFunc) -> StreamingClientFunc {
        next
    }
}

impl<I: Interceptor + ?Sized> Interceptor for Arc<I> {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        (**self).wrap_unary(next)
    }

    fn wrap_streaming_handler(&self, next: StreamingHandlerFunc) -> StreamingHandlerFunc {
        (**self).wrap_streaming_handler(next)
    }

    fn wrap_streaming_client(&self, next: StreamingClientFunc) -> StreamingClientFunc {
        (**self).wrap_streaming_client(next)
    }
}
