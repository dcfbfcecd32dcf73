//! 客户端模块
//!
//! 提供客户端构建器和配置。客户端持有自己的拦截链，与服务端的拦截链互不影响。

use crate::context::CallContext;
use crate::error::{OutcomeCode, Result, RpcError};
use crate::interceptor::{
    Interceptor, InterceptorChain, StreamingClientFunc, UnaryFunc, UnaryRequest, UnaryResponse,
    unary_fn,
};
use crate::message::{AnyMessage, Message};
use crate::server::Server;
use crate::spec::CallSpec;
use crate::stream::StreamingClientConn;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 客户端配置
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// 上下文没有截止时间时使用的默认超时
    pub timeout: Option<Duration>,
}

/// 客户端构建器
pub struct ClientBuilder {
    server: Arc<Server>,
    config: ClientConfig,
    chain: InterceptorChain,
}

impl ClientBuilder {
    pub fn new(server: Arc<Server>) -> Self {
        Self {
            server,
            config: ClientConfig::default(),
            chain: InterceptorChain::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// 追加拦截器，先追加的位于外层
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.chain.push(interceptor);
        self
    }

    pub fn build(self) -> Client {
        let server = self.server.clone();
        let unary = unary_fn(move |ctx, req| {
            let server = server.clone();
            async move { server.call_unary(ctx, req).await }
        });

        let server = self.server.clone();
        let streaming: StreamingClientFunc = Arc::new(move |ctx: CallContext, spec: CallSpec| {
            match server.open_stream(ctx, spec.clone()) {
                Ok((conn, _task)) => Arc::new(conn) as Arc<dyn StreamingClientConn>,
                Err(err) => {
                    debug!(procedure = %spec.procedure, error = %err, "Failed to open stream");
                    Arc::new(FailedClientConn::new(spec, err))
                }
            }
        });

        Client {
            config: self.config,
            unary: self.chain.wrap_unary(unary),
            streaming: self.chain.wrap_streaming_client(streaming),
        }
    }
}

/// 进程内客户端
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    unary: UnaryFunc,
    streaming: StreamingClientFunc,
}

impl Client {
    pub fn builder(server: Arc<Server>) -> ClientBuilder {
        ClientBuilder::new(server)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 发起一元调用
    ///
    /// 上下文中的请求 ID 与追踪 ID 写入请求头。
    pub async fn call_unary(
        &self,
        ctx: CallContext,
        procedure: impl Into<String>,
        message: impl Message,
    ) -> Result<UnaryResponse> {
        let ctx = self.apply_timeout(ctx);
        let header = ctx.to_metadata()?;
        let req = UnaryRequest::new(CallSpec::unary(procedure).for_client(), message)
            .with_header(header);
        (self.unary)(ctx, req).await
    }

    /// 打开流式调用，返回（经过拦截链装饰的）客户端连接
    pub fn stream(&self, ctx: CallContext, spec: CallSpec) -> Arc<dyn StreamingClientConn> {
        let ctx = self.apply_timeout(ctx);
        (self.streaming)(ctx, spec.for_client())
    }

    fn apply_timeout(&self, ctx: CallContext) -> CallContext {
        match (ctx.deadline(), self.config.timeout) {
            (None, Some(timeout)) => ctx.with_timeout(timeout),
            _ => ctx,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// 打开失败的流：收发返回打开时的错误，半关闭总是成功
struct FailedClientConn {
    spec: CallSpec,
    code: OutcomeCode,
    message: String,
}

impl FailedClientConn {
    fn new(spec: CallSpec, err: RpcError) -> Self {
        Self {
            spec,
            code: err.code().unwrap_or(OutcomeCode::Unknown),
            message: err.message(),
        }
    }

    fn error(&self) -> RpcError {
        RpcError::new(self.code, self.message.clone())
    }
}

#[async_trait]
impl StreamingClientConn for FailedClientConn {
    fn spec(&self) -> &CallSpec {
        &self.spec
    }

    async fn send(&self, _message: AnyMessage) -> Result<()> {
        Err(self.error())
    }

    async fn close_request(&self) -> Result<()> {
        Ok(())
    }

    async fn receive(&self) -> Result<Option<AnyMessage>> {
        Err(self.error())
    }

    async fn close_response(&self) -> Result<()> {
        Ok(())
    }
}
