//! 服务端模块
//!
//! 提供过程路由与服务器构建器。注册的处理器在 `build` 时统一套上拦截链。

use crate::context::CallContext;
use crate::error::{Result, RpcError};
use crate::interceptor::{
    Interceptor, InterceptorChain, StreamingHandlerFunc, UnaryFunc, UnaryRequest, UnaryResponse,
    streaming_handler_fn, unary_fn,
};
use crate::spec::{CallSpec, StreamType};
use crate::stream::StreamingHandlerConn;
use crate::transport::memory::{DEFAULT_STREAM_BUFFER, MemoryClientConn, pipe_with_buffer};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 服务端配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 流式调用每个方向的缓冲消息数
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

/// 服务器构建器
pub struct ServerBuilder {
    config: ServerConfig,
    chain: InterceptorChain,
    unary: HashMap<String, UnaryFunc>,
    streaming: HashMap<String, (StreamType, StreamingHandlerFunc)>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            chain: InterceptorChain::new(),
            unary: HashMap::new(),
            streaming: HashMap::new(),
        }
    }

    pub fn stream_buffer(mut self, buffer: usize) -> Self {
        self.config.stream_buffer = buffer;
        self
    }

    /// 追加拦截器，先追加的位于外层
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.chain.push(interceptor);
        self
    }

    /// 注册一元处理器
    pub fn unary<F, Fut>(mut self, procedure: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallContext, UnaryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<UnaryResponse>> + Send + 'static,
    {
        self.unary.insert(procedure.into(), unary_fn(handler));
        self
    }

    /// 注册流式处理器
    pub fn streaming<F, Fut>(mut self, spec: CallSpec, handler: F) -> Self
    where
        F: Fn(CallContext, Arc<dyn StreamingHandlerConn>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.streaming.insert(
            spec.procedure,
            (spec.stream_type, streaming_handler_fn(handler)),
        );
        self
    }

    pub fn build(self) -> Server {
        let chain = self.chain;
        let unary = self
            .unary
            .into_iter()
            .map(|(procedure, handler)| (procedure, chain.wrap_unary(unary_deadline(handler))))
            .collect();
        let streaming = self
            .streaming
            .into_iter()
            .map(|(procedure, (stream_type, handler))| {
                let handler = chain.wrap_streaming_handler(streaming_deadline(handler));
                (procedure, (stream_type, handler))
            })
            .collect();

        Server {
            config: self.config,
            unary,
            streaming,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 进程内服务器
pub struct Server {
    config: ServerConfig,
    unary: HashMap<String, UnaryFunc>,
    streaming: HashMap<String, (StreamType, StreamingHandlerFunc)>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// 已注册的全部过程名
    pub fn procedures(&self) -> Vec<&str> {
        let mut procedures: Vec<&str> = self
            .unary
            .keys()
            .chain(self.streaming.keys())
            .map(String::as_str)
            .collect();
        procedures.sort_unstable();
        procedures
    }

    /// 分发一元调用
    pub async fn call_unary(&self, ctx: CallContext, req: UnaryRequest) -> Result<UnaryResponse> {
        let handler = self
            .unary
            .get(&req.spec().procedure)
            .cloned()
            .ok_or_else(|| unimplemented_procedure(&req.spec().procedure))?;

        let (spec, header, message) = req.into_parts();
        let req = UnaryRequest::from_boxed(
            CallSpec {
                is_client: false,
                ..spec
            },
            message,
        )
        .with_header(header);

        handler(ctx, req).await
    }

    /// 打开流式调用
    ///
    /// 在后台任务中运行处理器，返回客户端一侧的连接。处理器返回的错误
    /// 作为客户端最后一次 `receive` 的结果送达；处理器 panic 时客户端收到 `Internal`。
    /// 必须在 tokio 运行时中调用。
    pub fn open_stream(
        &self,
        ctx: CallContext,
        spec: CallSpec,
    ) -> Result<(MemoryClientConn, JoinHandle<()>)> {
        let (stream_type, handler) = self
            .streaming
            .get(&spec.procedure)
            .cloned()
            .ok_or_else(|| unimplemented_procedure(&spec.procedure))?;
        if stream_type != spec.stream_type {
            return Err(RpcError::unimplemented(format!(
                "{} is a {} procedure, not {}",
                spec.procedure, stream_type, spec.stream_type
            )));
        }

        let procedure = spec.procedure.clone();
        let (client, handler_conn) = pipe_with_buffer(spec, &ctx, self.config.stream_buffer);
        let handler_conn = Arc::new(handler_conn);

        let task = tokio::spawn(async move {
            let conn: Arc<dyn StreamingHandlerConn> = handler_conn.clone();
            let result = match AssertUnwindSafe(handler(ctx, conn)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    warn!(procedure = %procedure, "Stream handler panicked");
                    Err(RpcError::internal("handler panicked"))
                }
            };
            debug!(procedure = %procedure, ok = result.is_ok(), "Stream handler returned");
            handler_conn.finish(result).await;
        });

        Ok((client, task))
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("procedures", &self.procedures())
            .finish()
    }
}

fn unimplemented_procedure(procedure: &str) -> RpcError {
    RpcError::unimplemented(format!("procedure {} is not registered", procedure))
}

/// 在拦截链内侧施加截止时间，超时以 `DeadlineExceeded` 结果返回给拦截器
fn unary_deadline(handler: UnaryFunc) -> UnaryFunc {
    Arc::new(move |ctx: CallContext, req: UnaryRequest| {
        let deadline = ctx.deadline();
        with_deadline(deadline, handler(ctx, req)).boxed()
    })
}

fn streaming_deadline(handler: StreamingHandlerFunc) -> StreamingHandlerFunc {
    Arc::new(move |ctx: CallContext, conn: Arc<dyn StreamingHandlerConn>| {
        let deadline = ctx.deadline();
        with_deadline(deadline, handler(ctx, conn)).boxed()
    })
}

async fn with_deadline<T>(
    deadline: Option<tokio::time::Instant>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| RpcError::deadline_exceeded("deadline exceeded"))?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutcomeCode;
    use crate::message::downcast;
    use crate::stream::{client_receive_as, send_message};
    use std::time::Duration;

    fn echo_server() -> Server {
        Server::builder()
            .unary("test.Echo/Say", |_ctx, req| async move {
                let text = downcast::<String>(req.into_message())?;
                Ok(UnaryResponse::new(text))
            })
            .streaming(CallSpec::server_stream("test.Echo/Count"), |_ctx, conn| async move {
                for i in 0..3u32 {
                    send_message(conn.as_ref(), i).await?;
                }
                Ok(())
            })
            .unary("test.Echo/Slow", |_ctx, _req| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(UnaryResponse::new(()))
            })
            .build()
    }

    #[tokio::test]
    async fn unary_dispatch() {
        let server = echo_server();
        let req = UnaryRequest::new(CallSpec::unary("test.Echo/Say"), "hi".to_string());
        let resp = server.call_unary(CallContext::new(), req).await.unwrap();
        assert_eq!(resp.message().downcast_ref::<String>().unwrap(), "hi");
    }

    #[tokio::test]
    async fn unknown_procedure_is_unimplemented() {
        let server = echo_server();
        let req = UnaryRequest::new(CallSpec::unary("test.Echo/Missing"), ());
        let err = server.call_unary(CallContext::new(), req).await.unwrap_err();
        assert_eq!(err.code(), Some(OutcomeCode::Unimplemented));

        let err = server
            .open_stream(CallContext::new(), CallSpec::bidi_stream("test.Echo/Count"))
            .unwrap_err();
        assert_eq!(err.code(), Some(OutcomeCode::Unimplemented));
    }

    #[tokio::test]
    async fn deadline_is_enforced() {
        let server = echo_server();
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let req = UnaryRequest::new(CallSpec::unary("test.Echo/Slow"), ());
        let err = server.call_unary(ctx, req).await.unwrap_err();
        assert_eq!(err.code(), Some(OutcomeCode::DeadlineExceeded));
    }

    #[tokio::test]
    async fn server_stream_runs_in_background() {
        let server = echo_server();
        let (client, task) = server
            .open_stream(CallContext::new(), CallSpec::server_stream("test.Echo/Count"))
            .unwrap();

        let mut seen = Vec::new();
        while let Some(n) = client_receive_as::<u32>(&client).await.unwrap() {
            seen.push(n);
        }
        assert_eq!(seen, vec![0, 1, 2]);
        task.await.unwrap();
    }

    #[test]
    fn procedures_are_listed() {
        let server = echo_server();
        assert_eq!(
            server.procedures(),
            vec!["test.Echo/Count", "test.Echo/Say", "test.Echo/Slow"]
        );
    }
}
