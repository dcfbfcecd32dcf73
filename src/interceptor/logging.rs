use std::sync::Arc;

use super::conn::{LoggingClientConn, LoggingHandlerConn};
use super::event::{CallGuard, CallLogger, Side};
use super::payload::PayloadPolicy;
use super::{Interceptor, StreamingClientFunc, StreamingHandlerFunc, UnaryFunc, UnaryRequest};
use crate::config::InterceptorConfig;
use crate::context::CallContext;
use crate::spec::CallSpec;
use crate::stream::{StreamingClientConn, StreamingHandlerConn};
use crate::telemetry::LogSink;
use futures::FutureExt;

/// 日志拦截器
///
/// 记录每次调用的开始与结束、每条流消息的收发以及客户端的半关闭，
/// 测量耗时并对结果分类。只观察，不改变调用结果、载荷或错误。
///
/// 构造后不可变，可在所有并发调用间共享。
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor {
    sink: LogSink,
    payloads: PayloadPolicy,
}

impl LoggingInterceptor {
    /// 写入全局 subscriber，使用默认载荷策略
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &InterceptorConfig) -> Self {
        Self::new().with_payload_policy(config.payload_policy())
    }

    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_payload_policy(mut self, payloads: PayloadPolicy) -> Self {
        self.payloads = payloads;
        self
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn payload_policy(&self) -> PayloadPolicy {
        self.payloads
    }

    fn call_logger(&self, spec: &CallSpec, ctx: &CallContext, side: Side) -> CallLogger {
        CallLogger::new(self.sink.clone(), self.payloads, spec, ctx, side)
    }
}

impl Interceptor for LoggingInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let this = self.clone();
        Arc::new(move |ctx: CallContext, req: UnaryRequest| {
            let side = if req.spec().is_client {
                Side::Client
            } else {
                Side::Handler
            };
            let logger = this.call_logger(req.spec(), &ctx, side);
            let next = next.clone();
            async move {
                let guard = CallGuard::begin(logger);
                guard.logger().unary_start(req.message());

                let result = next(ctx, req).await;

                guard.finish_unary(&result);
                result
            }
            .boxed()
        })
    }

    fn wrap_streaming_handler(&self, next: StreamingHandlerFunc) -> StreamingHandlerFunc {
        let this = self.clone();
        Arc::new(move |ctx: CallContext, conn: Arc<dyn StreamingHandlerConn>| {
            let logger = this.call_logger(conn.spec(), &ctx, Side::Handler);
            let next = next.clone();
            async move {
                let guard = CallGuard::begin(logger.clone());
                guard.logger().stream_start();

                let wrapped: Arc<dyn StreamingHandlerConn> =
                    Arc::new(LoggingHandlerConn::new(conn, logger));
                let result = next(ctx, wrapped).await;

                guard.finish_stream(result.as_ref().err());
                result
            }
            .boxed()
        })
    }

    fn wrap_streaming_client(&self, next: StreamingClientFunc) -> StreamingClientFunc {
        let this = self.clone();
        Arc::new(move |ctx: CallContext, spec: CallSpec| {
            let logger = this.call_logger(&spec, &ctx, Side::Client);
            logger.stream_start();

            let conn = next(ctx, spec);
            Arc::new(LoggingClientConn::new(conn, logger)) as Arc<dyn StreamingClientConn>
        })
    }
}
