//! 日志事件
//!
//! 每个事件都带有固定字段：`procedure`、`side`、`phase`、`stream_type`、`request_id`，
//! 以及按阶段附加的 `duration_ms`、`code`、`payload`、`error`。

use super::payload::PayloadPolicy;
use super::UnaryResponse;
use crate::context::CallContext;
use crate::error::{OutcomeCode, RpcError, classify_error};
use crate::message::Message;
use crate::spec::{CallSpec, StreamType};
use crate::telemetry::LogSink;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 事件发生在哪一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Handler,
    Client,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Handler => "handler",
            Side::Client => "client",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Side::Handler => "Handler",
            Side::Client => "Client",
        }
    }
}

/// 调用生命周期中的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    /// 一元调用结束
    End,
    /// 流式调用结束
    Finish,
    Send,
    Receive,
    CloseRequest,
    CloseResponse,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::End => "end",
            Phase::Finish => "finish",
            Phase::Send => "send",
            Phase::Receive => "receive",
            Phase::CloseRequest => "close_request",
            Phase::CloseResponse => "close_response",
        }
    }
}

macro_rules! call_event {
    ($level:ident, $meta:expr, $phase:expr, $($rest:tt)+) => {
        tracing::$level!(
            procedure = $meta.procedure.as_str(),
            side = $meta.side.as_str(),
            phase = $phase.as_str(),
            stream_type = $meta.stream_type.as_str(),
            request_id = $meta.request_id.as_str(),
            $($rest)+
        )
    };
}

#[derive(Debug)]
struct CallMeta {
    procedure: String,
    stream_type: StreamType,
    side: Side,
    request_id: String,
}

/// 单次调用的日志写入器
///
/// 在调用开始时创建，被调用守卫和装饰连接共享。
#[derive(Debug, Clone)]
pub(crate) struct CallLogger {
    sink: LogSink,
    payloads: PayloadPolicy,
    meta: Arc<CallMeta>,
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

impl CallLogger {
    pub(crate) fn new(
        sink: LogSink,
        payloads: PayloadPolicy,
        spec: &CallSpec,
        ctx: &CallContext,
        side: Side,
    ) -> Self {
        Self {
            sink,
            payloads,
            meta: Arc::new(CallMeta {
                procedure: spec.procedure.clone(),
                stream_type: spec.stream_type,
                side,
                request_id: ctx.request_id().to_string(),
            }),
        }
    }

    /// 载荷摘要，仅在 DEBUG 可见时渲染
    pub(crate) fn summarize(&self, message: &dyn Message) -> Option<String> {
        if !self.payloads.is_enabled() || !self.sink.verbose_enabled() {
            return None;
        }
        self.payloads.render(message)
    }

    pub(crate) fn unary_start(&self, request: &dyn Message) {
        let payload = self.summarize(request);
        let meta = &*self.meta;
        self.sink.emit(|| {
            call_event!(info, meta, Phase::Start, payload = payload.as_deref(), "Unary request start")
        });
    }

    pub(crate) fn stream_start(&self) {
        let meta = &*self.meta;
        self.sink.emit(|| {
            call_event!(info, meta, Phase::Start, "{} stream start", meta.side.label())
        });
    }

    pub(crate) fn unary_end(&self, elapsed: Duration, result: &Result<UnaryResponse, RpcError>) {
        let meta = &*self.meta;
        let duration_ms = millis(elapsed);
        match result {
            Ok(response) => {
                let payload = self.summarize(response.message());
                self.sink.emit(|| {
                    call_event!(
                        info,
                        meta,
                        Phase::End,
                        duration_ms,
                        code = OutcomeCode::Ok.as_str(),
                        payload = payload.as_deref(),
                        "Unary request end"
                    )
                });
            }
            Err(err) => {
                let code = classify_error(err);
                self.sink.emit(|| {
                    call_event!(
                        error,
                        meta,
                        Phase::End,
                        duration_ms,
                        code = code.as_str(),
                        error = %err,
                        "Unary request end"
                    )
                });
            }
        }
    }

    pub(crate) fn stream_finish(&self, elapsed: Duration, err: Option<&RpcError>) {
        let meta = &*self.meta;
        let duration_ms = millis(elapsed);
        match err {
            None => self.sink.emit(|| {
                call_event!(
                    info,
                    meta,
                    Phase::Finish,
                    duration_ms,
                    code = OutcomeCode::Ok.as_str(),
                    "{} stream finished",
                    meta.side.label()
                )
            }),
            Some(err) => {
                let code = classify_error(err);
                self.sink.emit(|| {
                    call_event!(
                        error,
                        meta,
                        Phase::Finish,
                        duration_ms,
                        code = code.as_str(),
                        error = %err,
                        "{} stream finished",
                        meta.side.label()
                    )
                });
            }
        }
    }

    /// 调用没有正常返回：被调用者 panic，或 future 在完成前被丢弃
    pub(crate) fn abandoned(&self, elapsed: Duration, panicking: bool) {
        let meta = &*self.meta;
        let duration_ms = millis(elapsed);
        let (code, reason) = if panicking {
            (OutcomeCode::Unknown, "handler panicked")
        } else {
            (OutcomeCode::Canceled, "call dropped before completion")
        };
        let phase = if meta.stream_type.is_streaming() {
            Phase::Finish
        } else {
            Phase::End
        };
        self.sink.emit(|| {
            call_event!(
                error,
                meta,
                phase,
                duration_ms,
                code = code.as_str(),
                error = reason,
                "{} call terminated abnormally",
                meta.side.label()
            )
        });
    }

    pub(crate) fn message_sent(&self, payload: Option<String>) {
        let meta = &*self.meta;
        self.sink.emit(|| {
            call_event!(
                debug,
                meta,
                Phase::Send,
                payload = payload.as_deref(),
                "{} stream send",
                meta.side.label()
            )
        });
    }

    pub(crate) fn message_received(&self, message: &dyn Message) {
        let payload = self.summarize(message);
        let meta = &*self.meta;
        self.sink.emit(|| {
            call_event!(
                debug,
                meta,
                Phase::Receive,
                payload = payload.as_deref(),
                "{} stream receive",
                meta.side.label()
            )
        });
    }

    /// 消息收发或半关闭失败
    pub(crate) fn operation_failed(&self, phase: Phase, code: OutcomeCode, err: &RpcError) {
        let meta = &*self.meta;
        self.sink.emit(|| {
            call_event!(
                error,
                meta,
                phase,
                code = code.as_str(),
                error = %err,
                "{} stream {} error",
                meta.side.label(),
                phase.as_str()
            )
        });
    }

    pub(crate) fn half_closed(&self, phase: Phase) {
        let meta = &*self.meta;
        self.sink.emit(|| {
            call_event!(
                info,
                meta,
                phase,
                "{} stream {}",
                meta.side.label(),
                phase.as_str()
            )
        });
    }
}

/// 调用守卫
///
/// 保证每个已开始的调用恰好输出一次结束事件：正常返回时由 `finish_*` 输出，
/// 否则（panic 或 future 被丢弃）在 `Drop` 中输出。
pub(crate) struct CallGuard {
    logger: CallLogger,
    started: Instant,
    finished: bool,
}

impl CallGuard {
    pub(crate) fn begin(logger: CallLogger) -> Self {
        Self {
            logger,
            started: Instant::now(),
            finished: false,
        }
    }

    pub(crate) fn logger(&self) -> &CallLogger {
        &self.logger
    }

    pub(crate) fn finish_unary(mut self, result: &Result<UnaryResponse, RpcError>) {
        self.finished = true;
        self.logger.unary_end(self.started.elapsed(), result);
    }

    pub(crate) fn finish_stream(mut self, err: Option<&RpcError>) {
        self.finished = true;
        self.logger.stream_finish(self.started.elapsed(), err);
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.logger
                .abandoned(self.started.elapsed(), std::thread::panicking());
        }
    }
}
