//! 进程内流式传输
//!
//! 两个方向各用一条有界 mpsc 通道：
//! - 请求方向：客户端 `send` 写入，处理器 `receive` 读出；`close_request` 丢弃发送端，
//!   处理器随后读到流结束标记。
//! - 响应方向：处理器 `send` 写入，客户端 `receive` 读出；处理器返回错误时，
//!   该错误作为客户端最后一次 `receive` 的结果送达。
//!
//! 所有阻塞操作都会响应上下文的取消信号，返回 `Canceled`。

use crate::context::CallContext;
use crate::error::RpcError;
use crate::message::AnyMessage;
use crate::spec::CallSpec;
use crate::stream::{StreamingClientConn, StreamingHandlerConn};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;

/// 每个方向上缓冲的消息数
pub const DEFAULT_STREAM_BUFFER: usize = 16;

type ResponseItem = Result<AnyMessage, RpcError>;

/// 创建一对相连的进程内连接
pub fn pipe(spec: CallSpec, ctx: &CallContext) -> (MemoryClientConn, MemoryHandlerConn) {
    pipe_with_buffer(spec, ctx, DEFAULT_STREAM_BUFFER)
}

pub fn pipe_with_buffer(
    spec: CallSpec,
    ctx: &CallContext,
    buffer: usize,
) -> (MemoryClientConn, MemoryHandlerConn) {
    let (request_tx, request_rx) = mpsc::channel(buffer.max(1));
    let (response_tx, response_rx) = mpsc::channel(buffer.max(1));
    let header = ctx.to_metadata().unwrap_or_default();

    let client = MemoryClientConn {
        spec: CallSpec {
            is_client: true,
            ..spec.clone()
        },
        cancellation: ctx.cancellation_token().clone(),
        request_tx: Mutex::new(Some(request_tx)),
        response_rx: Mutex::new(Some(response_rx)),
        response_closed: AtomicBool::new(false),
        response_close: CancellationToken::new(),
    };
    let handler = MemoryHandlerConn {
        spec: CallSpec {
            is_client: false,
            ..spec
        },
        header,
        cancellation: ctx.cancellation_token().clone(),
        request_rx: Mutex::new(request_rx),
        response_tx: Mutex::new(Some(response_tx)),
    };
    (client, handler)
}

fn canceled() -> RpcError {
    RpcError::canceled("call canceled")
}

/// 客户端一侧的进程内连接
///
/// `close_response` 可以与另一个任务中挂起的 `receive` 并发调用：
/// 关闭信号唤醒挂起的接收，随后丢弃接收端。
pub struct MemoryClientConn {
    spec: CallSpec,
    cancellation: CancellationToken,
    request_tx: Mutex<Option<mpsc::Sender<AnyMessage>>>,
    response_rx: Mutex<Option<mpsc::Receiver<ResponseItem>>>,
    response_closed: AtomicBool,
    response_close: CancellationToken,
}

#[async_trait]
impl StreamingClientConn for MemoryClientConn {
    fn spec(&self) -> &CallSpec {
        &self.spec
    }

    async fn send(&self, message: AnyMessage) -> Result<(), RpcError> {
        let tx = self
            .request_tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| RpcError::failed_precondition("send after close_request"))?;

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(canceled()),
            sent = tx.send(message) => {
                sent.map_err(|_| RpcError::unavailable("handler is no longer receiving"))
            }
        }
    }

    async fn close_request(&self) -> Result<(), RpcError> {
        match self.request_tx.lock().await.take() {
            Some(_) => Ok(()),
            None => Err(RpcError::failed_precondition("request stream already closed")),
        }
    }

    async fn receive(&self) -> Result<Option<AnyMessage>, RpcError> {
        if self.response_closed.load(Ordering::Acquire) {
            return Err(receive_after_close());
        }
        let mut guard = self.response_rx.lock().await;
        let rx = guard.as_mut().ok_or_else(receive_after_close)?;

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(canceled()),
            _ = self.response_close.cancelled() => {
                Err(RpcError::canceled("response stream closed"))
            }
            item = rx.recv() => match item {
                Some(Ok(message)) => Ok(Some(message)),
                Some(Err(err)) => Err(err),
                None => Ok(None),
            },
        }
    }

    async fn close_response(&self) -> Result<(), RpcError> {
        if self.response_closed.swap(true, Ordering::AcqRel) {
            return Err(RpcError::failed_precondition("response stream already closed"));
        }
        self.response_close.cancel();
        self.response_rx.lock().await.take();
        Ok(())
    }
}

fn receive_after_close() -> RpcError {
    RpcError::failed_precondition("receive after close_response")
}

impl fmt::Debug for MemoryClientConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryClientConn")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// 处理器一侧的进程内连接
pub struct MemoryHandlerConn {
    spec: CallSpec,
    header: MetadataMap,
    cancellation: CancellationToken,
    request_rx: Mutex<mpsc::Receiver<AnyMessage>>,
    response_tx: Mutex<Option<mpsc::Sender<ResponseItem>>>,
}

impl MemoryHandlerConn {
    /// 处理器返回后调用：关闭响应方向，错误作为最后一项送达客户端
    pub async fn finish(&self, result: Result<(), RpcError>) {
        let Some(tx) = self.response_tx.lock().await.take() else {
            return;
        };
        if let Err(err) = result {
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {}
                _ = tx.send(Err(err)) => {}
            }
        }
    }
}

#[async_trait]
impl StreamingHandlerConn for MemoryHandlerConn {
    fn spec(&self) -> &CallSpec {
        &self.spec
    }

    fn request_header(&self) -> &MetadataMap {
        &self.header
    }

    async fn receive(&self) -> Result<Option<AnyMessage>, RpcError> {
        let mut rx = self.request_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(canceled()),
            message = rx.recv() => Ok(message),
        }
    }

    async fn send(&self, message: AnyMessage) -> Result<(), RpcError> {
        let tx = self
            .response_tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| RpcError::failed_precondition("send after handler finished"))?;

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(canceled()),
            sent = tx.send(Ok(message)) => {
                sent.map_err(|_| RpcError::canceled("client closed the response stream"))
            }
        }
    }
}

impl fmt::Debug for MemoryHandlerConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHandlerConn")
            .field("spec", &self.spec)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
