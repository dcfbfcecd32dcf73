//! Flare RPC Logging
//!
//! Protocol-level logging interceptor for unary, server-streaming, client-streaming and
//! bidirectional calls, together with the in-process server/client plumbing used to drive it.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod spec;
pub mod stream;
pub mod telemetry;

// 拦截器与调用通道
pub mod client;
pub mod interceptor;
pub mod server;
pub mod transport;

// 示例服务
pub mod service;

// Re-exports
pub use config::{Config, InterceptorConfig, LogFormat, LoggingConfig};
pub use context::CallContext;
pub use error::{
    ConfigError, OutcomeCode, ReceiveOutcome, Result, RpcError, classify, classify_error,
    classify_receive,
};
pub use message::{AnyMessage, Message, downcast};
pub use spec::{CallSpec, StreamType};
pub use stream::{StreamingClientConn, StreamingHandlerConn};
pub use telemetry::{EventRecorder, LogSink, RecordedEvent, init_tracing};

pub use client::{Client, ClientBuilder, ClientConfig};
pub use interceptor::{
    Interceptor, InterceptorChain, LoggingInterceptor, PayloadPolicy, StreamingClientFunc,
    StreamingHandlerFunc, UnaryFunc, UnaryRequest, UnaryResponse,
};
pub use server::{Server, ServerBuilder, ServerConfig};
