use serde::{Deserialize, Serialize};
use std::fmt;

/// 调用形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Unary,
    /// 客户端流：多请求，单响应
    Client,
    /// 服务端流：单请求，多响应
    Server,
    /// 双向流
    Bidi,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Unary => "unary",
            StreamType::Client => "client_stream",
            StreamType::Server => "server_stream",
            StreamType::Bidi => "bidi_stream",
        }
    }

    pub fn is_streaming(&self) -> bool {
        !matches!(self, StreamType::Unary)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 调用描述：被调用的过程名、调用形态以及发起方
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSpec {
    pub procedure: String,
    pub stream_type: StreamType,
    /// 是否由客户端一侧的拦截链观察
    #[serde(default)]
    pub is_client: bool,
}

impl CallSpec {
    pub fn new(procedure: impl Into<String>, stream_type: StreamType) -> Self {
        Self {
            procedure: procedure.into(),
            stream_type,
            is_client: false,
        }
    }

    /// 标记为客户端一侧的调用描述
    pub fn for_client(mut self) -> Self {
        self.is_client = true;
        self
    }

    pub fn unary(procedure: impl Into<String>) -> Self {
        Self::new(procedure, StreamType::Unary)
    }

    pub fn client_stream(procedure: impl Into<String>) -> Self {
        Self::new(procedure, StreamType::Client)
    }

    pub fn server_stream(procedure: impl Into<String>) -> Self {
        Self::new(procedure, StreamType::Server)
    }

    pub fn bidi_stream(procedure: impl Into<String>) -> Self {
        Self::new(procedure, StreamType::Bidi)
    }
}
