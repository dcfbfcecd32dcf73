//! 传输层
//!
//! 目前只提供进程内传输，用于在没有网络的情况下驱动全部四种调用形态。

pub mod memory;

pub use memory::{DEFAULT_STREAM_BUFFER, MemoryClientConn, MemoryHandlerConn, pipe, pipe_with_buffer};
