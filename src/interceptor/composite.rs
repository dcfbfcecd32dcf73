use std::sync::Arc;

use super::{
    Interceptor, LoggingInterceptor, StreamingClientFunc, StreamingHandlerFunc, UnaryFunc,
};

/// 组合拦截器
///
/// 按注册顺序组合：先注册的拦截器位于最外层，最先看到请求、最后看到结果。
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.push(interceptor);
        self
    }

    pub fn with_logging(self, logging: LoggingInterceptor) -> Self {
        self.with(logging)
    }

    pub fn push<I: Interceptor + 'static>(&mut self, interceptor: I) {
        self.interceptors.push(Arc::new(interceptor));
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

impl Interceptor for InterceptorChain {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        self.interceptors
            .iter()
            .rev()
            .fold(next, |next, interceptor| interceptor.wrap_unary(next))
    }

    fn wrap_streaming_handler(&self, next: StreamingHandlerFunc) -> StreamingHandlerFunc {
        self.interceptors
            .iter()
            .rev()
            .fold(next, |next, interceptor| interceptor.wrap_streaming_handler(next))
    }

    fn wrap_streaming_client(&self, next: StreamingClientFunc) -> StreamingClientFunc {
        self.interceptors
            .iter()
            .rev()
            .fold(next, |next, interceptor| interceptor.wrap_streaming_client(next))
    }
}
