use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{Dispatch, Level, Subscriber};

/// 日志输出端
///
/// 默认写入进程级的全局 subscriber；也可以注入一个独立的 [`Dispatch`]，
/// 此时每次输出都只作用于该 subscriber，不触碰全局状态。
///
/// 输出是尽力而为的：subscriber 内部的 panic 会被吞掉，不影响被拦截的调用。
#[derive(Clone, Default)]
pub struct LogSink {
    dispatch: Option<Dispatch>,
}

impl LogSink {
    /// 写入全局默认 subscriber
    pub fn global() -> Self {
        Self { dispatch: None }
    }

    pub fn with_dispatch(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    pub fn from_subscriber<S>(subscriber: S) -> Self
    where
        S: Subscriber + Send + Sync + 'static,
    {
        Self::with_dispatch(Dispatch::new(subscriber))
    }

    /// 在该输出端上执行一次日志输出
    pub fn emit<F>(&self, f: F)
    where
        F: FnOnce(),
    {
        let _ = catch_unwind(AssertUnwindSafe(|| self.scoped(f)));
    }

    /// DEBUG 级别是否会被记录（决定是否生成载荷摘要）
    pub fn verbose_enabled(&self) -> bool {
        catch_unwind(AssertUnwindSafe(|| {
            self.scoped(|| tracing::enabled!(Level::DEBUG))
        }))
        .unwrap_or(false)
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("scoped", &self.dispatch.is_some())
            .finish()
    }
}
