//! 集成测试共用的装配代码

#![allow(dead_code)]

use flare_rpc_logging::service::{UserClient, UserService};
use flare_rpc_logging::{
    Client, EventRecorder, LoggingInterceptor, RecordedEvent, Server, ServerBuilder,
};
use std::sync::Arc;

/// 一套完整的用户服务：服务端与客户端各自挂载独立记录器的日志拦截器
pub struct Harness {
    pub server_events: EventRecorder,
    pub client_events: EventRecorder,
    pub users: UserClient,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_server(|builder| builder)
    }

    /// 允许在用户服务之外注册额外的处理器
    pub fn with_server(extra: impl FnOnce(ServerBuilder) -> ServerBuilder) -> Self {
        let server_events = EventRecorder::new();
        let client_events = EventRecorder::new();

        let builder = Server::builder()
            .interceptor(LoggingInterceptor::new().with_sink(server_events.sink()));
        let server = extra(UserService::new().register(builder)).build();

        let client = Client::builder(Arc::new(server))
            .interceptor(LoggingInterceptor::new().with_sink(client_events.sink()))
            .build();

        Self {
            server_events,
            client_events,
            users: UserClient::new(client),
        }
    }

    pub fn client(&self) -> &Client {
        self.users.client()
    }
}

/// 按阶段筛选事件
pub fn phase(events: &[RecordedEvent], phase: &str) -> Vec<RecordedEvent> {
    events
        .iter()
        .filter(|event| event.str_field("phase") == Some(phase))
        .cloned()
        .collect()
}

/// 所有 ERROR 级别的事件
pub fn errors(events: &[RecordedEvent]) -> Vec<RecordedEvent> {
    events
        .iter()
        .filter(|event| event.is_level(tracing::Level::ERROR))
        .cloned()
        .collect()
}

/// 事件的阶段序列，便于断言顺序
pub fn phases(events: &[RecordedEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| event.str_field("phase").map(str::to_string))
        .collect()
}

/// 等待后台处理器任务写完结束事件
pub async fn wait_for(recorder: &EventRecorder, phase_name: &str) -> Vec<RecordedEvent> {
    for _ in 0..200 {
        let events = recorder.events();
        if events
            .iter()
            .any(|event| event.str_field("phase") == Some(phase_name))
        {
            return events;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    recorder.events()
}
