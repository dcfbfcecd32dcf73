//! 异常路径：半关闭失败、取消、panic、拦截链顺序

mod common;

use async_trait::async_trait;
use common::{Harness, errors, phase, phases};
use flare_rpc_logging::interceptor::{Interceptor, streaming_client_fn, unary_fn};
use flare_rpc_logging::stream::{client_receive_as, receive_as};
use flare_rpc_logging::{
    AnyMessage, CallContext, CallSpec, EventRecorder, InterceptorChain, LoggingInterceptor,
    OutcomeCode, RpcError, StreamingClientConn, UnaryFunc, UnaryRequest, UnaryResponse,
};
use futures::FutureExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;

/// 半关闭总是失败的连接
struct BrokenCloseConn {
    spec: CallSpec,
}

#[async_trait]
impl StreamingClientConn for BrokenCloseConn {
    fn spec(&self) -> &CallSpec {
        &self.spec
    }

    async fn send(&self, _message: AnyMessage) -> Result<(), RpcError> {
        Ok(())
    }

    async fn close_request(&self) -> Result<(), RpcError> {
        Err(RpcError::failed_precondition("request already closed"))
    }

    async fn receive(&self) -> Result<Option<AnyMessage>, RpcError> {
        Err(RpcError::unavailable("connection reset"))
    }

    async fn close_response(&self) -> Result<(), RpcError> {
        Ok(())
    }
}

#[tokio::test]
async fn close_outcomes_mirror_the_underlying_connection() {
    let recorder = EventRecorder::new();
    let logging = LoggingInterceptor::new().with_sink(recorder.sink());
    let open = logging.wrap_streaming_client(streaming_client_fn(|_ctx, spec| BrokenCloseConn {
        spec,
    }));

    let conn = open(
        CallContext::new(),
        CallSpec::client_stream("test.Broken/Upload").for_client(),
    );

    let err = conn.close_request().await.unwrap_err();
    assert_eq!(err.code(), Some(OutcomeCode::FailedPrecondition));
    conn.close_response().await.unwrap();
    let err = conn.receive().await.unwrap_err();
    assert_eq!(err.code(), Some(OutcomeCode::Unavailable));

    let events = recorder.events();
    assert_eq!(
        phases(&events),
        vec!["start", "close_request", "close_response", "receive"]
    );

    let close_request = &phase(&events, "close_request")[0];
    assert!(close_request.is_level(Level::ERROR));
    assert_eq!(close_request.str_field("code"), Some("failed_precondition"));

    let close_response = &phase(&events, "close_response")[0];
    assert!(close_response.is_level(Level::INFO));
    assert!(!close_response.has_field("error"));

    let receive = &phase(&events, "receive")[0];
    assert!(receive.is_level(Level::ERROR));
    assert_eq!(receive.str_field("code"), Some("unavailable"));
}

#[tokio::test]
async fn double_close_is_logged_as_error() {
    let harness = Harness::new();
    let conn = harness.client().stream(
        CallContext::new(),
        CallSpec::client_stream("flare.user.v1.UserService/UpdateUsers"),
    );

    conn.close_request().await.unwrap();
    let err = conn.close_request().await.unwrap_err();
    assert_eq!(err.code(), Some(OutcomeCode::FailedPrecondition));

    let closes = phase(&harness.client_events.events(), "close_request");
    assert_eq!(closes.len(), 2);
    assert!(closes[0].is_level(Level::INFO));
    assert!(closes[1].is_level(Level::ERROR));
    assert_eq!(closes[1].str_field("code"), Some("failed_precondition"));
}

#[tokio::test]
async fn cancellation_is_classified_as_canceled() {
    let harness = Harness::with_server(|builder| {
        builder.unary("test.Wait/Forever", |ctx, _req| async move {
            ctx.cancelled().await;
            Err(RpcError::canceled("client went away"))
        })
    });

    let ctx = CallContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let err = harness
        .client()
        .call_unary(ctx, "test.Wait/Forever", ())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(OutcomeCode::Canceled));

    for events in [harness.server_events.events(), harness.client_events.events()] {
        let end = &phase(&events, "end")[0];
        assert!(end.is_level(Level::ERROR));
        assert_eq!(end.str_field("code"), Some("canceled"));
    }
}

#[tokio::test]
async fn cancelled_stream_reports_canceled_on_receive() {
    let harness = Harness::with_server(|builder| {
        builder.streaming(CallSpec::bidi_stream("test.Wait/Stream"), |_ctx, conn| async move {
            while receive_as::<String>(conn.as_ref()).await?.is_some() {}
            Ok(())
        })
    });

    let ctx = CallContext::new();
    let conn = harness
        .client()
        .stream(ctx.clone(), CallSpec::bidi_stream("test.Wait/Stream"));
    ctx.cancel();

    let err = client_receive_as::<String>(conn.as_ref()).await.unwrap_err();
    assert_eq!(err.code(), Some(OutcomeCode::Canceled));

    let receive = &phase(&harness.client_events.events(), "receive")[0];
    assert_eq!(receive.str_field("code"), Some("canceled"));

    let server = common::wait_for(&harness.server_events, "finish").await;
    let finish = &phase(&server, "finish")[0];
    assert_eq!(finish.str_field("code"), Some("canceled"));
}

#[tokio::test]
async fn stream_deadline_is_logged_as_deadline_exceeded() {
    let harness = Harness::with_server(|builder| {
        builder.streaming(CallSpec::server_stream("test.Slow/Feed"), |_ctx, _conn| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
    });

    let ctx = CallContext::new().with_timeout(Duration::from_millis(30));
    let conn = harness
        .client()
        .stream(ctx, CallSpec::server_stream("test.Slow/Feed"));
    conn.close_request().await.unwrap();

    let err = client_receive_as::<String>(conn.as_ref()).await.unwrap_err();
    assert_eq!(err.code(), Some(OutcomeCode::DeadlineExceeded));

    let receive = &phase(&harness.client_events.events(), "receive")[0];
    assert_eq!(receive.str_field("code"), Some("deadline_exceeded"));

    let server = common::wait_for(&harness.server_events, "finish").await;
    assert_eq!(phases(&server), vec!["start", "finish"]);
    let finish = &server[1];
    assert!(finish.is_level(Level::ERROR));
    assert_eq!(finish.str_field("code"), Some("deadline_exceeded"));
    assert!(finish.str_field("error").unwrap().contains("deadline exceeded"));
}

#[tokio::test]
async fn dropped_call_still_logs_an_end_event() {
    let recorder = EventRecorder::new();
    let logging = LoggingInterceptor::new().with_sink(recorder.sink());
    let call = logging.wrap_unary(unary_fn(|_ctx, _req| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(UnaryResponse::new(()))
    }));

    let req = UnaryRequest::new(CallSpec::unary("test.Slow/Call"), ());
    let outcome = tokio::time::timeout(Duration::from_millis(10), call(CallContext::new(), req)).await;
    assert!(outcome.is_err());

    let events = recorder.events();
    assert_eq!(phases(&events), vec!["start", "end"]);
    let end = &events[1];
    assert!(end.is_level(Level::ERROR));
    assert_eq!(end.str_field("code"), Some("canceled"));
    assert_eq!(end.message, "Handler call terminated abnormally");
}

#[tokio::test]
async fn panicking_stream_handler_still_logs_finish() {
    let harness = Harness::with_server(|builder| {
        builder.streaming(CallSpec::server_stream("test.Crash/Now"), |_ctx, _conn| async move {
            if true {
                panic!("handler exploded");
            }
            Ok(())
        })
    });

    let conn = harness
        .client()
        .stream(CallContext::new(), CallSpec::server_stream("test.Crash/Now"));
    conn.close_request().await.unwrap();

    let err = conn.receive().await.unwrap_err();
    assert_eq!(err.code(), Some(OutcomeCode::Internal));

    let server = harness.server_events.events();
    assert_eq!(phases(&server), vec!["start", "finish"]);
    let finish = &server[1];
    assert!(finish.is_level(Level::ERROR));
    assert_eq!(finish.str_field("code"), Some("unknown"));
    assert_eq!(finish.str_field("error"), Some("handler panicked"));
}

/// 记录进入与离开顺序的拦截器
struct Tag {
    name: &'static str,
    trail: Arc<Mutex<Vec<String>>>,
}

impl Interceptor for Tag {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let name = self.name;
        let trail = self.trail.clone();
        Arc::new(move |ctx, req| {
            let next = next.clone();
            let trail = trail.clone();
            async move {
                trail.lock().unwrap().push(format!("{}:before", name));
                let result = next(ctx, req).await;
                trail.lock().unwrap().push(format!("{}:after", name));
                result
            }
            .boxed()
        })
    }
}

#[tokio::test]
async fn chain_applies_first_registered_outermost() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let recorder = EventRecorder::new();
    let chain = InterceptorChain::new()
        .with(Tag {
            name: "outer",
            trail: trail.clone(),
        })
        .with_logging(LoggingInterceptor::new().with_sink(recorder.sink()))
        .with(Tag {
            name: "inner",
            trail: trail.clone(),
        });
    assert_eq!(chain.len(), 3);

    let handler_trail = trail.clone();
    let call = chain.wrap_unary(unary_fn(move |_ctx, _req| {
        let trail = handler_trail.clone();
        async move {
            trail.lock().unwrap().push("handler".to_string());
            Err::<UnaryResponse, _>(RpcError::not_found("nobody"))
        }
    }));

    let err = call(
        CallContext::new(),
        UnaryRequest::new(CallSpec::unary("test.Chain/Call"), ()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), Some(OutcomeCode::NotFound));

    assert_eq!(
        *trail.lock().unwrap(),
        vec![
            "outer:before",
            "inner:before",
            "handler",
            "inner:after",
            "outer:after"
        ]
    );
    let events = recorder.events();
    assert_eq!(phases(&events), vec!["start", "end"]);
    assert_eq!(errors(&events).len(), 1);
}

#[tokio::test]
async fn empty_chain_is_transparent() {
    let chain = InterceptorChain::new();
    assert!(chain.is_empty());

    let call = chain.wrap_unary(unary_fn(|_ctx, req| async move {
        Ok(UnaryResponse::from_boxed(req.into_message()))
    }));
    let resp = call(
        CallContext::new(),
        UnaryRequest::new(CallSpec::unary("test.Echo/Same"), 7u32),
    )
    .await
    .unwrap();
    assert_eq!(resp.message().downcast_ref::<u32>(), Some(&7));
}
