//! 内存事件记录器
//!
//! 一个 `tracing_subscriber::Layer`，把事件连同结构化字段保存在内存中，
//! 便于在进程内检查拦截器产生的日志（测试、调试面板等）。

use super::LogSink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// 一条已记录的事件
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: BTreeMap<String, Value>,
}

impl RecordedEvent {
    pub fn is_level(&self, level: Level) -> bool {
        self.level == level.as_str()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// 内存事件记录器
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录事件的快照
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// 以 JSON Lines 格式导出
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for event in self.lock().iter() {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// 只包含本记录器的 subscriber，所有级别均启用
    pub fn dispatch(&self) -> Dispatch {
        Dispatch::new(tracing_subscriber::registry().with(self.clone()))
    }

    /// 写入本记录器的日志输出端
    pub fn sink(&self) -> LogSink {
        LogSink::with_dispatch(self.dispatch())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("events", &self.len())
            .finish()
    }
}

impl<S: Subscriber> Layer<S> for EventRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.lock().push(RecordedEvent {
            timestamp: Utc::now(),
            level: metadata.level().as_str().to_string(),
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_structured_fields() {
        let recorder = EventRecorder::new();
        tracing::dispatcher::with_default(&recorder.dispatch(), || {
            tracing::error!(procedure = "/svc/Get", code = "not_found", attempt = 2u64, "call failed");
        });

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert!(event.is_level(Level::ERROR));
        assert_eq!(event.message, "call failed");
        assert_eq!(event.str_field("procedure"), Some("/svc/Get"));
        assert_eq!(event.str_field("code"), Some("not_found"));
        assert_eq!(event.field("attempt"), Some(&Value::from(2u64)));
    }

    #[test]
    fn exports_json_lines() {
        let recorder = EventRecorder::new();
        tracing::dispatcher::with_default(&recorder.dispatch(), || {
            tracing::info!(procedure = "/svc/A", "one");
            tracing::info!(procedure = "/svc/B", "two");
        });

        let lines = recorder.to_json_lines().unwrap();
        assert_eq!(lines.lines().count(), 2);
        let first: Value = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
        assert_eq!(first["fields"]["procedure"], "/svc/A");

        recorder.clear();
        assert!(recorder.is_empty());
    }
}
