use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{Event, Subscriber};
use tracing_subscriber::{Layer, layer::Context};

/// A log event recorded by [`CaptureLayer`].
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: String,
    pub target: String,
    /// The formatted message, if the event had one.
    pub message: Option<String>,
    /// Every other field, keyed by its full dotted name.
    pub fields: HashMap<String, serde_json::Value>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// Shared storage for captured events
#[derive(Debug, Clone, Default)]
pub struct CapturedEvents {
    events: Arc<RwLock<Vec<CapturedEvent>>>,
}

impl CapturedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// A layer that records into this storage.
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer::new(self.clone())
    }

    pub fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }

    /// Snapshot of everything captured so far, oldest first.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.read().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn find(&self, predicate: impl Fn(&CapturedEvent) -> bool) -> Option<CapturedEvent> {
        self.events.read().ok()?.iter().find(|event| predicate(event)).cloned()
    }

    /// Whether any event carried `name` with exactly `value`.
    pub fn contains_field(&self, name: &str, value: impl Into<serde_json::Value>) -> bool {
        let value = value.into();
        self.find(|event| event.field(name) == Some(&value)).is_some()
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }
}

/// A tracing layer that captures events in memory
pub struct CaptureLayer {
    storage: CapturedEvents,
}

impl CaptureLayer {
    pub fn new(storage: CapturedEvents) -> Self {
        Self { storage }
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.0;
        let message = fields.remove("message").map(|value| match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        let metadata = event.metadata();
        self.storage.push(CapturedEvent {
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
            fields,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}
