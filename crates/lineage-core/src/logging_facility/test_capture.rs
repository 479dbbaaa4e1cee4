//! In-memory event capture for logging assertions in tests
//!
//! The capture layer is installed once per test binary. Every test shares
//! the same buffer, so assertions filter by a distinctive `op` name.

use lineage_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One event as the layer saw it, every field rendered to a string
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub component: Option<String>,
    pub op: Option<String>,
    pub event: Option<String>,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn is(&self, op: &str, event: &str) -> bool {
        self.op.as_deref() == Some(op) && self.event.as_deref() == Some(event)
    }
}

#[derive(Default)]
struct FieldVisitor(HashMap<String, String>);

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: String) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }
}

struct CaptureLayer {
    sink: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let fields = visitor.0;

        let captured = CapturedEvent {
            level: *event.metadata().level(),
            component: fields.get("component").cloned(),
            op: fields.get("op").cloned(),
            event: fields.get("event").cloned(),
            fields,
        };
        if let Ok(mut sink) = self.sink.lock() {
            sink.push(captured);
        }
    }
}

/// Read side of the capture buffer
#[derive(Clone)]
pub struct TestCapture {
    sink: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.sink.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for(&self, op: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.op.as_deref() == Some(op))
            .collect()
    }

    /// Lifecycle events (`start`, `end`, `end_error`) seen for `op`, in order
    pub fn lifecycle(&self, op: &str) -> Vec<String> {
        self.events_for(op)
            .into_iter()
            .filter_map(|e| e.event)
            .filter(|e| [EVENT_START, EVENT_END, EVENT_END_ERROR].contains(&e.as_str()))
            .collect()
    }

    /// Error codes reported by `end_error` events of `op`
    pub fn error_codes(&self, op: &str) -> Vec<String> {
        self.events_for(op)
            .iter()
            .filter(|e| e.is(op, EVENT_END_ERROR))
            .filter_map(|e| e.field("err_code").map(str::to_string))
            .collect()
    }

    /// # Panics
    ///
    /// Panics if no `event` was captured for `op`.
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events.iter().any(|e| e.is(op, event)),
            "no op={} event={} among {} captured events",
            op,
            event,
            events.len()
        );
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

static CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber and return its handle
///
/// ```
/// use lineage_core::logging_facility::test_capture::init_test_capture;
/// use lineage_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_capture_op");
/// assert_eq!(capture.lifecycle("doc_capture_op"), vec!["start"]);
/// ```
pub fn init_test_capture() -> TestCapture {
    CAPTURE
        .get_or_init(|| {
            let sink = Arc::new(Mutex::new(Vec::new()));
            let layer = CaptureLayer { sink: sink.clone() };
            tracing_subscriber::registry().with(layer).init();
            TestCapture { sink }
        })
        .clone()
}
