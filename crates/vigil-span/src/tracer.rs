//! The span primitive and the tracer that feeds finished spans into the
//! wire writer.
//!
//! This is deliberately minimal: no sampling, no context propagation, no
//! protocol negotiation. A span is a named, timed record with string tags
//! (`meta`) and numeric tags (`metrics`); finishing it exactly once hands
//! it to the batched writer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use vigil_wire::{
    DiscardTransport, EventWriter, FinishedSpan, IntakeTransport, Transport, WireConfig, WireError,
};

use crate::env_tags;
use crate::shutdown::ShutdownRegistry;

const DEFAULT_SERVICE: &str = "vigil.test";

/// Identifiers of a span. The empty (all-zero) context is returned where
/// no span is available; callers must treat it as "no context" rather
/// than an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanContext {
    pub trace_id: u64,
    pub span_id: u64,
}

/// A tag value: strings land in the span's `meta` map, numbers in
/// `metrics`.
#[derive(Debug, Clone)]
pub enum TagValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<i32> for TagValue {
    fn from(v: i32) -> Self {
        TagValue::Int(i64::from(v))
    }
}

impl From<u32> for TagValue {
    fn from(v: u32) -> Self {
        TagValue::Int(i64::from(v))
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

/// Options for starting a span.
#[derive(Debug, Default)]
pub struct SpanOptions {
    pub resource: String,
    pub span_type: String,
    pub start_time: Option<DateTime<Utc>>,
    pub tags: Vec<(String, TagValue)>,
}

#[derive(Debug, Default)]
struct SpanState {
    name: String,
    service: String,
    resource: String,
    span_type: String,
    start_ns: i64,
    error: i32,
    meta: HashMap<String, String>,
    metrics: HashMap<String, f64>,
    finished: bool,
}

/// A live span. Cheap to clone; all clones address the same record.
#[derive(Clone)]
pub struct Span {
    span_id: u64,
    trace_id: u64,
    state: Arc<Mutex<SpanState>>,
    writer: EventWriter,
}

impl Span {
    pub fn context(&self) -> SpanContext {
        SpanContext {
            trace_id: self.trace_id,
            span_id: self.span_id,
        }
    }

    pub fn set_tag(&self, key: &str, value: impl Into<TagValue>) {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return;
        }
        match value.into() {
            TagValue::Str(v) => {
                state.meta.insert(key.to_string(), v);
            }
            TagValue::Bool(v) => {
                state.meta.insert(key.to_string(), v.to_string());
            }
            TagValue::Int(v) => {
                state.metrics.insert(key.to_string(), v as f64);
            }
            TagValue::Float(v) => {
                state.metrics.insert(key.to_string(), v);
            }
        }
    }

    /// Mark the span as errored without further detail.
    pub fn set_error_flag(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.finished {
            state.error = 1;
        }
    }

    /// Mark the span as errored with a message.
    pub fn set_error(&self, message: &str) {
        self.set_error_info("", message, "");
    }

    /// Mark the span as errored with type, message, and stacktrace detail.
    /// Empty detail fields are not written.
    pub fn set_error_info(&self, kind: &str, message: &str, stack: &str) {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return;
        }
        state.error = 1;
        if !kind.is_empty() {
            state
                .meta
                .insert(crate::tags::ERROR_TYPE.to_string(), kind.to_string());
        }
        if !message.is_empty() {
            state
                .meta
                .insert(crate::tags::ERROR_MSG.to_string(), message.to_string());
        }
        if !stack.is_empty() {
            state
                .meta
                .insert(crate::tags::ERROR_STACK.to_string(), stack.to_string());
        }
    }

    /// Finish the span and hand it to the writer. Only the first call has
    /// any effect.
    pub fn finish(&self, finish_time: DateTime<Utc>) {
        let finished = {
            let mut state = self.state.lock().unwrap();
            if state.finished {
                return;
            }
            state.finished = true;
            let finish_ns = finish_time.timestamp_nanos_opt().unwrap_or(0);
            FinishedSpan {
                name: std::mem::take(&mut state.name),
                service: std::mem::take(&mut state.service),
                resource: std::mem::take(&mut state.resource),
                span_type: std::mem::take(&mut state.span_type),
                start: state.start_ns,
                duration: (finish_ns - state.start_ns).max(0),
                span_id: self.span_id,
                trace_id: self.trace_id,
                parent_id: 0,
                error: state.error,
                meta: std::mem::take(&mut state.meta),
                metrics: std::mem::take(&mut state.metrics),
            }
        };
        self.writer.push(finished);
    }
}

struct TracerInner {
    service: String,
    writer: EventWriter,
    shutdown: ShutdownRegistry,
}

/// Starts spans and owns the delivery pipeline for one test run.
///
/// Cheap to clone. Node registries hang off the session, not the tracer,
/// so embedding several independent runs in one process is possible; the
/// process-wide singleton in [`crate::lifecycle`] is only a convenience.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl Tracer {
    /// Build a tracer delivering to the configured intake.
    pub fn new(config: &WireConfig) -> Result<Tracer, WireError> {
        let transport: Arc<dyn Transport> = Arc::new(IntakeTransport::new(config)?);
        Self::with_transport(config, transport)
    }

    /// Build a tracer with a custom transport (used by tests).
    pub fn with_transport(
        config: &WireConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Tracer, WireError> {
        let writer = EventWriter::new(config, transport)?;
        let service = config
            .service
            .clone()
            .or_else(default_service_name)
            .unwrap_or_else(|| DEFAULT_SERVICE.to_string());
        Ok(Tracer {
            inner: Arc::new(TracerInner {
                service,
                writer,
                shutdown: ShutdownRegistry::new(),
            }),
        })
    }

    /// Build a tracer that discards everything. Used as the fallback when
    /// delivery cannot be configured: tests still run, telemetry is lost.
    pub fn disabled(config: &WireConfig) -> Tracer {
        Self::with_transport(config, Arc::new(DiscardTransport))
            .expect("failed to start background writer runtime")
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    pub fn start_span(&self, name: &str, options: SpanOptions) -> Span {
        let span_id = non_zero_id();
        let start = options.start_time.unwrap_or_else(Utc::now);
        let mut state = SpanState {
            name: name.to_string(),
            service: self.inner.service.clone(),
            resource: if options.resource.is_empty() {
                name.to_string()
            } else {
                options.resource
            },
            span_type: options.span_type,
            start_ns: start.timestamp_nanos_opt().unwrap_or(0),
            ..SpanState::default()
        };
        // apply start tags directly, the span is not shared yet
        for (key, value) in options.tags {
            match value {
                TagValue::Str(v) => {
                    state.meta.insert(key, v);
                }
                TagValue::Bool(v) => {
                    state.meta.insert(key, v.to_string());
                }
                TagValue::Int(v) => {
                    state.metrics.insert(key, v as f64);
                }
                TagValue::Float(v) => {
                    state.metrics.insert(key, v);
                }
            }
        }
        Span {
            span_id,
            trace_id: span_id,
            state: Arc::new(Mutex::new(state)),
            writer: self.inner.writer.clone(),
        }
    }

    /// Register a callback to run during [`Tracer::shutdown`]. Callbacks
    /// run in LIFO order.
    pub fn push_close_action(&self, action: impl FnOnce() + Send + 'static) {
        self.inner.shutdown.push(action);
    }

    /// Run all registered close actions, then flush and stop the writer.
    ///
    /// Safe to call more than once; actions run at most once and closing
    /// an already-closed node is a no-op.
    pub fn shutdown(&self) {
        self.inner.shutdown.run_all();
        self.inner.writer.stop();
    }

    /// Flush buffered events and wait for delivery.
    pub fn flush(&self) {
        self.inner.writer.flush_sync();
    }
}

fn non_zero_id() -> u64 {
    loop {
        let id = rand::random::<u64>();
        if id != 0 {
            return id;
        }
    }
}

fn default_service_name() -> Option<String> {
    env_tags::env_tags()
        .get(crate::tags::GIT_REPOSITORY_URL)
        .and_then(|url| env_tags::service_name_from_repository(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_wire::span_types;
    use vigil_wire::testing::MockTransport;

    fn test_tracer(transport: Arc<MockTransport>) -> Tracer {
        let config = WireConfig::default()
            .with_service("test-svc")
            .with_send_retries(0);
        Tracer::with_transport(&config, transport).unwrap()
    }

    #[test]
    fn span_tags_route_by_value_kind() {
        let transport = MockTransport::new();
        let tracer = test_tracer(transport.clone());

        let span = tracer.start_span(
            "vigil.harness.test",
            SpanOptions {
                resource: "suite.case".to_string(),
                span_type: span_types::TEST.to_string(),
                ..SpanOptions::default()
            },
        );
        span.set_tag("test.name", "case");
        span.set_tag("test.source.start", 42u32);
        span.set_tag("benchmark.duration.mean", 1.5);
        span.set_tag("flaky", true);
        span.finish(Utc::now());
        tracer.flush();

        let events = transport.events();
        assert_eq!(events.len(), 1);
        let record = &events[0].content;
        assert_eq!(record.service, "test-svc");
        assert_eq!(record.meta["test.name"], "case");
        assert_eq!(record.meta["flaky"], "true");
        assert_eq!(record.metrics["test.source.start"], 42.0);
        assert_eq!(record.metrics["benchmark.duration.mean"], 1.5);
    }

    #[test]
    fn finish_is_idempotent() {
        let transport = MockTransport::new();
        let tracer = test_tracer(transport.clone());

        let span = tracer.start_span("op", SpanOptions::default());
        let finish = Utc::now();
        span.finish(finish);
        span.finish(finish);
        span.finish(finish);
        tracer.flush();

        assert_eq!(transport.events().len(), 1);
    }

    #[test]
    fn tags_after_finish_are_dropped() {
        let transport = MockTransport::new();
        let tracer = test_tracer(transport.clone());

        let span = tracer.start_span("op", SpanOptions::default());
        span.finish(Utc::now());
        span.set_tag("late", "value");
        span.set_error_flag();
        tracer.flush();

        let record = &transport.events()[0].content;
        assert!(!record.meta.contains_key("late"));
        assert_eq!(record.error, 0);
    }

    #[test]
    fn duration_never_negative() {
        let transport = MockTransport::new();
        let tracer = test_tracer(transport.clone());

        let start = Utc::now();
        let span = tracer.start_span(
            "op",
            SpanOptions {
                start_time: Some(start),
                ..SpanOptions::default()
            },
        );
        span.finish(start - chrono::Duration::seconds(5));
        tracer.flush();

        assert_eq!(transport.events()[0].content.duration, 0);
    }

    #[test]
    fn error_info_skips_empty_fields() {
        let transport = MockTransport::new();
        let tracer = test_tracer(transport.clone());

        let span = tracer.start_span("op", SpanOptions::default());
        span.set_error_info("panic", "boom", "");
        span.finish(Utc::now());
        tracer.flush();

        let record = &transport.events()[0].content;
        assert_eq!(record.error, 1);
        assert_eq!(record.meta[crate::tags::ERROR_TYPE], "panic");
        assert_eq!(record.meta[crate::tags::ERROR_MSG], "boom");
        assert!(!record.meta.contains_key(crate::tags::ERROR_STACK));
    }
}
