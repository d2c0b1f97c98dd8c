//! Binary event records for the test-cycle wire format.
//!
//! Each finished span is flattened into an [`EventRecord`] and wrapped in a
//! typed [`WireEvent`]. Records are msgpack maps with fixed field names;
//! optional identifier fields are omitted entirely when zero/empty, and
//! decoders treat absence as the zero value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Span type strings. The span type of a finished span selects the event
/// kind and content version it is encoded with.
pub mod span_types {
    /// A test execution.
    pub const TEST: &str = "test";
    /// A benchmark execution (encoded as a test event).
    pub const BENCHMARK: &str = "benchmark";
    /// A test suite.
    pub const TEST_SUITE: &str = "test_suite_end";
    /// A test module.
    pub const TEST_MODULE: &str = "test_module_end";
    /// A test session.
    pub const TEST_SESSION: &str = "test_session_end";
    /// Any other span captured during the test run.
    pub const SPAN: &str = "span";
}

/// Meta tag names carrying hierarchy identifiers. Entity spans set these as
/// string tags; the encoder extracts them into the record's typed fields.
pub const TEST_SESSION_ID_TAG: &str = "test_session_id";
/// See [`TEST_SESSION_ID_TAG`].
pub const TEST_MODULE_ID_TAG: &str = "test_module_id";
/// See [`TEST_SESSION_ID_TAG`].
pub const TEST_SUITE_ID_TAG: &str = "test_suite_id";
/// Correlation id for intelligent-test-runner transactions.
pub const CORRELATION_ID_TAG: &str = "itr_correlation_id";

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

/// A finished span as handed to the writer by the tracer.
///
/// This is the writer's input type; it carries everything the encoder needs
/// without keeping the live span alive.
#[derive(Debug, Clone, Default)]
pub struct FinishedSpan {
    pub name: String,
    pub service: String,
    pub resource: String,
    pub span_type: String,
    /// Start time in nanoseconds since the Unix epoch.
    pub start: i64,
    /// Duration in nanoseconds.
    pub duration: i64,
    pub span_id: u64,
    pub trace_id: u64,
    pub parent_id: u64,
    /// Error status; 0 means no error.
    pub error: i32,
    pub meta: HashMap<String, String>,
    pub metrics: HashMap<String, f64>,
}

/// One span flattened into the intake record layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub test_session_id: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub test_module_id: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub test_suite_id: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub itr_correlation_id: String,
    pub name: String,
    pub service: String,
    pub resource: String,
    #[serde(rename = "type")]
    pub span_type: String,
    /// Span start time expressed in nanoseconds since the Unix epoch.
    pub start: i64,
    /// Duration of the span expressed in nanoseconds.
    pub duration: i64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub span_id: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub trace_id: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub parent_id: u64,
    /// Error status of the span; 0 means no errors.
    pub error: i32,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
}

/// A typed event wrapping one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event kind understood by the intake; equals the span type for
    /// hierarchy spans and `"test"` for benchmarks.
    #[serde(rename = "type")]
    pub kind: String,
    /// Version of the content layout for this event kind.
    pub version: i32,
    pub content: EventRecord,
}

impl WireEvent {
    /// Flatten a finished span into the event layout for its span type.
    ///
    /// Hierarchy identifier tags are moved out of `meta` into the record's
    /// typed fields. Suite/module/session events carry no span/trace ids;
    /// the hierarchy ids are their identity.
    pub fn from_span(mut span: FinishedSpan) -> WireEvent {
        match span.span_type.as_str() {
            span_types::TEST_SUITE => {
                let mut record = base_record(&mut span);
                record.test_session_id = take_meta_u64(&mut span.meta, TEST_SESSION_ID_TAG);
                record.test_module_id = take_meta_u64(&mut span.meta, TEST_MODULE_ID_TAG);
                record.test_suite_id = take_meta_u64(&mut span.meta, TEST_SUITE_ID_TAG);
                record.meta = span.meta;
                WireEvent {
                    kind: span_types::TEST_SUITE.to_string(),
                    version: 1,
                    content: record,
                }
            }
            span_types::TEST_MODULE => {
                let mut record = base_record(&mut span);
                record.test_session_id = take_meta_u64(&mut span.meta, TEST_SESSION_ID_TAG);
                record.test_module_id = take_meta_u64(&mut span.meta, TEST_MODULE_ID_TAG);
                record.meta = span.meta;
                WireEvent {
                    kind: span_types::TEST_MODULE.to_string(),
                    version: 1,
                    content: record,
                }
            }
            span_types::TEST_SESSION => {
                let mut record = base_record(&mut span);
                record.test_session_id = take_meta_u64(&mut span.meta, TEST_SESSION_ID_TAG);
                record.meta = span.meta;
                WireEvent {
                    kind: span_types::TEST_SESSION.to_string(),
                    version: 1,
                    content: record,
                }
            }
            span_types::SPAN => {
                let mut record = base_record(&mut span);
                record.span_id = span.span_id;
                record.trace_id = span.trace_id;
                record.meta = span.meta;
                WireEvent {
                    kind: span_types::SPAN.to_string(),
                    version: 1,
                    content: record,
                }
            }
            // Tests, benchmarks, and anything unrecognized become test events.
            _ => {
                let mut record = base_record(&mut span);
                record.test_session_id = take_meta_u64(&mut span.meta, TEST_SESSION_ID_TAG);
                record.test_module_id = take_meta_u64(&mut span.meta, TEST_MODULE_ID_TAG);
                record.test_suite_id = take_meta_u64(&mut span.meta, TEST_SUITE_ID_TAG);
                record.itr_correlation_id = take_meta(&mut span.meta, CORRELATION_ID_TAG);
                record.span_id = span.span_id;
                record.trace_id = span.trace_id;
                record.meta = span.meta;
                WireEvent {
                    kind: span_types::TEST.to_string(),
                    version: 2,
                    content: record,
                }
            }
        }
    }
}

fn base_record(span: &mut FinishedSpan) -> EventRecord {
    EventRecord {
        name: std::mem::take(&mut span.name),
        service: std::mem::take(&mut span.service),
        resource: std::mem::take(&mut span.resource),
        span_type: span.span_type.clone(),
        start: span.start,
        duration: span.duration,
        parent_id: span.parent_id,
        error: span.error,
        metrics: std::mem::take(&mut span.metrics),
        ..EventRecord::default()
    }
}

fn take_meta(meta: &mut HashMap<String, String>, key: &str) -> String {
    meta.remove(key).unwrap_or_default()
}

fn take_meta_u64(meta: &mut HashMap<String, String>, key: &str) -> u64 {
    take_meta(meta, key).parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_test_span() -> FinishedSpan {
        let mut meta = HashMap::new();
        meta.insert(TEST_SESSION_ID_TAG.to_string(), "11".to_string());
        meta.insert(TEST_MODULE_ID_TAG.to_string(), "22".to_string());
        meta.insert(TEST_SUITE_ID_TAG.to_string(), "33".to_string());
        meta.insert("test.name".to_string(), "test_parse".to_string());
        FinishedSpan {
            name: "vigil.harness.test".to_string(),
            service: "my-service".to_string(),
            resource: "parser_test.rs.test_parse".to_string(),
            span_type: span_types::TEST.to_string(),
            start: 1_700_000_000_000_000_000,
            duration: 1_500_000,
            span_id: 44,
            trace_id: 44,
            ..FinishedSpan::default()
        }
        .with_meta(meta)
    }

    impl FinishedSpan {
        fn with_meta(mut self, meta: HashMap<String, String>) -> Self {
            self.meta = meta;
            self
        }
    }

    #[test]
    fn test_event_extracts_hierarchy_ids() {
        let event = WireEvent::from_span(finished_test_span());
        assert_eq!(event.kind, span_types::TEST);
        assert_eq!(event.version, 2);
        assert_eq!(event.content.test_session_id, 11);
        assert_eq!(event.content.test_module_id, 22);
        assert_eq!(event.content.test_suite_id, 33);
        assert_eq!(event.content.span_id, 44);
        assert_eq!(event.content.trace_id, 44);
        // id tags are moved out of meta, domain tags stay
        assert!(!event.content.meta.contains_key(TEST_SESSION_ID_TAG));
        assert_eq!(
            event.content.meta.get("test.name").map(String::as_str),
            Some("test_parse")
        );
    }

    #[test]
    fn session_event_has_no_span_ids() {
        let mut span = finished_test_span();
        span.span_type = span_types::TEST_SESSION.to_string();
        let event = WireEvent::from_span(span);
        assert_eq!(event.kind, span_types::TEST_SESSION);
        assert_eq!(event.version, 1);
        assert_eq!(event.content.test_session_id, 11);
        assert_eq!(event.content.span_id, 0);
        assert_eq!(event.content.trace_id, 0);
    }

    #[test]
    fn benchmark_span_becomes_test_event() {
        let mut span = finished_test_span();
        span.span_type = span_types::BENCHMARK.to_string();
        let event = WireEvent::from_span(span);
        assert_eq!(event.kind, span_types::TEST);
        assert_eq!(event.version, 2);
        assert_eq!(event.content.span_type, span_types::BENCHMARK);
    }

    #[test]
    fn unparseable_id_tag_becomes_zero() {
        let mut span = finished_test_span();
        span.meta
            .insert(TEST_MODULE_ID_TAG.to_string(), "not-a-number".to_string());
        let event = WireEvent::from_span(span);
        assert_eq!(event.content.test_module_id, 0);
    }
}
