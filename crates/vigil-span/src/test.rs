//! Test and benchmark nodes, the leaves of the hierarchy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use vigil_wire::record::{TEST_MODULE_ID_TAG, TEST_SESSION_ID_TAG, TEST_SUITE_ID_TAG};
use vigil_wire::span_types;

use crate::entity::{operation_name, with_common_tags, EntityCore};
use crate::env_tags;
use crate::suite::TestSuite;
use crate::tags;
use crate::tracer::{SpanContext, SpanOptions, TagValue};

/// Outcome of a test or benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
}

impl TestStatus {
    pub fn as_tag(self) -> &'static str {
        match self {
            TestStatus::Pass => tags::STATUS_PASS,
            TestStatus::Fail => tags::STATUS_FAIL,
            TestStatus::Skip => tags::STATUS_SKIP,
        }
    }
}

/// A single test (or benchmark) invocation. Every invocation is a fresh
/// node; subtests use slash-joined names under their parent's name.
#[derive(Clone)]
pub struct TestCase {
    inner: Arc<TestInner>,
}

pub(crate) struct TestInner {
    core: EntityCore,
    suite: TestSuite,
    name: String,
}

impl TestCase {
    pub(crate) fn create(suite: &TestSuite, name: &str, start_time: DateTime<Utc>) -> TestCase {
        let operation = operation_name(suite.module().framework(), "test");
        let resource = format!("{}.{}", suite.name(), name);

        let mut domain_tags = suite.domain_tags();
        domain_tags.push((tags::TEST_NAME.to_string(), name.to_string()));

        let span = suite.tracer().start_span(
            &operation,
            SpanOptions {
                resource,
                span_type: span_types::TEST.to_string(),
                start_time: Some(start_time),
                tags: with_common_tags(&domain_tags),
            },
        );
        span.set_tag(TEST_SESSION_ID_TAG, suite.module().session_id().to_string());
        span.set_tag(TEST_MODULE_ID_TAG, suite.module().module_id().to_string());
        span.set_tag(TEST_SUITE_ID_TAG, suite.suite_id().to_string());

        let test = TestCase {
            inner: Arc::new(TestInner {
                core: EntityCore::new(span, start_time, domain_tags),
                suite: suite.clone(),
                name: name.to_string(),
            }),
        };

        let hook = test.clone();
        suite
            .tracer()
            .push_close_action(move || hook.close(TestStatus::Fail));

        test
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn suite(&self) -> &TestSuite {
        &self.inner.suite
    }

    pub fn context(&self) -> SpanContext {
        self.inner.core.context()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.inner.core.start_time()
    }

    pub fn set_tag(&self, key: &str, value: impl Into<TagValue>) {
        self.inner.core.set_tag(key, value);
    }

    /// Record an error on this test and flag its suite and module.
    pub fn set_error(&self, message: &str) {
        self.inner.core.set_error(message);
        self.inner.suite.mark_error();
        self.inner.suite.module().mark_error();
    }

    /// Record detailed error info on this test and flag its suite and
    /// module.
    pub fn set_error_info(&self, kind: &str, message: &str, stack: &str) {
        self.inner.core.set_error_info(kind, message, stack);
        self.inner.suite.mark_error();
        self.inner.suite.module().mark_error();
    }

    /// Record where the test function lives; the file is made relative to
    /// the source root.
    pub fn set_source_location(&self, file: &str, start_line: u32) {
        self.set_tag(
            tags::TEST_SOURCE_FILE,
            env_tags::relative_to_source_root(file),
        );
        self.set_tag(tags::TEST_SOURCE_START_LINE, start_line);
    }

    /// Record the test's owners, as resolved by an external code-owners
    /// source.
    pub fn set_owners(&self, owners: &str) {
        self.set_tag(tags::TEST_CODEOWNERS, owners);
    }

    /// Attach benchmark measurements, re-typing the node as a benchmark.
    /// Each `(key, value)` pair becomes a `benchmark.{measure}.{key}`
    /// metric.
    pub fn set_benchmark_data(&self, measure: &str, data: &[(&str, f64)]) {
        self.set_tag(tags::TEST_TYPE, tags::TYPE_BENCHMARK);
        for (key, value) in data {
            self.set_tag(&format!("benchmark.{measure}.{key}"), *value);
        }
    }

    /// Close with the given status. Idempotent.
    pub fn close(&self, status: TestStatus) {
        self.close_at(status, Utc::now());
    }

    pub fn close_at(&self, status: TestStatus, finish_time: DateTime<Utc>) {
        self.close_with_skip_reason(status, finish_time, "");
    }

    /// Close with a skip reason; the reason is only tagged when non-empty.
    pub fn close_with_skip_reason(
        &self,
        status: TestStatus,
        finish_time: DateTime<Utc>,
        skip_reason: &str,
    ) {
        self.inner.core.close_once(finish_time, |span| {
            span.set_tag(tags::TEST_STATUS, status.as_tag());
            if !skip_reason.is_empty() {
                span.set_tag(tags::TEST_SKIP_REASON, skip_reason);
            }
        });
    }

    pub fn is_closed(&self) -> bool {
        self.inner.core.is_closed()
    }
}
