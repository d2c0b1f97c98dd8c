//! Test suites: groupings (source files) of individual tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use vigil_wire::record::{TEST_MODULE_ID_TAG, TEST_SESSION_ID_TAG, TEST_SUITE_ID_TAG};
use vigil_wire::span_types;

use crate::entity::{operation_name, with_common_tags, EntityCore};
use crate::module::TestModule;
use crate::tags;
use crate::test::TestCase;
use crate::tracer::{SpanContext, SpanOptions, TagValue, Tracer};

/// A suite span. Unique per (module, name).
///
/// Suites do not retain their tests; test completion is tracked by the
/// close coordinator, which owns the closing trigger.
#[derive(Clone)]
pub struct TestSuite {
    inner: Arc<SuiteInner>,
}

pub(crate) struct SuiteInner {
    core: EntityCore,
    module: TestModule,
    suite_id: u64,
    name: String,
}

impl TestSuite {
    pub(crate) fn create(
        module: &TestModule,
        name: &str,
        start_time: DateTime<Utc>,
    ) -> TestSuite {
        let operation = operation_name(module.framework(), "test_suite");

        // suite tags include the module and session tags for backend-side
        // fingerprinting
        let mut domain_tags = module.domain_tags();
        domain_tags.push((tags::TEST_SUITE.to_string(), name.to_string()));

        let span = module.tracer().start_span(
            &operation,
            SpanOptions {
                resource: name.to_string(),
                span_type: span_types::TEST_SUITE.to_string(),
                start_time: Some(start_time),
                tags: with_common_tags(&domain_tags),
            },
        );
        let suite_id = span.context().span_id;
        span.set_tag(TEST_SESSION_ID_TAG, module.session_id().to_string());
        span.set_tag(TEST_MODULE_ID_TAG, module.module_id().to_string());
        span.set_tag(TEST_SUITE_ID_TAG, suite_id.to_string());

        let suite = TestSuite {
            inner: Arc::new(SuiteInner {
                core: EntityCore::new(span, start_time, domain_tags),
                module: module.clone(),
                suite_id,
                name: name.to_string(),
            }),
        };

        let hook = suite.clone();
        module.tracer().push_close_action(move || hook.close());

        suite
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn module(&self) -> &TestModule {
        &self.inner.module
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

    /// Record an error on this suite and flag its module.
    pub fn set_error(&self, message: &str) {
        self.inner.core.set_error(message);
        self.inner.module.mark_error();
    }

    /// Record detailed error info on this suite and flag its module.
    pub fn set_error_info(&self, kind: &str, message: &str, stack: &str) {
        self.inner.core.set_error_info(kind, message, stack);
        self.inner.module.mark_error();
    }

    /// Always creates a new test node: repeated invocations of the same
    /// test name (table-driven cases, retries) are distinct spans sharing
    /// a resource name.
    pub fn create_test(&self, name: &str, start_time: DateTime<Utc>) -> TestCase {
        TestCase::create(self, name, start_time)
    }

    /// Close the suite now. Idempotent.
    pub fn close(&self) {
        self.close_at(Utc::now());
    }

    pub fn close_at(&self, finish_time: DateTime<Utc>) {
        if self.inner.core.close_once(finish_time, |_| {}) {
            tracing::debug!(suite = %self.inner.name, "test suite closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.core.is_closed()
    }

    /// Flag this suite's span as errored, without detail.
    pub(crate) fn mark_error(&self) {
        self.inner.core.span().set_error_flag();
    }

    pub(crate) fn suite_id(&self) -> u64 {
        self.inner.suite_id
    }

    pub(crate) fn tracer(&self) -> &Tracer {
        self.inner.module.tracer()
    }

    pub(crate) fn domain_tags(&self) -> Vec<(String, String)> {
        self.inner.core.domain_tags().to_vec()
    }
}
