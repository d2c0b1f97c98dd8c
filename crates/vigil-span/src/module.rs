//! Test modules: logical groupings (packages, crates) of suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use vigil_wire::record::{TEST_MODULE_ID_TAG, TEST_SESSION_ID_TAG};
use vigil_wire::span_types;

use crate::entity::{operation_name, with_common_tags, EntityCore};
use crate::session::TestSession;
use crate::suite::TestSuite;
use crate::tags;
use crate::tracer::{SpanContext, SpanOptions, TagValue, Tracer};

/// A module span, owning its suites by name. Unique per (session, name).
#[derive(Clone)]
pub struct TestModule {
    inner: Arc<ModuleInner>,
}

pub(crate) struct ModuleInner {
    core: EntityCore,
    session: TestSession,
    module_id: u64,
    name: String,
    framework: String,
    suites: Mutex<HashMap<String, TestSuite>>,
}

impl TestModule {
    pub(crate) fn create(
        session: &TestSession,
        name: &str,
        framework: &str,
        framework_version: &str,
        start_time: DateTime<Utc>,
    ) -> TestModule {
        let operation = operation_name(framework, "test_module");

        // module tags include the session tags so the backend can compute
        // the session fingerprint from any module event
        let mut domain_tags = session.domain_tags();
        domain_tags.push((tags::TEST_MODULE.to_string(), name.to_string()));
        domain_tags.push((tags::TEST_FRAMEWORK.to_string(), framework.to_string()));
        domain_tags.push((
            tags::TEST_FRAMEWORK_VERSION.to_string(),
            framework_version.to_string(),
        ));

        let span = session.tracer().start_span(
            &operation,
            SpanOptions {
                resource: name.to_string(),
                span_type: span_types::TEST_MODULE.to_string(),
                start_time: Some(start_time),
                tags: with_common_tags(&domain_tags),
            },
        );
        let module_id = span.context().span_id;
        span.set_tag(TEST_SESSION_ID_TAG, session.session_id().to_string());
        span.set_tag(TEST_MODULE_ID_TAG, module_id.to_string());

        let module = TestModule {
            inner: Arc::new(ModuleInner {
                core: EntityCore::new(span, start_time, domain_tags),
                session: session.clone(),
                module_id,
                name: name.to_string(),
                framework: framework.to_string(),
                suites: Mutex::new(HashMap::new()),
            }),
        };

        let hook = module.clone();
        session.tracer().push_close_action(move || hook.close());

        module
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn framework(&self) -> &str {
        &self.inner.framework
    }

    pub fn session(&self) -> &TestSession {
        &self.inner.session
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

    pub fn set_error(&self, message: &str) {
        self.inner.core.set_error(message);
    }

    pub fn set_error_info(&self, kind: &str, message: &str, stack: &str) {
        self.inner.core.set_error_info(kind, message, stack);
    }

    /// Locked lookup-or-insert, scoped to this module.
    pub fn get_or_create_suite(&self, name: &str, start_time: DateTime<Utc>) -> TestSuite {
        let mut suites = self.inner.suites.lock().unwrap();
        if let Some(suite) = suites.get(name) {
            return suite.clone();
        }
        let suite = TestSuite::create(self, name, start_time);
        suites.insert(name.to_string(), suite.clone());
        suite
    }

    /// Close the module now. Idempotent.
    pub fn close(&self) {
        self.close_at(Utc::now());
    }

    /// Close at an explicit finish time, closing all open suites first.
    pub fn close_at(&self, finish_time: DateTime<Utc>) {
        let suites: Vec<TestSuite> = {
            let suites = self.inner.suites.lock().unwrap();
            suites.values().cloned().collect()
        };
        for suite in suites {
            suite.close_at(finish_time);
        }

        if self.inner.core.close_once(finish_time, |_| {}) {
            tracing::debug!(module = %self.inner.name, "test module closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.core.is_closed()
    }

    /// Flag this module's span as errored, without detail. Used by child
    /// nodes propagating their error flag one level up.
    pub(crate) fn mark_error(&self) {
        self.inner.core.span().set_error_flag();
    }

    pub(crate) fn module_id(&self) -> u64 {
        self.inner.module_id
    }

    pub(crate) fn tracer(&self) -> &Tracer {
        self.inner.session.tracer()
    }

    pub(crate) fn session_id(&self) -> u64 {
        self.inner.session.session_id()
    }

    pub(crate) fn domain_tags(&self) -> Vec<(String, String)> {
        self.inner.core.domain_tags().to_vec()
    }
}
