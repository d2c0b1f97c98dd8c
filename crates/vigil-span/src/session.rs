//! The test session, root of the hierarchy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use vigil_wire::record::TEST_SESSION_ID_TAG;
use vigil_wire::span_types;

use crate::entity::{operation_name, with_common_tags, EntityCore};
use crate::module::TestModule;
use crate::tags;
use crate::tracer::{SpanContext, SpanOptions, TagValue, Tracer};

/// Root span covering one full test-process invocation. One per run;
/// modules hang off it by name.
///
/// Cheap to clone; all clones address the same session.
#[derive(Clone)]
pub struct TestSession {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    core: EntityCore,
    tracer: Tracer,
    session_id: u64,
    command: String,
    working_directory: String,
    framework: String,
    modules: Mutex<HashMap<String, TestModule>>,
}

impl TestSession {
    /// Start the root session span.
    ///
    /// The session registers a shutdown close action so that an abrupt
    /// termination still closes it (as failed) before the final flush.
    pub fn start(
        tracer: &Tracer,
        command: &str,
        working_directory: &str,
        framework: &str,
        start_time: DateTime<Utc>,
    ) -> TestSession {
        let operation = operation_name(framework, "test_session");
        let resource = format!("{operation}.{command}");

        let domain_tags = vec![
            (tags::TEST_TYPE.to_string(), tags::TYPE_TEST.to_string()),
            (tags::TEST_COMMAND.to_string(), command.to_string()),
            (
                tags::TEST_WORKING_DIRECTORY.to_string(),
                working_directory.to_string(),
            ),
        ];

        let span = tracer.start_span(
            &operation,
            SpanOptions {
                resource,
                span_type: span_types::TEST_SESSION.to_string(),
                start_time: Some(start_time),
                tags: with_common_tags(&domain_tags),
            },
        );
        let session_id = span.context().span_id;
        span.set_tag(TEST_SESSION_ID_TAG, session_id.to_string());

        let session = TestSession {
            inner: Arc::new(SessionInner {
                core: EntityCore::new(span, start_time, domain_tags),
                tracer: tracer.clone(),
                session_id,
                command: command.to_string(),
                working_directory: working_directory.to_string(),
                framework: framework.to_string(),
                modules: Mutex::new(HashMap::new()),
            }),
        };

        let hook = session.clone();
        tracer.push_close_action(move || hook.close(1));

        session
    }

    pub fn command(&self) -> &str {
        &self.inner.command
    }

    pub fn working_directory(&self) -> &str {
        &self.inner.working_directory
    }

    pub fn framework(&self) -> &str {
        &self.inner.framework
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

    /// Locked lookup-or-insert: concurrent calls with the same name all
    /// receive the one module created by the winning caller.
    pub fn get_or_create_module(
        &self,
        name: &str,
        framework: &str,
        framework_version: &str,
        start_time: DateTime<Utc>,
    ) -> TestModule {
        let mut modules = self.inner.modules.lock().unwrap();
        if let Some(module) = modules.get(name) {
            return module.clone();
        }
        let module = TestModule::create(self, name, framework, framework_version, start_time);
        modules.insert(name.to_string(), module.clone());
        module
    }

    /// Close the session with the run's exit code. Idempotent.
    pub fn close(&self, exit_code: i32) {
        self.close_at(exit_code, Utc::now());
    }

    /// Close at an explicit finish time: every still-open module is closed
    /// first (cascading to its suites), the exit code and derived status
    /// are tagged, and the writer is flushed synchronously.
    pub fn close_at(&self, exit_code: i32, finish_time: DateTime<Utc>) {
        let modules: Vec<TestModule> = {
            let modules = self.inner.modules.lock().unwrap();
            modules.values().cloned().collect()
        };
        for module in modules {
            module.close_at(finish_time);
        }

        let closed = self.inner.core.close_once(finish_time, |span| {
            span.set_tag(tags::TEST_EXIT_CODE, i64::from(exit_code));
            let status = if exit_code == 0 {
                tags::STATUS_PASS
            } else {
                tags::STATUS_FAIL
            };
            span.set_tag(tags::TEST_STATUS, status);
        });
        if closed {
            tracing::debug!(
                session_id = self.inner.session_id,
                exit_code,
                "test session closed"
            );
            self.inner.tracer.flush();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.core.is_closed()
    }

    pub(crate) fn session_id(&self) -> u64 {
        self.inner.session_id
    }

    pub(crate) fn tracer(&self) -> &Tracer {
        &self.inner.tracer
    }

    pub(crate) fn domain_tags(&self) -> Vec<(String, String)> {
        self.inner.core.domain_tags().to_vec()
    }
}
