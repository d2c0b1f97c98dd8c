//! End-to-end scenarios across the harness, span hierarchy, and wire
//! pipeline, against a mock transport.

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use vigil::{test_unit, TestContext, TestHarness, TestStatus, Tracer, WireConfig};
use vigil_span::CloseCoordinator;
use vigil_wire::span_types;
use vigil_wire::testing::MockTransport;

fn mock_tracer() -> (Tracer, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let config = WireConfig::default()
        .with_service("integration")
        .with_send_retries(0);
    let tracer = Tracer::with_transport(&config, transport.clone()).unwrap();
    (tracer, transport)
}

// Scenario: one passing test produces a fully linked four-event tree with
// a passing session.
#[test]
fn single_passing_test_produces_linked_tree() {
    let (tracer, transport) = mock_tracer();

    let session = vigil::TestSession::start(
        &tracer,
        "cargo test --workspace",
        ".",
        "vigil.harness",
        Utc::now(),
    );
    let module = session.get_or_create_module("pkg", "vigil.harness", "0.1.0", Utc::now());
    let suite = module.get_or_create_suite("pkg_test.rs", Utc::now());
    let test = suite.create_test("test_foo", Utc::now());
    test.close(TestStatus::Pass);
    suite.close();
    module.close();
    session.close(0);

    let events = transport.events();
    assert_eq!(events.len(), 4);

    let session_event = &transport.events_of_kind(span_types::TEST_SESSION)[0].content;
    assert_eq!(session_event.meta["test.status"], "pass");
    assert_eq!(session_event.metrics["test.exit_code"], 0.0);
    assert_eq!(
        session_event.resource,
        "vigil.harness.test_session.cargo test --workspace"
    );

    let test_event = &transport.events_of_kind(span_types::TEST)[0].content;
    assert_eq!(test_event.resource, "pkg_test.rs.test_foo");
    assert_eq!(test_event.test_session_id, session.context().span_id);
    assert_eq!(test_event.test_module_id, module.context().span_id);
    assert_eq!(test_event.test_suite_id, suite.context().span_id);
    assert_eq!(test_event.meta["test.status"], "pass");
}

fn panics_with_boom(_ctx: &mut TestContext) {
    panic!("boom");
}

// Scenario: a panicking test is recorded with panic detail, flags its
// suite and module, and still fails the run through the native path.
#[test]
fn panic_scenario_records_error_and_flags_ancestors() {
    let (tracer, transport) = mock_tracer();
    let exit_code = TestHarness::new()
        .with_tracer(tracer)
        .register(test_unit!(panics_with_boom))
        .run();

    assert_eq!(exit_code, 1);

    let test_event = &transport.events_of_kind(span_types::TEST)[0].content;
    assert_eq!(test_event.error, 1);
    assert_eq!(test_event.meta["error.type"], "panic");
    assert_eq!(test_event.meta["error.msg"], "boom");

    for kind in [span_types::TEST_SUITE, span_types::TEST_MODULE] {
        assert_eq!(transport.events_of_kind(kind)[0].content.error, 1);
    }
}

// Scenario: two subtests registered before either finishes; counters end
// at exactly zero regardless of completion order.
#[test]
fn concurrent_subtests_balance_counters() {
    let (tracer, transport) = mock_tracer();
    let session =
        vigil::TestSession::start(&tracer, "cargo test", ".", "vigil.harness", Utc::now());
    let coordinator = Arc::new(CloseCoordinator::new());

    coordinator.register_unit("pkg", "s.rs");
    let module = session.get_or_create_module("pkg", "vigil.harness", "0.1.0", Utc::now());
    let suite = module.get_or_create_suite("s.rs", Utc::now());
    let parent = suite.create_test("parent", Utc::now());

    // both registrations happen before either child runs
    coordinator.register_unit("pkg", "s.rs");
    coordinator.register_unit("pkg", "s.rs");

    thread::scope(|scope| {
        for name in ["parent/first", "parent/second"] {
            let suite = suite.clone();
            let module = module.clone();
            let coordinator = Arc::clone(&coordinator);
            scope.spawn(move || {
                let child = suite.create_test(name, Utc::now());
                child.close(TestStatus::Pass);
                coordinator.unit_finished(&module, &suite);
            });
        }
    });

    parent.close(TestStatus::Pass);
    coordinator.unit_finished(&module, &suite);

    assert_eq!(coordinator.suite_outstanding("s.rs"), 0);
    assert_eq!(coordinator.module_outstanding("pkg"), 0);
    assert!(suite.is_closed());
    assert!(module.is_closed());

    session.close(0);
    assert_eq!(transport.events_of_kind(span_types::TEST).len(), 3);
    assert_eq!(transport.events_of_kind(span_types::TEST_SUITE).len(), 1);
    assert_eq!(transport.events_of_kind(span_types::TEST_MODULE).len(), 1);
}

// Scenario: abrupt termination with three still-open tests; the forced
// close pass fails all of them and the session exits with code 1.
#[test]
fn forced_shutdown_closes_every_open_node_as_failed() {
    let (tracer, transport) = mock_tracer();
    let session =
        vigil::TestSession::start(&tracer, "cargo test", ".", "vigil.harness", Utc::now());
    let module = session.get_or_create_module("pkg", "vigil.harness", "0.1.0", Utc::now());
    let suite = module.get_or_create_suite("s.rs", Utc::now());
    for i in 0..3 {
        suite.create_test(&format!("hung_test_{i}"), Utc::now());
    }

    // what the SIGINT/SIGTERM handler runs before exiting with code 1
    tracer.shutdown();

    let tests = transport.events_of_kind(span_types::TEST);
    assert_eq!(tests.len(), 3);
    for event in &tests {
        assert_eq!(event.content.meta["test.status"], "fail");
    }

    let session_event = &transport.events_of_kind(span_types::TEST_SESSION)[0].content;
    assert_eq!(session_event.meta["test.status"], "fail");
    assert_eq!(session_event.metrics["test.exit_code"], 1.0);
    assert!(session.is_closed());
}

fn passes(_ctx: &mut TestContext) {}

// Delivery failure never fails the run: the batch is dropped after
// retries and the exit code still reflects the tests themselves.
#[test]
fn unavailable_intake_loses_telemetry_not_the_run() {
    let transport = MockTransport::failing(u32::MAX);
    let config = WireConfig::default()
        .with_send_retries(1)
        .with_retry_delay(std::time::Duration::from_millis(1));
    let tracer = Tracer::with_transport(&config, transport.clone()).unwrap();

    let exit_code = TestHarness::new()
        .with_tracer(tracer)
        .register(test_unit!(passes))
        .run();

    assert_eq!(exit_code, 0);
    assert!(transport.request_count() > 0);
    assert!(transport.events().is_empty());
}
