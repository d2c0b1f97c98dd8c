//! The instrumentation harness.
//!
//! Registered units run on a pool of worker threads. Around every unit the
//! harness builds the span hierarchy on demand (session → module → suite →
//! test), catches panics so they are recorded before being re-raised, and
//! feeds completions to the close coordinator so parents close themselves
//! once their last unit finishes.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use vigil_span::{
    lifecycle, CloseCoordinator, TestCase, TestModule, TestSession, TestStatus, TestSuite, Tracer,
};

use crate::context::{Bencher, TestContext};
use crate::unit::{UnitKind, UnitSpec};

/// Framework name tagged on every span produced by this harness.
pub const FRAMEWORK: &str = "vigil.harness";

const FRAMEWORK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Collects declared units and runs them instrumented.
pub struct TestHarness {
    units: Vec<UnitSpec>,
    parallelism: usize,
    tracer: Option<Tracer>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            parallelism: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            tracer: None,
        }
    }

    /// Number of worker threads running units concurrently.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Use an explicit tracer instead of the process-wide one. Used by
    /// tests and by embedders that manage their own delivery pipeline.
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Register one unit.
    pub fn register(mut self, unit: UnitSpec) -> Self {
        self.units.push(unit);
        self
    }

    /// Register many units.
    pub fn register_all(mut self, units: impl IntoIterator<Item = UnitSpec>) -> Self {
        self.units.extend(units);
        self
    }

    /// Run every registered unit and return the exit code the process
    /// should report: 0 when everything passed, 1 otherwise.
    pub fn run(self) -> i32 {
        let tracer = match &self.tracer {
            Some(tracer) => tracer.clone(),
            None => lifecycle::init(),
        };

        let command = std::env::args().collect::<Vec<_>>().join(" ");
        let working_directory = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let session = TestSession::start(&tracer, &command, &working_directory, FRAMEWORK, Utc::now());

        let coordinator = Arc::new(CloseCoordinator::new());
        // static enumeration: account for every declared unit before
        // anything executes
        for unit in &self.units {
            coordinator.register_unit(unit.module_name(), unit.suite_name());
        }

        let any_failed = AtomicBool::new(false);
        let next = AtomicUsize::new(0);
        let units = &self.units;
        let workers = self.parallelism.min(units.len()).max(1);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(unit) = units.get(index) else {
                        break;
                    };
                    if run_unit(&session, &coordinator, unit) {
                        any_failed.store(true, Ordering::SeqCst);
                    }
                });
            }
        });

        let exit_code = if any_failed.load(Ordering::SeqCst) { 1 } else { 0 };
        tracing::info!(
            units = units.len(),
            exit_code,
            "test run finished"
        );
        session.close(exit_code);
        tracer.shutdown();
        exit_code
    }

    /// Run and exit the process with the resulting code.
    pub fn run_and_exit(self) -> ! {
        std::process::exit(self.run())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one declared unit, recovering from its panics. Returns whether it
/// failed.
fn run_unit(session: &TestSession, coordinator: &Arc<CloseCoordinator>, unit: &UnitSpec) -> bool {
    let module = session.get_or_create_module(
        unit.module_name(),
        FRAMEWORK,
        FRAMEWORK_VERSION,
        Utc::now(),
    );
    let suite = module.get_or_create_suite(unit.suite_name(), Utc::now());
    let test = suite.create_test(unit.name, Utc::now());
    test.set_source_location(unit.file, unit.line);

    let kind = unit.kind;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match kind {
        UnitKind::Test(f) => execute_in_context(&test, &suite, &module, coordinator, unit.name, f),
        UnitKind::Bench(f) => execute_bench(&test, &suite, &module, coordinator, f),
    }));

    match outcome {
        Ok(failed) => failed,
        // the unit's wrapper already recorded the panic, closed the node,
        // and ran the cascade before re-raising
        Err(_) => true,
    }
}

/// Execute a test body against an open test node: close it with the right
/// status, cascade the completion, and re-raise any panic so the caller's
/// native panic handling still observes it. Returns whether the test
/// failed (on the non-panic path).
pub(crate) fn execute_in_context<F>(
    test: &TestCase,
    suite: &TestSuite,
    module: &TestModule,
    coordinator: &Arc<CloseCoordinator>,
    path: &str,
    f: F,
) -> bool
where
    F: FnOnce(&mut TestContext),
{
    let mut ctx = TestContext::new(test, suite, module, coordinator, path);
    let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut ctx)));

    match result {
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let stack = Backtrace::force_capture().to_string();
            test.set_error_info("panic", &message, &stack);
            test.close(TestStatus::Fail);
            coordinator.unit_finished(module, suite);
            panic::resume_unwind(payload);
        }
        Ok(()) => {
            let (failed, skip_reason) = ctx.outcome();
            if failed {
                test.close(TestStatus::Fail);
            } else if let Some(reason) = skip_reason {
                test.close_with_skip_reason(TestStatus::Skip, Utc::now(), &reason);
            } else {
                test.close(TestStatus::Pass);
            }
            coordinator.unit_finished(module, suite);
            failed
        }
    }
}

/// Execute a benchmark body, attach its measurements, and cascade the
/// completion. Panics behave exactly as for tests.
fn execute_bench(
    test: &TestCase,
    suite: &TestSuite,
    module: &TestModule,
    coordinator: &Arc<CloseCoordinator>,
    f: fn(&mut Bencher),
) -> bool {
    let mut bencher = Bencher::new();
    let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut bencher)));

    match result {
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let stack = Backtrace::force_capture().to_string();
            test.set_error_info("panic", &message, &stack);
            test.close(TestStatus::Fail);
            coordinator.unit_finished(module, suite);
            panic::resume_unwind(payload);
        }
        Ok(()) => {
            if let Some((runs, mean_ns)) = bencher.measurement() {
                test.set_benchmark_data("duration", &[("run", runs as f64), ("mean", mean_ns)]);
            }
            test.close(TestStatus::Pass);
            coordinator.unit_finished(module, suite);
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
