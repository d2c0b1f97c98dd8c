//! Execution context handed to test bodies, and the benchmark measurer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use vigil_span::{CloseCoordinator, TestCase, TestModule, TestSuite};

use crate::runner;

/// Context for one running test. Lets the body record failure or skip,
/// and spawn subtests that become their own spans.
pub struct TestContext {
    test: TestCase,
    suite: TestSuite,
    module: TestModule,
    coordinator: Arc<CloseCoordinator>,
    path: String,
    failed: bool,
    skip_reason: Option<String>,
}

impl TestContext {
    pub(crate) fn new(
        test: &TestCase,
        suite: &TestSuite,
        module: &TestModule,
        coordinator: &Arc<CloseCoordinator>,
        path: &str,
    ) -> Self {
        Self {
            test: test.clone(),
            suite: suite.clone(),
            module: module.clone(),
            coordinator: Arc::clone(coordinator),
            path: path.to_string(),
            failed: false,
            skip_reason: None,
        }
    }

    /// Slash-joined name of this test, e.g. `parent/child`.
    pub fn name(&self) -> &str {
        &self.path
    }

    /// The span node of this test, for custom tags.
    pub fn test(&self) -> &TestCase {
        &self.test
    }

    /// Mark this test as failed and keep running.
    pub fn fail(&mut self, message: &str) {
        self.failed = true;
        self.test.set_error(message);
    }

    /// Mark this test as skipped.
    pub fn skip(&mut self, reason: &str) {
        self.skip_reason = Some(reason.to_string());
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Run `f` as a subtest: a fresh test span named `{parent}/{name}`,
    /// counted by the coordinator before the child body starts so parents
    /// cannot close early. A failing subtest fails its parent.
    pub fn run(&mut self, name: &str, f: impl FnOnce(&mut TestContext)) {
        // the increment must happen here, in the registering thread,
        // before control transfers to the child
        self.coordinator
            .register_unit(self.module.name(), self.suite.name());

        let path = format!("{}/{}", self.path, name);
        let child = self.suite.create_test(&path, Utc::now());
        let child_failed = runner::execute_in_context(
            &child,
            &self.suite,
            &self.module,
            &self.coordinator,
            &path,
            f,
        );
        if child_failed {
            self.failed = true;
        }
    }

    pub(crate) fn outcome(self) -> (bool, Option<String>) {
        (self.failed, self.skip_reason)
    }
}

const BENCH_TARGET: Duration = Duration::from_millis(100);
const BENCH_MAX_ITERS: u64 = 1_000_000;

/// Measures a benchmark body: runs it repeatedly for a fixed time budget
/// and records the iteration count and mean duration.
pub struct Bencher {
    iterations: u64,
    mean_ns: f64,
    measured: bool,
}

impl Bencher {
    pub(crate) fn new() -> Self {
        Self {
            iterations: 0,
            mean_ns: 0.0,
            measured: false,
        }
    }

    /// Run `f` repeatedly and record the measurement. The return value is
    /// passed through `black_box` so the body is not optimized away.
    pub fn iter<T>(&mut self, mut f: impl FnMut() -> T) {
        let start = Instant::now();
        let mut n: u64 = 0;
        while start.elapsed() < BENCH_TARGET && n < BENCH_MAX_ITERS {
            std::hint::black_box(f());
            n += 1;
        }
        let elapsed = start.elapsed();
        self.iterations = n.max(1);
        self.mean_ns = elapsed.as_nanos() as f64 / self.iterations as f64;
        self.measured = true;
    }

    /// `(iterations, mean ns per iteration)`, if `iter` ran.
    pub(crate) fn measurement(&self) -> Option<(u64, f64)> {
        self.measured.then_some((self.iterations, self.mean_ns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bencher_records_iterations_and_mean() {
        let mut b = Bencher::new();
        b.iter(|| std::hint::black_box(21) * 2);
        let (runs, mean) = b.measurement().unwrap();
        assert!(runs >= 1);
        assert!(mean >= 0.0);
    }

    #[test]
    fn bencher_without_iter_has_no_measurement() {
        let b = Bencher::new();
        assert!(b.measurement().is_none());
    }
}
