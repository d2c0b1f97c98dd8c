//! Reference-counting close coordinator.
//!
//! Decides when a module or suite can be closed automatically, without the
//! runner knowing the full test plan up front: every declared unit
//! pre-increments its module and suite counters before execution begins,
//! every dynamically registered subtest increments them in the parent's
//! thread before the child runs, and every completion decrements them.
//! A counter at or below zero closes the owning node; closing is
//! idempotent, so an over-decremented counter is harmless.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use crate::module::TestModule;
use crate::suite::TestSuite;

/// Per-run outstanding-unit counters, keyed by resolved module and suite
/// name. One instance per test run; nothing here is process-global.
#[derive(Default)]
pub struct CloseCoordinator {
    modules: Mutex<HashMap<String, Arc<AtomicI32>>>,
    suites: Mutex<HashMap<String, Arc<AtomicI32>>>,
}

impl CloseCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one not-yet-finished unit under `(module, suite)`.
    ///
    /// For dynamically spawned subtests this must be called in the
    /// parent's thread before the child starts, so the increment is
    /// observable before the child can possibly finish.
    pub fn register_unit(&self, module_name: &str, suite_name: &str) {
        counter(&self.modules, module_name).fetch_add(1, Ordering::SeqCst);
        counter(&self.suites, suite_name).fetch_add(1, Ordering::SeqCst);
    }

    /// Account for one finished unit, cascading closes upward: the suite
    /// closes when its counter reaches zero, then the module likewise.
    pub fn unit_finished(&self, module: &TestModule, suite: &TestSuite) {
        let remaining = counter(&self.suites, suite.name()).fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining <= 0 {
            suite.close();
        }

        let remaining = counter(&self.modules, module.name()).fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining <= 0 {
            module.close();
        }
    }

    /// Outstanding units for a module, for inspection in tests.
    pub fn module_outstanding(&self, name: &str) -> i32 {
        counter(&self.modules, name).load(Ordering::SeqCst)
    }

    /// Outstanding units for a suite, for inspection in tests.
    pub fn suite_outstanding(&self, name: &str) -> i32 {
        counter(&self.suites, name).load(Ordering::SeqCst)
    }
}

fn counter(map: &Mutex<HashMap<String, Arc<AtomicI32>>>, name: &str) -> Arc<AtomicI32> {
    let mut map = map.lock().unwrap();
    match map.get(name) {
        Some(existing) => Arc::clone(existing),
        None => {
            let fresh = Arc::new(AtomicI32::new(0));
            map.insert(name.to_string(), Arc::clone(&fresh));
            fresh
        }
    }
}
