//! Shutdown hook registry.
//!
//! Every hierarchy node registers a close action at creation time so that
//! no span is left unclosed even on abrupt termination. Actions are kept
//! in LIFO order: leaf-created nodes close before the ancestors that were
//! registered earlier, though each action only closes its own node.

use std::sync::Mutex;

type CloseAction = Box<dyn FnOnce() + Send>;

/// A LIFO list of close callbacks.
pub struct ShutdownRegistry {
    actions: Mutex<Vec<CloseAction>>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Prepend a close action.
    pub fn push(&self, action: impl FnOnce() + Send + 'static) {
        self.actions.lock().unwrap().insert(0, Box::new(action));
    }

    /// Run every registered action in LIFO order and clear the list.
    ///
    /// Actions whose node is already closed are harmless no-ops, so a
    /// second `run_all` (or a run racing normal teardown) sees an empty
    /// list or already-closed nodes.
    pub fn run_all(&self) {
        let actions: Vec<CloseAction> = {
            let mut guard = self.actions.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for action in actions {
            action();
        }
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.actions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ShutdownRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn actions_run_in_lifo_order() {
        let registry = ShutdownRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            registry.push(move || order.lock().unwrap().push(i));
        }
        registry.run_all();

        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        assert!(registry.is_empty());
    }

    #[test]
    fn run_all_twice_runs_each_action_once() {
        let registry = ShutdownRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        registry.push(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.run_all();
        registry.run_all();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn push_after_run_all_is_kept_for_the_next_run() {
        let registry = ShutdownRegistry::new();
        registry.run_all();
        registry.push(|| {});
        assert_eq!(registry.len(), 1);
    }
}
