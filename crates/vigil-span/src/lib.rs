//! Test-visibility span hierarchy.
//!
//! This crate turns a test run into a four-level tree of trace spans:
//!
//! ```text
//! session ── module ── suite ── test
//! ```
//!
//! - **Session/Module/Suite/Test**: entity wrappers over the span
//!   primitive, with inherited tags, error propagation one level up, and
//!   close-once semantics
//! - **Lazy parents**: modules and suites are created on first reference
//!   (`get_or_create`), so the runner never declares the tree up front
//! - **Coordinator**: reference-counted outstanding-unit tracking that
//!   closes suites and modules automatically once their last unit finishes
//! - **Shutdown**: every node registers a close action so abrupt
//!   termination (panic, SIGINT/SIGTERM) still closes and flushes
//!   everything before exit
//!
//! The span primitive and tracer here are deliberately minimal; encoding
//! and delivery live in `vigil-wire`.

pub mod coordinator;
mod entity;
pub mod env_tags;
pub mod lifecycle;
pub mod module;
pub mod session;
pub mod shutdown;
pub mod suite;
pub mod tags;
pub mod test;
pub mod tracer;

pub use coordinator::CloseCoordinator;
pub use module::TestModule;
pub use session::TestSession;
pub use shutdown::ShutdownRegistry;
pub use suite::TestSuite;
pub use test::{TestCase, TestStatus};
pub use tracer::{Span, SpanContext, SpanOptions, TagValue, Tracer};
