//! vigil: test-visibility instrumentation.
//!
//! Vigil turns a test run into a tree of trace spans (session → module →
//! suite → test) and ships them to an observability backend as compact
//! binary events. Tests register explicitly and run through the harness;
//! modules and suites appear lazily, close themselves once their last
//! unit finishes, and are guaranteed to close (as failed) even when the
//! run dies abruptly.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vigil::{test_unit, TestContext, TestHarness};
//!
//! fn test_addition(ctx: &mut TestContext) {
//!     if 2 + 2 != 4 {
//!         ctx.fail("arithmetic is broken");
//!     }
//!     ctx.run("subcase", |_ctx| {
//!         // a subtest gets its own span, named test_addition/subcase
//!     });
//! }
//!
//! fn main() {
//!     TestHarness::new()
//!         .register(test_unit!(test_addition))
//!         .run_and_exit();
//! }
//! ```
//!
//! Delivery is configured from the environment (see
//! [`vigil_wire::config`]): agentless mode posts straight to the intake
//! with an API key, otherwise payloads go through a local proxy agent.

pub mod context;
pub mod runner;
pub mod unit;

pub use context::{Bencher, TestContext};
pub use runner::{TestHarness, FRAMEWORK};
pub use unit::{BenchFn, TestFn, UnitKind, UnitSpec};

// the underlying span hierarchy and delivery pipeline, for embedders that
// drive the manual API directly
pub use vigil_span::{
    lifecycle, CloseCoordinator, Span, SpanContext, TagValue, TestCase, TestModule, TestSession,
    TestStatus, TestSuite, Tracer,
};
pub use vigil_wire::WireConfig;
