//! Run a tiny instrumented test suite against the configured intake.
//!
//! With no environment configured this posts to the default local proxy
//! address and simply logs the delivery failures:
//!
//! ```sh
//! VIGIL_AGENTLESS_ENABLED=1 VIGIL_API_KEY=... cargo run --example demo_run
//! ```

use vigil::{bench_unit, test_unit, Bencher, TestContext, TestHarness};

fn test_arithmetic(ctx: &mut TestContext) {
    if 2 + 2 != 4 {
        ctx.fail("arithmetic is broken");
    }
    ctx.run("overflowing", |ctx| {
        if i32::MAX.checked_add(1).is_some() {
            ctx.fail("expected overflow");
        }
    });
}

fn test_skipped(ctx: &mut TestContext) {
    ctx.skip("demo: requires network");
}

fn bench_format(b: &mut Bencher) {
    b.iter(|| format!("{}-{}", "demo", 42));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    TestHarness::new()
        .register(test_unit!(test_arithmetic))
        .register(test_unit!(test_skipped))
        .register(bench_unit!(bench_format))
        .run_and_exit();
}
