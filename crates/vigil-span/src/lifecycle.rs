//! Process-wide initialization and teardown.
//!
//! The tracer itself is instance-scoped (tests build their own with a mock
//! transport); what lives here is the one-per-process convenience
//! singleton the harness uses, plus the signal handler that guarantees a
//! final forced-close pass on SIGINT/SIGTERM.

use std::sync::OnceLock;

use vigil_wire::WireConfig;

use crate::tracer::Tracer;

static GLOBAL_TRACER: OnceLock<Tracer> = OnceLock::new();

/// Initialize the process-wide tracer from the environment. The first
/// call wins; later calls return the existing tracer.
pub fn init() -> Tracer {
    init_with(WireConfig::from_env())
}

/// Initialize the process-wide tracer with an explicit config.
///
/// When delivery cannot be configured the run still proceeds with a
/// discarding tracer: the instrumentation must never fail the test run,
/// only telemetry is lost.
pub fn init_with(config: WireConfig) -> Tracer {
    GLOBAL_TRACER
        .get_or_init(|| {
            let tracer = match Tracer::new(&config) {
                Ok(tracer) => tracer,
                Err(e) => {
                    tracing::error!(error = %e, "telemetry delivery unavailable, spans will be discarded");
                    Tracer::disabled(&config)
                }
            };
            install_signal_handler();
            tracer
        })
        .clone()
}

/// The process-wide tracer, if one was initialized.
pub fn global_tracer() -> Option<Tracer> {
    GLOBAL_TRACER.get().cloned()
}

/// Run the global tracer's close actions and stop its writer. Safe to
/// call more than once.
pub fn shutdown() {
    if let Some(tracer) = GLOBAL_TRACER.get() {
        tracer.shutdown();
    }
}

/// Force-close all open spans and flush before dying on SIGINT/SIGTERM.
/// Partially executed tests are closed as failed; the process then exits
/// with code 1.
#[cfg(unix)]
fn install_signal_handler() {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install signal handler");
            return;
        }
    };

    let spawned = std::thread::Builder::new()
        .name("vigil-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                tracing::warn!(signal, "termination signal received, closing open spans");
                shutdown();
                std::process::exit(1);
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to spawn signal handler thread");
    }
}

#[cfg(not(unix))]
fn install_signal_handler() {}
