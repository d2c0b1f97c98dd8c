//! Test doubles for the wire layer.
//!
//! [`MockTransport`] records every body it is handed and can be scripted
//! to fail, which is enough to exercise the writer's batching and retry
//! behavior without a network.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, WireError};
use crate::payload::{decode_envelope, DecodedEnvelope};
use crate::record::WireEvent;
use crate::transport::Transport;

/// An in-memory transport that records delivered payloads.
pub struct MockTransport {
    bodies: Mutex<Vec<Bytes>>,
    requests: AtomicU32,
    failures_left: AtomicU32,
}

impl MockTransport {
    /// A transport that accepts everything.
    pub fn new() -> Arc<Self> {
        Self::failing(0)
    }

    /// A transport that fails the first `times` sends, then accepts.
    pub fn failing(times: u32) -> Arc<Self> {
        Arc::new(Self {
            bodies: Mutex::new(Vec::new()),
            requests: AtomicU32::new(0),
            failures_left: AtomicU32::new(times),
        })
    }

    /// Stop failing regardless of how many scripted failures remain.
    pub fn stop_failing(&self) {
        self.failures_left.store(0, Ordering::SeqCst);
    }

    /// Total sends attempted, including failed ones.
    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Decoded envelopes of every successful delivery, in order.
    pub fn envelopes(&self) -> Vec<DecodedEnvelope> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .filter_map(|body| decode_envelope(body).ok())
            .collect()
    }

    /// Every delivered event, flattened across envelopes.
    pub fn events(&self) -> Vec<WireEvent> {
        self.envelopes()
            .into_iter()
            .flat_map(|envelope| envelope.events)
            .collect()
    }

    /// Find delivered events of one kind, e.g. `"test_suite_end"`.
    pub fn events_of_kind(&self, kind: &str) -> Vec<WireEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, body: Bytes) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let failures = self.failures_left.load(Ordering::SeqCst);
        if failures > 0 {
            if failures != u32::MAX {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(WireError::Network("scripted failure".to_string()));
        }

        self.bodies.lock().unwrap().push(body);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "mock"
    }
}
