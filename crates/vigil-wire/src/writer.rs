//! Batched event writer.
//!
//! The writer accumulates encoded events in a [`Payload`] and ships full
//! batches in the background: a flush swaps the buffer for a fresh one (so
//! pushes are never blocked by in-flight sends), wraps the swapped-out
//! buffer in the envelope, and hands it to a bounded-concurrency sender
//! with fixed-delay retry. Delivery is at-most-once with best-effort
//! retry; an exhausted batch is dropped and logged.
//!
//! The public API is fully synchronous (the host test runner is plain
//! threads); a small background tokio runtime owns the actual sends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::WireConfig;
use crate::error::{Result, WireError};
use crate::payload::{EnvelopeMetadata, Payload, PAYLOAD_FLUSH_THRESHOLD};
use crate::record::{FinishedSpan, WireEvent};
use crate::transport::Transport;

/// Shippable-events writer with size-triggered background flushing.
///
/// Cheap to clone; all clones share the same buffer and transport.
#[derive(Clone)]
pub struct EventWriter {
    inner: Arc<WriterInner>,
}

struct WriterInner {
    transport: Arc<dyn Transport>,
    payload: Mutex<Payload>,
    metadata: EnvelopeMetadata,
    semaphore: Arc<Semaphore>,
    inflight: Mutex<Vec<JoinHandle<()>>>,
    send_retries: u32,
    retry_delay: Duration,
    flush_threshold: usize,
    runtime: tokio::runtime::Runtime,
}

impl EventWriter {
    pub fn new(config: &WireConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("vigil-writer")
            .enable_all()
            .build()
            .map_err(|e| WireError::Config(format!("failed to start writer runtime: {e}")))?;

        let mut scoped = HashMap::new();
        scoped.insert("language".to_string(), "rust".to_string());
        scoped.insert(
            "runtime-id".to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        scoped.insert(
            "library_version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        let mut metadata = EnvelopeMetadata::new();
        metadata.insert("*".to_string(), scoped);

        Ok(Self {
            inner: Arc::new(WriterInner {
                transport,
                payload: Mutex::new(Payload::new()),
                metadata,
                semaphore: Arc::new(Semaphore::new(config.concurrent_sends)),
                inflight: Mutex::new(Vec::new()),
                send_retries: config.send_retries,
                retry_delay: config.retry_delay,
                flush_threshold: PAYLOAD_FLUSH_THRESHOLD,
                runtime,
            }),
        })
    }

    /// Encode one finished span into the current payload.
    ///
    /// An encoding failure drops that event only; a full buffer triggers an
    /// asynchronous flush of the whole batch.
    pub fn push(&self, span: FinishedSpan) {
        let event = WireEvent::from_span(span);
        let should_flush = {
            let mut payload = self.inner.payload.lock().unwrap();
            if let Err(e) = payload.push(&event) {
                tracing::error!(error = %e, event = %event.kind, "failed to encode event, dropping it");
                return;
            }
            payload.size() > self.inner.flush_threshold
        };
        if should_flush {
            self.flush();
        }
    }

    /// Swap out the current payload and send it in the background.
    pub fn flush(&self) {
        let payload = {
            let mut guard = self.inner.payload.lock().unwrap();
            if guard.is_empty() {
                return;
            }
            std::mem::take(&mut *guard)
        };

        let count = payload.item_count();
        let body = match payload.into_envelope(&self.inner.metadata) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                tracing::error!(error = %e, events = count, "failed to encode payload, dropping batch");
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        let handle = self.inner.runtime.spawn(async move {
            let _permit = match inner.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let mut last_error = None;
            for attempt in 0..=inner.send_retries {
                tracing::debug!(
                    events = count,
                    bytes = body.len(),
                    attempt = attempt + 1,
                    endpoint = inner.transport.endpoint(),
                    "sending payload"
                );
                match inner.transport.send(body.clone()).await {
                    Ok(()) => {
                        tracing::debug!(events = count, attempts = attempt + 1, "payload sent");
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt = attempt + 1,
                            error = %e,
                            "payload send failed"
                        );
                        last_error = Some(e);
                        if attempt < inner.send_retries {
                            tokio::time::sleep(inner.retry_delay).await;
                        }
                    }
                }
            }
            if let Some(e) = last_error {
                tracing::error!(events = count, error = %e, "dropping payload, retries exhausted");
            }
        });
        self.inner.inflight.lock().unwrap().push(handle);
    }

    /// Block until every in-flight send has completed.
    pub fn wait(&self) {
        let handles: Vec<_> = {
            let mut inflight = self.inner.inflight.lock().unwrap();
            inflight.drain(..).collect()
        };
        if handles.is_empty() {
            return;
        }
        self.inner.runtime.block_on(async {
            for result in futures::future::join_all(handles).await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "sender task failed");
                }
            }
        });
    }

    /// Flush the current buffer and wait for delivery.
    pub fn flush_sync(&self) {
        self.flush();
        self.wait();
    }

    /// Final flush; blocks until all in-flight sends complete.
    pub fn stop(&self) {
        self.flush_sync();
    }
}
