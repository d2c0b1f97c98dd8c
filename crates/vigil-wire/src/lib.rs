//! Binary test-cycle event encoding and batched intake delivery.
//!
//! This crate is the delivery half of the test-visibility pipeline:
//!
//! - **Records**: finished spans flattened into typed msgpack events, with
//!   zero-valued optional identifiers omitted from the encoding
//! - **Payload**: an accumulating buffer that splices pre-encoded events
//!   into the top-level envelope at flush time
//! - **Transport**: gzip-compressed HTTP POST, agentless or through a
//!   local proxy agent
//! - **Writer**: size-triggered background flushing with a bounded number
//!   of concurrent sends and fixed-delay retry
//!
//! Nothing in this crate ever surfaces an error to instrumented test
//! code; failures are logged and the affected event or batch is dropped.

pub mod config;
pub mod error;
pub mod payload;
pub mod record;
pub mod testing;
pub mod transport;
pub mod writer;

pub use config::WireConfig;
pub use error::{Result, WireError};
pub use payload::{
    decode_envelope, DecodedEnvelope, EnvelopeMetadata, Payload, ENVELOPE_VERSION,
    PAYLOAD_FLUSH_THRESHOLD, PAYLOAD_MAX_BYTES,
};
pub use record::{span_types, EventRecord, FinishedSpan, WireEvent};
pub use transport::{DiscardTransport, IntakeTransport, Transport};
pub use writer::EventWriter;
