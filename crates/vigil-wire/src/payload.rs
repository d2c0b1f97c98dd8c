//! Payload buffer for batched event delivery.
//!
//! A payload moves through `empty → accumulating → flushing → empty`:
//! events are appended as already-encoded msgpack records, and at flush time
//! the accumulated bytes are spliced into the top-level envelope without
//! being re-encoded.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Result, WireError};
use crate::record::WireEvent;

/// Maximum single-request size accepted by the intake.
pub const PAYLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Accumulated size that triggers an asynchronous flush, half of the
/// maximum request size so an in-flight batch never grows past the limit.
pub const PAYLOAD_FLUSH_THRESHOLD: usize = PAYLOAD_MAX_BYTES / 2;

/// Version of the envelope layout.
pub const ENVELOPE_VERSION: i32 = 1;

/// Scoped metadata maps carried in the envelope, e.g.
/// `{"*": {"language": "rust", "runtime-id": ...}}`.
pub type EnvelopeMetadata = HashMap<String, HashMap<String, String>>;

/// An accumulating buffer of encoded events.
#[derive(Debug, Default)]
pub struct Payload {
    buf: Vec<u8>,
    count: u32,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize one event and append it to the buffer.
    pub fn push(&mut self, event: &WireEvent) -> Result<()> {
        rmp_serde::encode::write_named(&mut self.buf, event)
            .map_err(|e| WireError::Encode(e.to_string()))?;
        self.count += 1;
        Ok(())
    }

    /// Number of buffered events.
    pub fn item_count(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Encoded size of the events array: the items plus the array header.
    pub fn size(&self) -> usize {
        self.buf.len() + array_header_len(self.count)
    }

    /// Wrap the buffered events in the envelope and return the final bytes.
    ///
    /// The event bytes are spliced in verbatim; only the envelope map and
    /// the array header are written here.
    pub fn into_envelope(self, metadata: &EnvelopeMetadata) -> Result<Vec<u8>> {
        use rmp::encode;

        let mut out = Vec::with_capacity(self.size() + 256);
        encode::write_map_len(&mut out, 3).map_err(enc_err)?;

        encode::write_str(&mut out, "version").map_err(enc_err)?;
        encode::write_sint(&mut out, i64::from(ENVELOPE_VERSION)).map_err(enc_err)?;

        encode::write_str(&mut out, "metadata").map_err(enc_err)?;
        encode::write_map_len(&mut out, metadata.len() as u32).map_err(enc_err)?;
        for (scope, entries) in metadata {
            encode::write_str(&mut out, scope).map_err(enc_err)?;
            encode::write_map_len(&mut out, entries.len() as u32).map_err(enc_err)?;
            for (key, value) in entries {
                encode::write_str(&mut out, key).map_err(enc_err)?;
                encode::write_str(&mut out, value).map_err(enc_err)?;
            }
        }

        encode::write_str(&mut out, "events").map_err(enc_err)?;
        encode::write_array_len(&mut out, self.count).map_err(enc_err)?;
        out.extend_from_slice(&self.buf);

        Ok(out)
    }
}

fn array_header_len(count: u32) -> usize {
    if count < 16 {
        1
    } else if count <= u32::from(u16::MAX) {
        3
    } else {
        5
    }
}

fn enc_err<E: std::fmt::Display>(e: E) -> WireError {
    WireError::Encode(e.to_string())
}

/// A decoded envelope, used by tests and test doubles to inspect what was
/// (or would have been) sent.
#[derive(Debug, Clone, Deserialize)]
pub struct DecodedEnvelope {
    pub version: i32,
    pub metadata: EnvelopeMetadata,
    pub events: Vec<WireEvent>,
}

/// Decode an envelope produced by [`Payload::into_envelope`].
pub fn decode_envelope(bytes: &[u8]) -> Result<DecodedEnvelope> {
    rmp_serde::from_slice(bytes).map_err(|e| WireError::Encode(e.to_string()))
}
