//! # `tsblob` main library
//!
//! This library encodes and decodes compact columnar containers ("blobs") of
//! in-memory time series data.  A blob carries one or more *metrics*, where a
//! metric is an ordered sequence of points sharing a 64-bit identifier.  Two
//! point shapes exist: numeric points (timestamp + `f64` + optional tag) and
//! text points (timestamp + string + optional tag).
//!
//! ## Architecture
//!
//! Blob operations are built around a small number of concrete types:
//! * `blob::numeric::NumericEncoder` / `blob::text::TextEncoder` produce a
//!   finalized byte sequence, one metric at a time
//! * `blob::numeric::NumericBlob` / `blob::text::TextBlob` are the immutable
//!   decoded containers, offering iteration and per-index random access
//! * `set::NumericBlobSet` / `set::TextBlobSet` / `set::BlobSet` stitch many
//!   blobs into one logical stream with global indices
//! * `materialize` pre-decodes blobs or blob sets into flat arrays for
//!   constant-time lookups
//!
//! An encoder is exclusively owned and consumed by `finish`.  Everything it
//! produces is read-only after decoding and safe to share across threads.
//!
//! ## Encodings
//!
//! Timestamps are stored either *raw* (fixed 8 bytes per point, O(1) random
//! access) or as zigzag-varint *deltas* (sequential decode only).  Numeric
//! values are stored either raw or as a Gorilla XOR bit stream.  Tags are
//! length-prefixed UTF-8 strings of at most 255 bytes.  Any payload column
//! can additionally pass through an opaque compression codec, see
//! `codec::compress`.
//!
//! ## Random access vs. materialization
//!
//! Random access into raw-encoded numeric columns is O(1).  Delta
//! timestamps, Gorilla values, tags, and the row-interleaved text payload
//! are scanned forward from the start of the metric's slice, so `*_at` on
//! those is O(n) in the point index.  Callers that need O(1) lookups over
//! sequential encodings should materialize first.

pub mod codec;
pub mod blob;
pub mod set;
pub mod materialize;

use xxhash_rust::xxh3::xxh3_64;

/// Upper bound on the number of metrics a single blob may carry.
pub const MAX_METRICS: usize = 65_536;

/// Upper bound on the byte length of a tag or a text value.
pub const MAX_STR_BYTES: usize = 255;

/// Enumerates blob errors.  The `Display` trait will print the equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("invalid blob format: {0}")]
    InvalidFormat(&'static str),
    #[error("blob checksum mismatch")]
    ChecksumMismatch,
    #[error("unsupported encoding id {0}")]
    UnsupportedEncoding(u8),
    #[error("encoder used out of order: {0}")]
    InvalidState(&'static str),
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(&'static str),
}

pub type Result<T> = std::result::Result<T,Error>;

/// Map a metric name to its 64-bit identifier.
///
/// This is a pure function of the name; encoders and decoders agree on it
/// without exchanging any state.  Collisions between distinct names are
/// possible, which is why blobs that were built from names carry a name
/// table (see `blob`).
pub fn metric_id(name: &str) -> u64 {
    xxh3_64(name.as_bytes())
}

#[test]
fn test_metric_id_stability() {
    // same name, same id, across calls and across processes
    assert_eq!(metric_id("cpu.usage"),metric_id("cpu.usage"));
    assert_ne!(metric_id("cpu.usage"),metric_id("cpu.idle"));
}
