//! Flat-file storage backend for the chunkvault provider contract.
//!
//! Layout inside the store directory:
//! ```text
//! world.meta.json        - metadata, schema version, payload hash manifest
//! chunks/
//!   c.<x>.<z>.cbor.zst   - CBOR+zstd compressed chunk payloads
//! entities/
//!   e.<x>.<z>.cbor.zst   - CBOR+zstd compressed entity lists
//! ```
//!
//! # Invariants
//! - A payload file whose hash or encoding does not check out loads as the
//!   found-but-corrupt arm of the contract, never as a fabricated chunk.
//! - A missing payload file is not-found, never an error.
//! - Close flushes every buffered write before releasing the store.

pub mod file;

pub use file::{Durability, FileProvider, StoreError};
