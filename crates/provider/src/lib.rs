//! The persistence contract between a chunk-based world and its storage
//! backend.
//!
//! # Invariants
//! - A chunk position never saved loads as `ChunkLoad::NotFound`, which the
//!   world answers with procedural generation, never with an error.
//! - A load is exactly one of found-valid, not-found, or found-but-corrupt;
//!   the corrupt case is the `Err` arm, so "chunk plus error" cannot exist.
//! - Saves are full replace, not merge.

pub mod contract;
pub mod memory;
pub mod nop;

pub use contract::{ChunkLoad, Provider, ProviderError};
pub use memory::MemoryProvider;
pub use nop::NopProvider;
