//! Shared value types for the chunkvault persistence contract.
//!
//! # Invariants
//! - A `ChunkPos` used as a storage key is immutable for the life of the key.
//! - `Chunk` and `EntityRecord` are opaque payloads to storage backends:
//!   backends persist and reconstruct them without inspecting the contents.

pub mod types;

pub use types::{BlockPos, Chunk, ChunkPos, EntityId, EntityRecord, GameMode, ParseGameModeError};
