//! The world-side consumer of the storage contract.
//!
//! # Invariants
//! - A world owns exactly one provider, injected at construction and
//!   swappable only through an explicit replace that adopts the incoming
//!   provider's stored name.
//! - A not-found chunk load triggers procedural generation, never an error;
//!   a corrupt load is logged and falls back to generation.
//! - Close flushes dirty state and closes the provider exactly once.

pub mod world;

pub use world::World;
