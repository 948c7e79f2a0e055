//! Persistence layer for the DocForge backend.
//!
//! The durable record store lives outside this system; the pipeline talks to
//! it through `domain::store::RecordStore`. This crate ships the in-process
//! implementation used by the orchestrator and by tests.

pub mod memory;

pub use memory::MemoryStore;
