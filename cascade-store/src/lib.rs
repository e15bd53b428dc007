//! # cascade-store — in-memory code/metadata store
//!
//! Implements `cascade-protocol`'s [`cascade_protocol::store::CodeStore`]
//! trait (component B): versioning, compression, 25 MiB chunking,
//! version fallback, and a manifest secondary index, all behind a
//! single `RwLock<HashMap<..>>`, the same shape
//! `neuron-state-memory::MemoryStore` uses for `StateStore`.
//!
//! No real storage transport is implied — spec §1 scopes the store's
//! contracts, not its transport, into this core.

#![deny(missing_docs)]

mod compression;
mod memory;

pub use memory::InMemoryStore;
