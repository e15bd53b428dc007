//! # cascade-logs — in-memory log aggregator
//!
//! Implements `cascade-protocol`'s [`cascade_protocol::logs::LogAggregator`]
//! trait (component C): capture, query, search, structured query,
//! retention, and aggregation, plus a streaming `subscribe` surface kept
//! outside the trait (it isn't object-safe in a generic async trait) and
//! exposed directly on [`InMemoryAggregator`] instead, the same way
//! `cascade-store`'s `InMemoryStore` keeps its chunking concerns behind a
//! single `RwLock`-guarded state struct rather than across the trait
//! boundary.

#![deny(missing_docs)]

mod aggregator;
mod sse;

pub use aggregator::InMemoryAggregator;
pub use sse::sse_stream;
